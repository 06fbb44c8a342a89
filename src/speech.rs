//! Text-to-speech notification.
//!
//! [`Notifier`] queues text for a [`Speaker`] on a dedicated thread and returns
//! immediately. Speech is best effort: failures are logged and dropped.

use crate::config::SpeechConfig;
use crate::error::{OverlayError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Something that can say a line of text. May block until playback ends.
pub trait Speaker: Send + Sync {
    /// Speak `text`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Speech`] if the utterance could not be played.
    fn speak(&self, text: &str) -> Result<()>;
}

/// Speaker that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpeaker;

impl Speaker for NoopSpeaker {
    fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// TTS programs tried by [`CommandSpeaker::detect`], in order.
pub const TTS_PROGRAMS: [&str; 3] = ["say", "espeak-ng", "espeak"];

/// Speaks through a platform TTS program (`say`, `espeak-ng`, `espeak`).
///
/// Utterances are serialised so overlapping notifications queue up rather
/// than talking over each other.
#[derive(Debug)]
pub struct CommandSpeaker {
    program: PathBuf,
    args: Vec<String>,
    playback: Mutex<()>,
}

impl CommandSpeaker {
    /// Create a speaker for `program`, deriving the rate flag from its name.
    pub fn new(program: impl Into<PathBuf>, rate: u32) -> Self {
        let program = program.into();
        let args = rate_args(&program, rate);
        Self {
            program,
            args,
            playback: Mutex::new(()),
        }
    }

    /// Find the first available TTS program on `PATH`.
    pub fn detect(rate: u32) -> Option<Self> {
        TTS_PROGRAMS
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|program| Self::new(program, rate))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

fn rate_args(program: &Path, rate: u32) -> Vec<String> {
    let stem = program
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem {
        "say" => vec!["-r".into(), rate.to_string()],
        "espeak" | "espeak-ng" => vec!["-s".into(), rate.to_string()],
        _ => Vec::new(),
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        let _playing = self.playback.lock().unwrap_or_else(|e| e.into_inner());
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .status()
            .map_err(|e| {
                OverlayError::Speech(format!("cannot run {}: {e}", self.program.display()))
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(OverlayError::Speech(format!(
                "{} exited with {status}",
                self.program.display()
            )))
        }
    }
}

/// Build the speaker selected in `config`.
///
/// Falls back to [`NoopSpeaker`] when speech is disabled or no program is
/// available, so a missing TTS engine never stops the orchestrator.
pub fn from_config(config: &SpeechConfig) -> Arc<dyn Speaker> {
    if !config.enabled {
        info!("speech disabled");
        return Arc::new(NoopSpeaker);
    }

    let speaker = match &config.command {
        Some(command) => match which::which(command) {
            Ok(program) => Some(CommandSpeaker::new(program, config.rate)),
            Err(e) => {
                warn!("speech command {command:?} not found: {e}");
                None
            }
        },
        None => CommandSpeaker::detect(config.rate),
    };

    match speaker {
        Some(speaker) => {
            info!(program = %speaker.program().display(), "speech enabled");
            Arc::new(speaker)
        }
        None => {
            warn!("no TTS program available, speech output disabled");
            Arc::new(NoopSpeaker)
        }
    }
}

/// Utterances waiting behind the one being played; newer ones are dropped.
pub const SPEECH_QUEUE_CAPACITY: usize = 8;

/// Fire-and-forget front end for a [`Speaker`].
///
/// One long-lived `sidequest-tts` thread plays queued text in order. The
/// thread exits once every clone of the notifier is dropped.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<String>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(speaker: Arc<dyn Speaker>) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(SPEECH_QUEUE_CAPACITY);
        let spawned = std::thread::Builder::new()
            .name("sidequest-tts".into())
            .spawn(move || {
                while let Some(text) = rx.blocking_recv() {
                    if let Err(e) = speaker.speak(&text) {
                        warn!("TTS error: {e}");
                    }
                }
                debug!("speech queue closed");
            });
        if let Err(e) = spawned {
            warn!("cannot start TTS thread, speech disabled: {e}");
        }
        Self { tx }
    }

    /// Queue `text` for speech and return immediately. Blank text is ignored.
    pub fn notify(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        match self.tx.try_send(text.to_owned()) {
            Ok(()) => debug!(chars = text.len(), "speech queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("speech queue full, dropping utterance");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("speech thread gone, dropping utterance");
            }
        }
    }
}
