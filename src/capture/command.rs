//! Capture by shelling out to a platform screenshot tool.
//!
//! Resolution order when no command is configured:
//! 1. `screencapture` on macOS (writes to a temp file)
//! 2. `grim` when `WAYLAND_DISPLAY` is set (PNG on stdout)
//! 3. ImageMagick `import` on X11 (PNG on stdout)
//!
//! A configured command may reference `{file}` in its arguments; the
//! placeholder is replaced with a temp path that is read back after the
//! command exits. Otherwise the command must write the image to stdout.

use super::{Frame, FrameSource};
use crate::config::CaptureConfig;
use crate::error::{OverlayError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const FILE_PLACEHOLDER: &str = "{file}";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Screenshot-command frame source.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: PathBuf,
    args: Vec<String>,
    width: u32,
    height: u32,
    timeout: Duration,
}

impl CommandCapture {
    /// Create a capture source for an explicit program and argument list.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, width: u32, height: u32) -> Self {
        Self {
            program: program.into(),
            args,
            width,
            height,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Kill the program if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from config, auto-detecting a screenshot tool when none is set.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Capture`] if no usable screenshot program is found.
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        if let Some(command) = &config.command {
            let program = which::which(command).map_err(|e| {
                OverlayError::Capture(format!("screenshot command {command:?} not found: {e}"))
            })?;
            return Ok(Self::new(
                program,
                config.args.clone(),
                config.width,
                config.height,
            )
            .with_timeout(config.timeout()));
        }

        let (program, args) = detect_screenshot_tool().ok_or_else(|| {
            OverlayError::Capture(
                "no screenshot tool found (tried screencapture, grim, import); \
                 set capture.command or use the file backend"
                    .into(),
            )
        })?;
        info!(program = %program.display(), "using screenshot tool");
        Ok(Self::new(program, args, config.width, config.height).with_timeout(config.timeout()))
    }

    fn writes_to_file(&self) -> bool {
        self.args.iter().any(|a| a.contains(FILE_PLACEHOLDER))
    }

    fn resolved_args(&self, scratch: Option<&Path>) -> Vec<String> {
        match scratch {
            Some(path) => {
                let path = path.to_string_lossy();
                self.args
                    .iter()
                    .map(|a| a.replace(FILE_PLACEHOLDER, &path))
                    .collect()
            }
            None => self.args.clone(),
        }
    }

    /// Run the program to completion and return its stdout.
    fn run(&self, args: &[String]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                OverlayError::Capture(format!("cannot run {}: {e}", self.program.display()))
            })?;

        // Drain both pipes while polling so a large PNG cannot fill the pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    if let Err(e) = child.kill() {
                        warn!("cannot kill {}: {e}", self.program.display());
                    }
                    let _ = child.wait();
                    return Err(OverlayError::Capture(format!(
                        "{} timed out after {:?}",
                        self.program.display(),
                        self.timeout
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(OverlayError::Capture(format!(
                        "cannot wait for {}: {e}",
                        self.program.display()
                    )));
                }
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            let stderr = collect(stderr);
            return Err(OverlayError::Capture(format!(
                "{} exited with {}: {}",
                self.program.display(),
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

impl FrameSource for CommandCapture {
    fn capture(&self) -> Result<Frame> {
        // Each capture gets its own scratch file; concurrent jobs must not
        // read or delete each other's frame.
        let scratch = if self.writes_to_file() {
            let file = tempfile::Builder::new()
                .prefix("sidequest-frame-")
                .suffix(".png")
                .tempfile()
                .map_err(|e| OverlayError::Capture(format!("cannot create scratch file: {e}")))?;
            Some(file)
        } else {
            None
        };

        let args = self.resolved_args(scratch.as_ref().map(|f| f.path()));
        let stdout = self.run(&args)?;

        let bytes = match &scratch {
            Some(file) => std::fs::read(file.path()).map_err(|e| {
                OverlayError::Capture(format!("cannot read {}: {e}", file.path().display()))
            })?,
            None => stdout,
        };

        debug!(bytes = bytes.len(), "screenshot captured");
        Frame::decode(&bytes, self.width, self.height)
    }
}

fn detect_screenshot_tool() -> Option<(PathBuf, Vec<String>)> {
    if cfg!(target_os = "macos")
        && let Ok(path) = which::which("screencapture")
    {
        return Some((
            path,
            vec!["-x".into(), "-t".into(), "png".into(), FILE_PLACEHOLDER.into()],
        ));
    }

    if std::env::var_os("WAYLAND_DISPLAY").is_some()
        && let Ok(path) = which::which("grim")
    {
        return Some((path, vec!["-t".into(), "png".into(), "-".into()]));
    }

    if let Ok(path) = which::which("import") {
        return Some((
            path,
            vec!["-window".into(), "root".into(), "png:-".into()],
        ));
    }

    None
}
