//! In-process fakes for the external collaborators.
//!
//! Shared by unit tests and the `tests/` integration binaries.

use crate::capture::{Frame, FrameSource};
use crate::error::{OverlayError, Result};
use crate::inference::InferenceClient;
use crate::speech::Speaker;
use async_trait::async_trait;
use image::DynamicImage;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Frame source returning a small blank frame, or failing on demand.
#[derive(Debug, Default)]
pub struct FakeFrames {
    fail: bool,
    stall: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source with no capture surface.
    pub fn unavailable() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A source that blocks for `delay` before answering.
    pub fn stalled(delay: Duration) -> Self {
        Self {
            stall: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameSource for FakeFrames {
    fn capture(&self) -> Result<Frame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stall {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(OverlayError::Capture("no capture surface".into()));
        }
        Ok(Frame::from_image(DynamicImage::new_rgb8(16, 9), 16, 9))
    }
}

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Never completes.
    Hang,
}

/// Inference client that replays scripted replies.
///
/// Prompt rules registered with [`when`](Self::when) are one-shot and take
/// priority over the queue. When both are exhausted every call returns the
/// fallback text. A
/// gated model blocks each call until [`release`](Self::release) hands out
/// a permit, which keeps jobs in flight for as long as a test needs.
#[derive(Debug)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Reply>>,
    rules: Mutex<Vec<(String, Reply)>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Semaphore,
}

impl ScriptedModel {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            rules: Mutex::new(Vec::new()),
            fallback: fallback.into(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
        }
    }

    /// A model whose calls wait for [`release`](Self::release).
    pub fn gated(fallback: impl Into<String>) -> Self {
        Self {
            gate: Semaphore::new(0),
            ..Self::new(fallback)
        }
    }

    /// Queue a reply for the next unanswered call.
    pub fn push(&self, reply: Reply) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(Reply::Text(text.into()))
    }

    /// Answer the next call whose prompt contains `needle` with `reply`.
    pub fn when(&self, needle: impl Into<String>, reply: Reply) -> &Self {
        self.rules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((needle.into(), reply));
        self
    }

    fn next_reply(&self, prompt: &str) -> Reply {
        {
            let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(pos) = rules.iter().position(|(needle, _)| prompt.contains(needle)) {
                return rules.remove(pos).1;
            }
        }
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Reply::Text(self.fallback.clone()))
    }

    /// Let `n` waiting (or future) calls proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn infer(&self, prompt: &str, _frame: &Frame) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_owned());

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| OverlayError::Inference(format!("gate closed: {e}")))?;
        permit.forget();

        let reply = self.next_reply(prompt);

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(reason) => Err(OverlayError::Inference(reason)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Speaker that records every utterance.
#[derive(Debug, Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSpeaker {
    /// A speaker that records and then reports a playback error.
    pub fn failing() -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Poll until at least `n` utterances were recorded or `timeout` passes.
    pub fn wait_for(&self, n: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let spoken = self.spoken();
            if spoken.len() >= n || Instant::now() >= deadline {
                return spoken;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_owned());
        if self.fail {
            Err(OverlayError::Speech("speaker unplugged".into()))
        } else {
            Ok(())
        }
    }
}
