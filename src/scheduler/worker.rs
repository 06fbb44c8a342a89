//! Job execution off the scheduling loop.
//!
//! [`JobRunner::run`] performs capture + inference for one ticket and always
//! yields a [`JobResult`]. [`spawn_job`] runs it on a tokio task with a
//! completion guard, so the scheduler hears back even if the task panics or
//! is aborted.

use crate::capture::FrameSource;
use crate::config::PromptConfig;
use crate::error::OverlayError;
use crate::inference::{InferenceClient, infer_with_timeout};
use crate::jobs::{JobKind, JobResult, JobTicket};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Executes jobs against the injected capture and inference collaborators.
pub struct JobRunner {
    frames: Arc<dyn FrameSource>,
    model: Arc<dyn InferenceClient>,
    prompts: PromptConfig,
    timeout: Duration,
    capture_timeout: Duration,
}

impl JobRunner {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        model: Arc<dyn InferenceClient>,
        prompts: PromptConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            frames,
            model,
            prompts,
            timeout,
            capture_timeout: timeout,
        }
    }

    /// Bound on waiting for a frame (defaults to the inference timeout).
    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Run one job to completion.
    pub async fn run(&self, ticket: JobTicket) -> JobResult {
        if ticket.kind == JobKind::QuestCheck && ticket.quest.is_none() {
            debug!(job_id = %ticket.id, "quest check without quest, answering locally");
            return JobResult::no_quest(&ticket);
        }

        // A stuck source is abandoned on its blocking thread; the job still
        // reports so the kind is released.
        let frames = Arc::clone(&self.frames);
        let capture = tokio::task::spawn_blocking(move || frames.capture());
        let frame = match tokio::time::timeout(self.capture_timeout, capture).await {
            Ok(Ok(Ok(frame))) => frame,
            Ok(Ok(Err(e))) => return JobResult::failure(&ticket, &e),
            Ok(Err(e)) => {
                return JobResult::failure(
                    &ticket,
                    &OverlayError::Capture(format!("capture task failed: {e}")),
                );
            }
            Err(_) => {
                warn!(kind = %ticket.kind, job_id = %ticket.id, "capture timed out");
                return JobResult::failure(
                    &ticket,
                    &OverlayError::Capture(format!(
                        "timed out after {:?}",
                        self.capture_timeout
                    )),
                );
            }
        };

        let origin = ticket.clone();
        let request = ticket.into_request(frame);
        let prompt = match request.prompt(&self.prompts) {
            Ok(prompt) => prompt,
            Err(e) => return JobResult::failure(&origin, &e),
        };

        match infer_with_timeout(self.model.as_ref(), &prompt, &request.frame, self.timeout).await
        {
            Ok(text) => JobResult::success(&origin, text),
            Err(e) => {
                warn!(
                    kind = %request.kind,
                    job_id = %request.id,
                    model = self.model.name(),
                    "job failed: {e}"
                );
                JobResult::failure(&origin, &e)
            }
        }
    }
}

/// Reports a result exactly once; reports a failure if dropped unfinished.
struct Completion {
    ticket: JobTicket,
    tx: mpsc::UnboundedSender<JobResult>,
    sent: bool,
}

impl Completion {
    fn finish(mut self, result: JobResult) {
        self.sent = true;
        if self.tx.send(result).is_err() {
            debug!(job_id = %self.ticket.id, "result channel closed");
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.sent {
            return;
        }
        let err = OverlayError::InvalidState("job worker exited without a result".into());
        let _ = self.tx.send(JobResult::failure(&self.ticket, &err));
    }
}

/// Spawn a worker task for `ticket`; its result is sent on `tx`.
pub fn spawn_job(
    runner: Arc<JobRunner>,
    ticket: JobTicket,
    tx: mpsc::UnboundedSender<JobResult>,
) -> tokio::task::JoinHandle<()> {
    let completion = Completion {
        ticket: ticket.clone(),
        tx,
        sent: false,
    };
    tokio::spawn(async move {
        let result = runner.run(ticket).await;
        completion.finish(result);
    })
}
