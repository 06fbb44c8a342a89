//! Vision-model inference.
//!
//! The orchestrator depends only on the [`InferenceClient`] trait; the
//! concrete provider is built once at startup and shared behind an `Arc`,
//! which lets tests substitute a scripted fake.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

use crate::capture::Frame;
use crate::error::{OverlayError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// A model that turns a prompt plus a frame into text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Provider name for logs (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Run one inference call.
    ///
    /// Implementations return trimmed, non-empty text on success. An empty
    /// model response is an [`OverlayError::Inference`].
    async fn infer(&self, prompt: &str, frame: &Frame) -> Result<String>;
}

/// Run [`InferenceClient::infer`] with an upper bound on wall time.
///
/// # Errors
///
/// Returns [`OverlayError::Timeout`] if the call does not finish within
/// `timeout`, otherwise whatever the client returned.
pub async fn infer_with_timeout(
    client: &dyn InferenceClient,
    prompt: &str,
    frame: &Frame,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, client.infer(prompt, frame)).await {
        Ok(result) => result,
        Err(_) => Err(OverlayError::Timeout(timeout.as_secs())),
    }
}
