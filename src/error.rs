//! Error types for the sidequest orchestrator.

/// Top-level error type.
///
/// Every job failure is non-fatal: the scheduler converts these into a
/// failed [`JobResult`](crate::jobs::JobResult) whose text is surfaced to
/// the status boundary, and the next tick retries.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Capture source unavailable or frame could not be decoded.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Network or model error from the inference provider, including an
    /// empty response.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The inference call did not complete within the configured timeout.
    #[error("inference timed out after {0}s")]
    Timeout(u64),

    /// A job was requested in a state that cannot serve it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Text-to-speech error.
    #[error("speech error: {0}")]
    Speech(String),

    /// Status server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, OverlayError>;
