//! Capture from an image file that some other process keeps up to date.

use super::{Frame, FrameSource};
use crate::error::{OverlayError, Result};
use std::path::PathBuf;

/// Re-reads an image file on every capture.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }
}

impl FrameSource for FileCapture {
    fn capture(&self) -> Result<Frame> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            OverlayError::Capture(format!("cannot read {}: {e}", self.path.display()))
        })?;
        Frame::decode(&bytes, self.width, self.height)
    }
}
