//! Frame sampling.
//!
//! A [`FrameSource`] produces the current screen contents resized to the
//! configured resolution. Capture is synchronous and may block (it shells
//! out or touches the filesystem), so the scheduler only ever calls it from
//! a blocking worker thread.

mod command;
mod file;

pub use command::CommandCapture;
pub use file::FileCapture;

use crate::config::{CaptureBackend, CaptureConfig};
use crate::error::{OverlayError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::sync::Arc;

/// A captured, resized RGB frame.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Resize `image` to exactly `width`×`height` and drop any alpha channel.
    pub fn from_image(image: DynamicImage, width: u32, height: u32) -> Self {
        let image = if image.width() == width && image.height() == height {
            image.to_rgb8()
        } else {
            image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
        };
        Self { image }
    }

    /// Decode an encoded image (PNG or JPEG) and resize it.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Capture`] if the bytes are not a supported image.
    pub fn decode(bytes: &[u8], width: u32, height: u32) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| OverlayError::Capture(format!("cannot decode frame: {e}")))?;
        Ok(Self::from_image(image, width, height))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode the frame as JPEG for upload.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Capture`] if encoding fails.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        use image::ImageEncoder;

        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .write_image(
                self.image.as_raw(),
                self.image.width(),
                self.image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| OverlayError::Capture(format!("JPEG encode: {e}")))?;
        Ok(buf)
    }
}

/// Source of screen frames.
pub trait FrameSource: Send + Sync {
    /// Grab the current frame.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Capture`] when no capture surface is available.
    fn capture(&self) -> Result<Frame>;
}

/// Build the frame source selected in `config`.
///
/// # Errors
///
/// Returns an error if the backend cannot be set up (no screenshot program
/// found, or no image path for the file backend).
pub fn from_config(config: &CaptureConfig) -> Result<Arc<dyn FrameSource>> {
    match config.backend {
        CaptureBackend::Command => Ok(Arc::new(CommandCapture::from_config(config)?)),
        CaptureBackend::File => {
            let path = config.image_path.clone().ok_or_else(|| {
                OverlayError::Config("capture.image_path is required for the file backend".into())
            })?;
            Ok(Arc::new(FileCapture::new(path, config.width, config.height)))
        }
    }
}
