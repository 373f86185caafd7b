//! Image capture and recognition
//!
//! This module consolidates:
//! - Capture providers turning a region into pixels (file.rs, screen.rs)
//! - OCR text recognition with pre-processing (ocr.rs)

pub mod file;
pub mod ocr;
#[cfg(feature = "screen-capture")]
pub mod screen;

use std::path::{Path, PathBuf};

use chrono::Local;
use image::RgbaImage;

use crate::domain::Region;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("region {0} does not overlap any display")]
    OutsideDisplays(Region),
    #[error("region {0} has no area")]
    EmptyRegion(Region),
    #[error("screen capture is not available in this build")]
    Unsupported,
    #[error("capture failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Turns a desktop region into pixels
pub trait ScreenCapture {
    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError>;

    /// Bounds of every connected display, in desktop coordinates
    fn monitors(&self) -> Result<Vec<Region>, CaptureError>;
}

/// Stand-in used when no capture backend was compiled in
pub struct NoCapture;

impl ScreenCapture for NoCapture {
    fn capture(&self, _region: Region) -> Result<RgbaImage, CaptureError> {
        Err(CaptureError::Unsupported)
    }

    fn monitors(&self) -> Result<Vec<Region>, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

/// The live desktop when built with `screen-capture`, otherwise [`NoCapture`]
pub fn default_capture() -> Box<dyn ScreenCapture> {
    #[cfg(feature = "screen-capture")]
    {
        Box::new(screen::DesktopCapture)
    }
    #[cfg(not(feature = "screen-capture"))]
    {
        Box::new(NoCapture)
    }
}

/// Save a captured region as `ocrbox_<timestamp>.png` inside `dir`
pub fn save_capture(img: &RgbaImage, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("ocrbox_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);
    img.save(&path)?;
    log::info!("Saved capture to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_capture_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]));
        let path = save_capture(&img, &dir.path().join("shots")).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("ocrbox_"));
        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (4, 3));
    }

    #[test]
    fn no_capture_reports_unsupported() {
        assert!(matches!(
            NoCapture.capture(Region::new(0, 0, 10, 10)),
            Err(CaptureError::Unsupported)
        ));
    }
}
