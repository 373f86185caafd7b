//! Capture from a saved screenshot instead of the live desktop

use std::path::PathBuf;

use image::RgbaImage;

use super::{CaptureError, ScreenCapture};
use crate::domain::Region;

/// Treats an image file as a single display with its origin at (0, 0)
pub struct ImageFileCapture {
    path: PathBuf,
}

impl ImageFileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<RgbaImage, CaptureError> {
        let img = image::open(&self.path)?.to_rgba8();
        log::debug!(
            "Loaded {} ({}x{})",
            self.path.display(),
            img.width(),
            img.height()
        );
        Ok(img)
    }
}

impl ScreenCapture for ImageFileCapture {
    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError> {
        if region.dimensions().is_none() {
            return Err(CaptureError::EmptyRegion(region));
        }
        let img = self.load()?;
        let bounds = Region::new(0, 0, img.width() as i32, img.height() as i32);
        let clipped = region
            .intersect(bounds)
            .ok_or(CaptureError::OutsideDisplays(region))?;
        if clipped != region {
            log::warn!("Region {region} clipped to image bounds as {clipped}");
        }
        Ok(image::imageops::crop_imm(
            &img,
            clipped.left as u32,
            clipped.top as u32,
            clipped.width as u32,
            clipped.height as u32,
        )
        .to_image())
    }

    fn monitors(&self) -> Result<Vec<Region>, CaptureError> {
        let (w, h) = image::image_dimensions(&self.path)?;
        Ok(vec![Region::new(0, 0, w as i32, h as i32)])
    }
}
