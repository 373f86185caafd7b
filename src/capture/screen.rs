//! Live desktop capture through the `screenshots` crate

use image::RgbaImage;
use screenshots::Screen;

use super::{CaptureError, ScreenCapture};
use crate::domain::Region;

fn display_bounds(screen: &Screen) -> Region {
    let info = &screen.display_info;
    Region::new(info.x, info.y, info.width as i32, info.height as i32)
}

/// Captures from the display containing the region's top-left corner.
/// Parts of the region on other displays are clipped away.
pub struct DesktopCapture;

impl ScreenCapture for DesktopCapture {
    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError> {
        if region.dimensions().is_none() {
            return Err(CaptureError::EmptyRegion(region));
        }
        let screen = Screen::from_point(region.left, region.top)
            .map_err(|_| CaptureError::OutsideDisplays(region))?;
        let bounds = display_bounds(&screen);
        let clipped = region
            .intersect(bounds)
            .ok_or(CaptureError::OutsideDisplays(region))?;
        if clipped != region {
            log::warn!("Region {region} spans displays; capturing {clipped} only");
        }

        let shot = screen
            .capture_area(
                clipped.left - bounds.left,
                clipped.top - bounds.top,
                clipped.width as u32,
                clipped.height as u32,
            )
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        let (width, height) = (shot.width(), shot.height());
        log::debug!("Captured {width}x{height} pixels from {clipped}");

        RgbaImage::from_raw(width, height, shot.into_raw())
            .ok_or_else(|| CaptureError::Backend("capture buffer had incorrect size".into()))
    }

    fn monitors(&self) -> Result<Vec<Region>, CaptureError> {
        let screens = Screen::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        Ok(screens.iter().map(display_bounds).collect())
    }
}
