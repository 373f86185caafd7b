//! OCR (Optical Character Recognition) using rusty-tesseract
//!
//! Captured regions are upscaled when small, converted to grayscale and
//! optionally run through two filters before recognition: a light blur for
//! math (smooths thin strokes) and a mean adaptive threshold (evens out
//! uneven backgrounds).

use std::collections::HashMap;

use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// Filters and language applied to one recognition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    pub language: String,
    pub math_mode: bool,
    pub adaptive_threshold: bool,
    /// Adaptive threshold window; forced odd and at least 3
    pub block_size: u32,
    /// Subtracted from the local mean before comparing
    pub threshold_constant: i32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            math_mode: false,
            adaptive_threshold: false,
            block_size: 25,
            threshold_constant: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("tesseract is not available: {0}")]
    EngineUnavailable(String),
    #[error("failed to create tesseract image: {0}")]
    Image(String),
    #[error("tesseract OCR failed: {0}")]
    Recognition(String),
}

/// Recognizes text in captured pixels
pub trait OcrProvider {
    /// Trimmed text, empty when nothing was recognized
    fn recognize(&self, img: &RgbaImage, options: &OcrOptions) -> Result<String, OcrError>;
}

/// Tesseract wants ISO 639-2 codes; accept the common English aliases too
pub fn tesseract_language(lang: &str) -> String {
    match lang.trim() {
        "" | "en" | "en-US" | "en-GB" | "eng" => "eng".to_string(),
        other => other.to_string(),
    }
}

/// Upscale small captures so text reaches the 10-12 px height tesseract
/// handles well. Returns the image and the factor applied.
pub fn upscale_for_ocr(img: &RgbaImage) -> (DynamicImage, u32) {
    let dynamic_img = DynamicImage::ImageRgba8(img.clone());
    let min_dimension = img.width().min(img.height());
    let factor = if min_dimension < 100 {
        4
    } else if min_dimension < 200 {
        2
    } else {
        return (dynamic_img, 1);
    };

    let (new_width, new_height) = (img.width() * factor, img.height() * factor);
    log::debug!("Upscaling small image {factor}x to {new_width}x{new_height}");
    (
        dynamic_img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3),
        factor,
    )
}

/// Mean adaptive threshold with replicated borders: a pixel turns white when
/// it is brighter than its neighbourhood mean minus `constant`.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, constant: i32) -> GrayImage {
    let block = block_size.max(3) | 1;
    let r = block / 2;
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let padded = GrayImage::from_fn(w + 2 * r, h + 2 * r, |px, py| {
        let sx = px.saturating_sub(r).min(w - 1);
        let sy = py.saturating_sub(r).min(h - 1);
        *gray.get_pixel(sx, sy)
    });
    let integral = integral_image::<_, u64>(&padded);

    let area = f64::from(block * block);
    GrayImage::from_fn(w, h, |x, y| {
        // Window centred on (x, y) starts at (x, y) in padded coordinates
        let sum = sum_image_pixels(&integral, x, y, x + block - 1, y + block - 1)[0];
        let mean = sum as f64 / area;
        let value = f64::from(gray.get_pixel(x, y).0[0]);
        if value > mean - f64::from(constant) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Grayscale plus the filters selected in `options`
pub fn preprocess(img: &RgbaImage, options: &OcrOptions) -> GrayImage {
    let (upscaled, _) = upscale_for_ocr(img);
    let mut gray = upscaled.to_luma8();

    if options.math_mode {
        // Same weight as a 3x3 Gaussian kernel
        gray = image::imageops::blur(&gray, 0.8);
    }
    if options.adaptive_threshold {
        gray = adaptive_threshold(&gray, options.block_size, options.threshold_constant);
    }
    gray
}

/// A detected tesseract installation.
///
/// Created once by whoever owns it and passed by reference into every OCR
/// call; there is no process-wide engine.
pub struct TesseractEngine {
    languages: Vec<String>,
}

impl TesseractEngine {
    pub fn new() -> Result<Self, OcrError> {
        let version = rusty_tesseract::get_tesseract_version()
            .map_err(|e| OcrError::EngineUnavailable(e.to_string()))?;
        let languages = rusty_tesseract::get_tesseract_langs().unwrap_or_else(|e| {
            log::warn!("Could not list tesseract languages: {e}");
            Vec::new()
        });
        log::info!(
            "Using tesseract {} ({} languages installed)",
            version.lines().next().unwrap_or_default(),
            languages.len()
        );
        Ok(Self { languages })
    }
}

impl OcrProvider for TesseractEngine {
    fn recognize(&self, img: &RgbaImage, options: &OcrOptions) -> Result<String, OcrError> {
        use rusty_tesseract::{Args, Image};

        let lang = tesseract_language(&options.language);
        if !self.languages.is_empty() && !self.languages.iter().any(|l| *l == lang) {
            log::warn!("Tesseract language {lang:?} is not installed");
        }

        log::info!(
            "Running OCR with rusty-tesseract on {}x{} image...",
            img.width(),
            img.height()
        );
        let processed = DynamicImage::ImageLuma8(preprocess(img, options));
        let tess_img =
            Image::from_dynamic_image(&processed).map_err(|e| OcrError::Image(e.to_string()))?;

        let min_dimension = img.width().min(img.height());
        let args = Args {
            lang,
            config_variables: HashMap::new(),
            // Higher DPI for better small text recognition
            dpi: Some(if min_dimension < 200 { 300 } else { 150 }),
            // Math is usually one uniform block; anything else is sparse text
            psm: Some(if options.math_mode { 6 } else { 11 }),
            oem: Some(3),
        };

        let text = rusty_tesseract::image_to_string(&tess_img, &args)
            .map_err(|e| OcrError::Recognition(e.to_string()))?;
        let text = text.trim().to_string();
        log::info!("OCR produced {} characters", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn english_aliases_map_to_eng() {
        for alias in ["en", "en-US", "en-GB", "eng", ""] {
            assert_eq!(tesseract_language(alias), "eng");
        }
        assert_eq!(tesseract_language("deu"), "deu");
    }

    #[test]
    fn small_images_are_upscaled() {
        let tiny = RgbaImage::new(50, 300);
        let (img, factor) = upscale_for_ocr(&tiny);
        assert_eq!(factor, 4);
        assert_eq!((img.width(), img.height()), (200, 1200));

        let small = RgbaImage::new(150, 400);
        assert_eq!(upscale_for_ocr(&small).1, 2);

        let large = RgbaImage::new(640, 480);
        let (img, factor) = upscale_for_ocr(&large);
        assert_eq!(factor, 1);
        assert_eq!((img.width(), img.height()), (640, 480));
    }

    #[test]
    fn uniform_background_turns_white() {
        let gray = GrayImage::from_pixel(30, 30, Luma([100]));
        let out = adaptive_threshold(&gray, 5, 10);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn dark_stroke_on_light_background_stays_black() {
        let mut gray = GrayImage::from_pixel(31, 31, Luma([200]));
        for y in 0..31 {
            gray.put_pixel(15, y, Luma([20]));
        }
        let out = adaptive_threshold(&gray, 7, 10);
        assert_eq!(out.get_pixel(15, 15).0[0], 0);
        assert_eq!(out.get_pixel(15, 0).0[0], 0);
        assert_eq!(out.get_pixel(2, 15).0[0], 255);
        assert_eq!(out.dimensions(), (31, 31));
    }

    #[test]
    fn threshold_matches_windowed_mean() {
        let gray = GrayImage::from_fn(17, 11, |x, y| Luma([((x * 37 + y * 91) % 256) as u8]));
        let (block, constant) = (5u32, 3);
        let r = (block / 2) as i64;
        let out = adaptive_threshold(&gray, block, constant);
        for y in 0..11i64 {
            for x in 0..17i64 {
                let mut sum = 0u64;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let sx = (x + dx).clamp(0, 16) as u32;
                        let sy = (y + dy).clamp(0, 10) as u32;
                        sum += u64::from(gray.get_pixel(sx, sy).0[0]);
                    }
                }
                let mean = sum as f64 / f64::from(block * block);
                let value = f64::from(gray.get_pixel(x as u32, y as u32).0[0]);
                let expected = if value > mean - f64::from(constant) { 255 } else { 0 };
                assert_eq!(out.get_pixel(x as u32, y as u32).0[0], expected, "at {x},{y}");
            }
        }
    }

    #[test]
    fn even_block_size_is_made_odd() {
        let mut gray = GrayImage::from_pixel(12, 12, Luma([180]));
        gray.put_pixel(6, 6, Luma([0]));
        // 4 -> 5, 0 -> 3: both still isolate the dark pixel
        assert_eq!(adaptive_threshold(&gray, 4, 5).get_pixel(6, 6).0[0], 0);
        assert_eq!(adaptive_threshold(&gray, 0, 5).get_pixel(6, 6).0[0], 0);
    }

    #[test]
    fn preprocess_is_grayscale_at_upscaled_size() {
        let img = RgbaImage::from_pixel(120, 250, Rgba([255, 255, 255, 255]));
        let options = OcrOptions {
            math_mode: true,
            adaptive_threshold: true,
            ..OcrOptions::default()
        };
        let out = preprocess(&img, &options);
        assert_eq!(out.dimensions(), (240, 500));
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }
}
