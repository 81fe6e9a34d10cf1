//! Image preprocessing for the traditional OCR path.
//!
//! Applies the classic cleanup sequence before box-level OCR: grayscale,
//! denoise, contrast enhancement, deskew, adaptive binarization. Each step is
//! gated by configuration; the whole stage is a pure function of the input
//! image plus config, with no side effects.
//!
//! Vision engines receive the original image bytes — preprocessing only
//! helps the box detectors.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use tracing::debug;

use crate::config::PreprocessConfig;
use crate::ocr::engine::EngineError;

/// Contrast multiplier applied around the image mean.
const CONTRAST_FACTOR: f32 = 1.5;

/// Minimum detected skew (degrees) worth correcting.
const DESKEW_MIN_ANGLE: f32 = 0.5;

/// Minimum number of foreground pixels needed for skew detection.
const DESKEW_MIN_POINTS: usize = 100;

/// Adaptive threshold block radius (block size 11).
const BINARIZE_BLOCK_RADIUS: u32 = 5;

/// Gray level below which a pixel counts as text foreground.
const FOREGROUND_THRESHOLD: u8 = 128;

pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Apply the full preprocessing pipeline.
    pub fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let mut gray = image.to_luma8();

        if self.config.denoise_strength > 0 {
            gray = self.denoise(&gray);
        }
        if self.config.contrast_enhancement {
            gray = enhance_contrast(&gray, CONTRAST_FACTOR);
        }
        if self.config.deskew_enabled {
            gray = deskew(&gray);
        }
        if self.config.binarize_enabled {
            gray = adaptive_threshold(&gray, BINARIZE_BLOCK_RADIUS);
        }
        gray
    }

    fn denoise(&self, image: &GrayImage) -> GrayImage {
        let sigma = self.config.denoise_strength as f32 / 10.0;
        gaussian_blur_f32(image, sigma)
    }

    /// Load `path`, clamp its size, preprocess, and write a PNG into
    /// `out_dir` for CLI-driven OCR engines.
    pub fn preprocess_to_png(
        &self,
        path: &Path,
        out_dir: &Path,
        max_size: (u32, u32),
    ) -> Result<PathBuf, EngineError> {
        let image = image::open(path)
            .map_err(|e| EngineError::Image(format!("failed to load {}: {}", path.display(), e)))?;
        let image = resize_if_needed(image, max_size);
        let processed = self.preprocess(&image);

        let out_path = out_dir.join("preprocessed.png");
        processed
            .save(&out_path)
            .map_err(|e| EngineError::Image(format!("failed to write processed image: {}", e)))?;
        Ok(out_path)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

/// Downscale only when a dimension exceeds the maximum, preserving aspect
/// ratio. Uses area-style (triangle) filtering, the right choice for
/// shrinking scanned pages.
pub fn resize_if_needed(image: DynamicImage, max_size: (u32, u32)) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let (max_w, max_h) = max_size;
    if w <= max_w && h <= max_h {
        return image;
    }

    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);
    debug!("resizing image {}x{} -> {}x{}", w, h, new_w, new_h);
    image.resize_exact(new_w, new_h, FilterType::Triangle)
}

/// Stretch pixel values around the image mean by `factor`.
fn enhance_contrast(image: &GrayImage, factor: f32) -> GrayImage {
    let pixels = image.as_raw();
    if pixels.is_empty() {
        return image.clone();
    }
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
    let mean = mean as f32;

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let value = mean + factor * (pixel.0[0] as f32 - mean);
        pixel.0[0] = value.clamp(0.0, 255.0) as u8;
    }
    out
}

/// Detect the dominant text angle from the minimum-area rectangle of the
/// foreground pixels and rotate to correct it. Angles at or below
/// `DESKEW_MIN_ANGLE` are left alone.
fn deskew(image: &GrayImage) -> GrayImage {
    let points: Vec<Point<i32>> = image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] < FOREGROUND_THRESHOLD)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();

    if points.len() < DESKEW_MIN_POINTS {
        return image.clone();
    }

    let angle = dominant_angle(&min_area_rect(&points));
    if angle.abs() <= DESKEW_MIN_ANGLE {
        return image.clone();
    }

    debug!("deskewing image by {:.2} degrees", angle);
    // Rotate against the detected skew; fill exposed corners with paper white.
    rotate_about_center(
        image,
        -angle.to_radians(),
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

/// Angle (degrees) of the longer edge of a min-area rectangle, normalized
/// into (-45, 45].
fn dominant_angle(corners: &[Point<i32>; 4]) -> f32 {
    let edge = |a: Point<i32>, b: Point<i32>| {
        let dx = (b.x - a.x) as f32;
        let dy = (b.y - a.y) as f32;
        (dx * dx + dy * dy, dy.atan2(dx).to_degrees())
    };

    let (len1, angle1) = edge(corners[0], corners[1]);
    let (len2, angle2) = edge(corners[1], corners[2]);
    let mut angle = if len1 >= len2 { angle1 } else { angle2 };

    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    angle
}
