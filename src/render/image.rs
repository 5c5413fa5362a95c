//! # Image Rasterization
//!
//! Turns a decoded picture into a paper-wide [`RasterImage`].
//!
//! ```text
//! file ─► decode ─► flatten alpha ─► shrink to paper ─► gray ─► dither ─► center
//! ```
//!
//! - Transparent pixels are composited over white paper.
//! - Gray uses the luma weights `0.2125 R + 0.7154 G + 0.0721 B`.
//! - Images wider than the paper are scaled down with the aspect ratio kept
//!   (`height = floor(h * W / w)`, at least 1). Narrower images keep their
//!   size and are centered.

use std::path::Path;

use image::{DynamicImage, RgbImage, imageops::FilterType};

use super::dither::{self, DitheringAlgorithm};
use super::raster::RasterImage;
use crate::error::ThermyError;

const RED_WEIGHT: f32 = 0.2125;
const GREEN_WEIGHT: f32 = 0.7154;
const BLUE_WEIGHT: f32 = 0.0721;

/// Decode an image file.
pub fn load(path: &Path) -> Result<DynamicImage, ThermyError> {
    image::open(path).map_err(|e| {
        ThermyError::Input(format!("Failed to decode image {}: {}", path.display(), e))
    })
}

/// Composite the alpha channel over white.
pub fn flatten_alpha(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let over_white = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    rgb
}

/// Size the image takes on paper `paper_width` dots wide.
///
/// Never upscales.
pub fn fit_to_width(width: u32, height: u32, paper_width: u32) -> (u32, u32) {
    if width <= paper_width {
        return (width, height);
    }
    let scaled = (height as u64 * paper_width as u64 / width as u64) as u32;
    (paper_width, scaled.max(1))
}

/// Row-major gray values, 0 = black, 255 = white.
pub fn luminance(rgb: &RgbImage) -> Vec<f32> {
    rgb.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            RED_WEIGHT * r as f32 + GREEN_WEIGHT * g as f32 + BLUE_WEIGHT * b as f32
        })
        .collect()
}

/// Convert a decoded image to a bitmap exactly `paper_width` dots wide.
pub fn rasterize(
    img: &DynamicImage,
    paper_width: usize,
    algorithm: DitheringAlgorithm,
) -> Result<RasterImage, ThermyError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ThermyError::Input("image has no pixels".to_string()));
    }

    let flat = flatten_alpha(img);
    let (width, height) = fit_to_width(flat.width(), flat.height(), paper_width as u32);
    let fitted = if (width, height) == flat.dimensions() {
        flat
    } else {
        tracing::debug!(
            from_width = flat.width(),
            from_height = flat.height(),
            width,
            height,
            "scaling image to paper width"
        );
        image::imageops::resize(&flat, width, height, FilterType::Triangle)
    };

    let gray = luminance(&fitted);
    let bitmap = dither::dither(&gray, width as usize, height as usize, algorithm);
    Ok(bitmap.centered(paper_width))
}

/// Decode and rasterize an image file.
pub fn rasterize_file(
    path: &Path,
    paper_width: usize,
    algorithm: DitheringAlgorithm,
) -> Result<RasterImage, ThermyError> {
    let img = load(path)?;
    rasterize(&img, paper_width, algorithm)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn test_fit_to_width() {
        assert_eq!(fit_to_width(100, 50, 384), (100, 50));
        assert_eq!(fit_to_width(768, 100, 384), (384, 50));
        assert_eq!(fit_to_width(800, 1, 384), (384, 1));
        assert_eq!(fit_to_width(1000, 333, 384), (384, 127));
    }

    #[test]
    fn test_transparent_is_white() {
        let flat = flatten_alpha(&solid(2, 2, [0, 0, 0, 0]));
        assert!(flat.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_luminance_weights() {
        let mut rgb = RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, image::Rgb([255, 255, 255]));
        let gray = luminance(&rgb);
        assert!((gray[0] - 54.1875).abs() < 1e-3);
        assert!((gray[1] - 182.427).abs() < 1e-3);
        assert!((gray[2] - 255.0).abs() < 0.01);
    }

    #[test]
    fn test_single_pixel_black() {
        let bitmap = rasterize(&solid(1, 1, [0, 0, 0, 255]), 384, DitheringAlgorithm::default())
            .unwrap();
        assert_eq!(bitmap.width_dots(), 384);
        assert_eq!(bitmap.height_rows(), 1);
        assert_eq!(bitmap.ink_count(), 1);
        assert!(bitmap.get(191, 0));
    }

    #[test]
    fn test_wide_image_scaled_down() {
        let bitmap = rasterize(&solid(1536, 40, [0, 0, 0, 255]), 384, DitheringAlgorithm::Threshold)
            .unwrap();
        assert_eq!(bitmap.width_dots(), 384);
        assert_eq!(bitmap.height_rows(), 10);
        assert_eq!(bitmap.ink_count(), 384 * 10);
    }

    #[test]
    fn test_white_image_prints_nothing() {
        let bitmap = rasterize(&solid(50, 20, [255, 255, 255, 255]), 384, DitheringAlgorithm::Bayer)
            .unwrap();
        assert_eq!(bitmap.ink_count(), 0);
        assert_eq!(bitmap.height_rows(), 20);
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = rasterize(&solid(0, 0, [0, 0, 0, 255]), 384, DitheringAlgorithm::Threshold)
            .unwrap_err();
        assert!(matches!(err, ThermyError::Input(_)));
    }

    #[test]
    fn test_unreadable_file() {
        let err = load(Path::new("/nonexistent/picture.png")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
