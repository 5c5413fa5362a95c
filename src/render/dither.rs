//! # Dithering
//!
//! Converts an 8-bit grayscale buffer to a 1-bit [`RasterImage`].
//!
//! ## What is Dithering?
//!
//! Dithering simulates grayscale on a device that can only print black or white.
//! By varying the density of black dots, we create the illusion of different
//! gray levels.
//!
//! ```text
//! Grayscale:    White    Light    Medium    Dark    Black
//!               ░░░░░░   ░░▒░░░   ░▒░▒░▒   ▒▓▒▓▒▓   ██████
//! ```
//!
//! ## Algorithms
//!
//! | Method | Speed | Quality | Use |
//! |--------|-------|---------|-----|
//! | Threshold | Fastest | Banding | Text, line art |
//! | Floyd-Steinberg | Slow | Best | Photos (default) |
//! | Bayer 8x8 | Fast | Good | Flat shading, regular halftone |
//!
//! All three are deterministic: the same buffer always yields the same bitmap.
//!
//! ## Input Convention
//!
//! Gray values use the image convention: `0.0` = black, `255.0` = white.
//! A dot is inked when it quantizes to black.

use std::fmt;
use std::str::FromStr;

use super::raster::RasterImage;

/// Quantization threshold of the threshold and Floyd-Steinberg algorithms.
pub const THRESHOLD: f32 = 128.0;

/// Bayer 8x8 dithering matrix
///
/// Values range from 0-63. Low values activate first at low intensities.
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Dithering algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitheringAlgorithm {
    /// Hard cut at [`THRESHOLD`]
    Threshold,
    /// Error diffusion with the 7/3/5/1 kernel
    #[default]
    FloydSteinberg,
    /// Ordered dithering with [`BAYER8`]
    Bayer,
}

impl FromStr for DitheringAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "threshold" => Ok(Self::Threshold),
            "floyd-steinberg" | "floyd_steinberg" | "fs" => Ok(Self::FloydSteinberg),
            "bayer" => Ok(Self::Bayer),
            other => Err(format!(
                "unknown dithering algorithm '{}' (expected threshold, floyd-steinberg or bayer)",
                other
            )),
        }
    }
}

impl fmt::Display for DitheringAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Threshold => "threshold",
            Self::FloydSteinberg => "floyd-steinberg",
            Self::Bayer => "bayer",
        })
    }
}

/// Get the Bayer threshold for a pixel position, in (0, 1).
///
/// ```text
/// threshold = (BAYER8[y mod 8][x mod 8] + 0.5) / 64.0
/// ```
#[inline]
pub fn bayer_threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// Dither a row-major gray buffer of `width * height` values.
///
/// ## Example
///
/// ```
/// use thermy::render::dither::{dither, DitheringAlgorithm};
///
/// let gray = vec![0.0, 255.0, 0.0, 255.0];
/// let img = dither(&gray, 4, 1, DitheringAlgorithm::Threshold);
/// assert_eq!(img.row(0), &[0b1010_0000]);
/// ```
pub fn dither(gray: &[f32], width: usize, height: usize, algorithm: DitheringAlgorithm) -> RasterImage {
    debug_assert_eq!(gray.len(), width * height, "gray buffer size mismatch");
    match algorithm {
        DitheringAlgorithm::Threshold => {
            RasterImage::from_fn(width, height, |x, y| gray[y * width + x] <= THRESHOLD)
        }
        DitheringAlgorithm::Bayer => RasterImage::from_fn(width, height, |x, y| {
            let intensity = 1.0 - gray[y * width + x].clamp(0.0, 255.0) / 255.0;
            intensity > bayer_threshold(x, y)
        }),
        DitheringAlgorithm::FloydSteinberg => floyd_steinberg(gray, width, height),
    }
}

/// Floyd-Steinberg error diffusion.
///
/// ```text
///          X   7/16
///   3/16  5/16  1/16
/// ```
///
/// Pixels are visited left-to-right, top-to-bottom. Each pixel quantizes to
/// 0 or 255 (cut: `> 128` is white) and pushes its error to the unvisited
/// neighbors.
fn floyd_steinberg(gray: &[f32], width: usize, height: usize) -> RasterImage {
    let mut mono = gray.to_vec();
    let mut image = RasterImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let p = y * width + x;
            let old = mono[p];
            let new = if old > THRESHOLD { 255.0 } else { 0.0 };
            let err = old - new;
            if new == 0.0 {
                image.set(x, y, true);
            }

            if x + 1 < width {
                mono[p + 1] += err * 7.0 / 16.0;
            }
            if y + 1 < height {
                if x >= 1 {
                    mono[p + width - 1] += err * 3.0 / 16.0;
                }
                mono[p + width] += err * 5.0 / 16.0;
                if x + 1 < width {
                    mono[p + width + 1] += err * 1.0 / 16.0;
                }
            }
        }
    }

    image
}

// ============================================================================
// TESTS
// ============================================================================
