//! # Raster Images
//!
//! [`RasterImage`] is the monochrome bitmap every input path produces and
//! the protocol encoder consumes.
//!
//! ## Bit Packing
//!
//! Rows are packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = ink (print), 0 = background (no print)
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x0F = 00001111 = ░░░░████
//! ```
//!
//! Row stride is `ceil(width / 8)` bytes. When the width is not a multiple of
//! 8, the unused low bits of the last byte in each row are always zero.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::error::ThermyError;

/// A 1-bit-per-pixel bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width_dots: usize,
    height_rows: usize,
    data: Vec<u8>,
}

impl RasterImage {
    /// Create an all-background image.
    pub fn new(width_dots: usize, height_rows: usize) -> Self {
        Self {
            width_dots,
            height_rows,
            data: vec![0u8; width_dots.div_ceil(8) * height_rows],
        }
    }

    /// Build an image from a row-major pixel predicate.
    pub fn from_fn<F>(width_dots: usize, height_rows: usize, mut ink: F) -> Self
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut image = Self::new(width_dots, height_rows);
        for y in 0..height_rows {
            for x in 0..width_dots {
                if ink(x, y) {
                    image.set(x, y, true);
                }
            }
        }
        image
    }

    #[inline]
    pub fn width_dots(&self) -> usize {
        self.width_dots
    }

    #[inline]
    pub fn height_rows(&self) -> usize {
        self.height_rows
    }

    /// Bytes per row
    #[inline]
    pub fn width_bytes(&self) -> usize {
        self.width_dots.div_ceil(8)
    }

    /// Packed row data, `width_bytes() * height_rows()` bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packed bytes of row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.width_bytes();
        &self.data[y * stride..(y + 1) * stride]
    }

    /// Iterate over packed rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks() panics on 0, and a zero-width image has no row bytes anyway
        self.data.chunks(self.width_bytes().max(1))
    }

    /// Is the dot at (x, y) inked? Out-of-range reads are background.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width_dots || y >= self.height_rows {
            return false;
        }
        let byte = self.data[y * self.width_bytes() + x / 8];
        (byte >> (7 - (x % 8))) & 1 == 1
    }

    /// Set or clear the dot at (x, y). Out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, ink: bool) {
        if x >= self.width_dots || y >= self.height_rows {
            return;
        }
        let idx = y * self.width_bytes() + x / 8;
        let mask = 1u8 << (7 - (x % 8));
        if ink {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    /// Number of inked dots.
    pub fn ink_count(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Swap ink and background for every dot, in place.
    ///
    /// Applying it twice gives back the original image.
    pub fn invert(&mut self) {
        for byte in &mut self.data {
            *byte = !*byte;
        }
        self.clear_padding();
    }

    /// Copy `src` onto this image with its top-left corner at (x, y).
    ///
    /// Ink in `src` is OR-ed in. Parts falling outside are clipped.
    pub fn blit(&mut self, src: &RasterImage, x: usize, y: usize) {
        for sy in 0..src.height_rows {
            for sx in 0..src.width_dots {
                if src.get(sx, sy) {
                    self.set(x + sx, y + sy, true);
                }
            }
        }
    }

    /// Copy out a rectangle. The rectangle is clipped to the image.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> RasterImage {
        let width = width.min(self.width_dots.saturating_sub(x));
        let height = height.min(self.height_rows.saturating_sub(y));
        RasterImage::from_fn(width, height, |cx, cy| self.get(x + cx, y + cy))
    }

    /// Surround the image with an ink frame `thickness` dots thick.
    ///
    /// The result is `2 * thickness` larger in both directions. The original
    /// content sits untouched inside the frame.
    ///
    /// ```
    /// use thermy::render::raster::RasterImage;
    ///
    /// let framed = RasterImage::new(4, 2).framed(1);
    /// assert_eq!((framed.width_dots(), framed.height_rows()), (6, 4));
    /// assert_eq!(framed.ink_count(), 6 * 4 - 4 * 2);
    /// ```
    pub fn framed(&self, thickness: usize) -> RasterImage {
        let width = self.width_dots + 2 * thickness;
        let height = self.height_rows + 2 * thickness;
        let mut out = RasterImage::from_fn(width, height, |x, y| {
            x < thickness || y < thickness || x >= width - thickness || y >= height - thickness
        });
        out.blit(self, thickness, thickness);
        out
    }

    /// Remove `thickness` dots from every edge, the inverse of [`framed`](Self::framed).
    pub fn unframed(&self, thickness: usize) -> RasterImage {
        self.crop(
            thickness,
            thickness,
            self.width_dots.saturating_sub(2 * thickness),
            self.height_rows.saturating_sub(2 * thickness),
        )
    }

    /// Center the image on a wider background canvas.
    ///
    /// The left pad is `(width - self.width) / 2` (floor), so the two pads
    /// differ by at most one dot. Images already `width` wide or wider are
    /// returned unchanged.
    pub fn centered(&self, width: usize) -> RasterImage {
        if self.width_dots >= width {
            return self.clone();
        }
        let left = (width - self.width_dots) / 2;
        let mut out = RasterImage::new(width, self.height_rows);
        out.blit(self, left, 0);
        out
    }

    /// Convert to an 8-bit grayscale image (ink = black).
    pub fn to_gray_image(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width_dots as u32, self.height_rows as u32);
        for y in 0..self.height_rows {
            for x in 0..self.width_dots {
                let color = if self.get(x, y) { 0u8 } else { 255u8 };
                img.put_pixel(x as u32, y as u32, Luma([color]));
            }
        }
        img
    }

    /// Save as a PNG preview.
    pub fn save_png(&self, path: &Path) -> Result<(), ThermyError> {
        self.to_gray_image().save(path).map_err(|e| {
            ThermyError::Input(format!("Failed to save PNG {}: {}", path.display(), e))
        })
    }

    /// Zero the unused bits at the end of every row.
    fn clear_padding(&mut self) {
        let tail = self.width_dots % 8;
        if tail == 0 || self.height_rows == 0 {
            return;
        }
        let mask = 0xFFu8 << (8 - tail);
        let stride = self.width_bytes();
        for y in 0..self.height_rows {
            self.data[y * stride + stride - 1] &= mask;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
