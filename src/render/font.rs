//! Glyph rasterization for the text path.
//!
//! Two sources produce the same thing, a 1-bit run of glyphs exactly one
//! line tall:
//!
//! - [`BitmapFont`]: the embedded Spleen bitmap fonts, scaled with nearest
//!   neighbor to the requested size. Needs no files and renders the same
//!   on every machine.
//! - [`TtfFont`]: any TrueType/OpenType file, rasterized with `ab_glyph`.
//!   Coverage of one half or more becomes ink.

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use spleen_font::{FONT_6X12, FONT_12X24, PSF2Font};

use super::raster::RasterImage;
use crate::error::ThermyError;

/// Something that can turn a line of text into pixels.
pub trait GlyphSource {
    /// Height of one rendered line in pixels.
    fn line_height(&self) -> usize;

    /// Width in pixels that `text` occupies when rendered.
    fn measure(&self, text: &str) -> usize;

    /// Render `text` as one run, `measure(text)` wide and `line_height()` tall.
    fn render_line(&self, text: &str) -> RasterImage;
}

// ============================================================================
// BITMAP FONT (SPLEEN)
// ============================================================================

/// An embedded Spleen face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpleenFace {
    width: usize,
    height: usize,
    data: &'static [u8],
}

const SPLEEN_FACES: [SpleenFace; 2] = [
    SpleenFace {
        width: 6,
        height: 12,
        data: FONT_6X12,
    },
    SpleenFace {
        width: 12,
        height: 24,
        data: FONT_12X24,
    },
];

/// Largest line height a [`BitmapFont`] renders at.
pub const MAX_BITMAP_SIZE: usize = 1024;

/// Spleen bitmap font scaled to a pixel size.
///
/// The face picked is the smallest one at least as tall as the requested
/// size (or the largest face), so glyphs are mostly scaled down. Sizes are
/// clamped to `1..=MAX_BITMAP_SIZE`.
///
/// ```
/// use thermy::render::font::{BitmapFont, GlyphSource};
///
/// let font = BitmapFont::new(16);
/// assert_eq!(font.line_height(), 16);
/// assert_eq!(font.measure("A"), 8);
/// ```
#[derive(Debug, Clone)]
pub struct BitmapFont {
    face: SpleenFace,
    cell_width: usize,
    cell_height: usize,
}

impl BitmapFont {
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, MAX_BITMAP_SIZE);
        let face = SPLEEN_FACES
            .iter()
            .copied()
            .find(|f| f.height >= size)
            .unwrap_or(SPLEEN_FACES[SPLEEN_FACES.len() - 1]);
        let cell_width = ((face.width * size + face.height / 2) / face.height).max(1);
        Self {
            face,
            cell_width,
            cell_height: size,
        }
    }

    /// Width of one character cell in pixels
    pub fn cell_width(&self) -> usize {
        self.cell_width
    }

    /// Raw face bitmap for `ch`, `face.width * face.height` values.
    fn face_glyph(&self, spleen: &mut Option<PSF2Font>, ch: char) -> Vec<bool> {
        let (w, h) = (self.face.width, self.face.height);
        let mut bits = vec![false; w * h];
        let utf8 = ch.to_string();

        let found = match spleen.as_mut() {
            Some(font) => match font.glyph_for_utf8(utf8.as_bytes()) {
                Some(glyph) => {
                    for (row_y, row) in glyph.enumerate() {
                        for (col_x, on) in row.enumerate() {
                            if row_y < h && col_x < w {
                                bits[row_y * w + col_x] = on;
                            }
                        }
                    }
                    true
                }
                None => false,
            },
            None => false,
        };

        if !found {
            draw_box(&mut bits, w, h);
        }
        bits
    }
}

impl GlyphSource for BitmapFont {
    fn line_height(&self) -> usize {
        self.cell_height
    }

    fn measure(&self, text: &str) -> usize {
        text.chars().count() * self.cell_width
    }

    fn render_line(&self, text: &str) -> RasterImage {
        let mut spleen = PSF2Font::new(self.face.data).ok();
        let mut run = RasterImage::new(self.measure(text), self.cell_height);
        let (fw, fh) = (self.face.width, self.face.height);

        for (i, ch) in text.chars().enumerate() {
            let src = self.face_glyph(&mut spleen, ch);
            let origin = i * self.cell_width;
            // Nearest neighbor from face size to cell size
            for dy in 0..self.cell_height {
                let sy = dy * fh / self.cell_height;
                for dx in 0..self.cell_width {
                    let sx = dx * fw / self.cell_width;
                    if src[sy * fw + sx] {
                        run.set(origin + dx, dy, true);
                    }
                }
            }
        }

        run
    }
}

/// Draw a box outline in the glyph buffer (missing-glyph marker).
fn draw_box(glyph: &mut [bool], width: usize, height: usize) {
    for x in 0..width {
        glyph[x] = true;
        glyph[(height - 1) * width + x] = true;
    }
    for y in 0..height {
        glyph[y * width] = true;
        glyph[y * width + width - 1] = true;
    }
}

// ============================================================================
// TRUETYPE FONT
// ============================================================================

/// A TrueType/OpenType font at a pixel size.
pub struct TtfFont {
    font: FontArc,
    size: usize,
}

impl TtfFont {
    /// Load a font file.
    pub fn load(path: &Path, size: usize) -> Result<Self, ThermyError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ThermyError::Input(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        Self::from_bytes(bytes, size).map_err(|e| match e {
            ThermyError::Input(msg) => ThermyError::Input(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse font data already in memory.
    pub fn from_bytes(bytes: Vec<u8>, size: usize) -> Result<Self, ThermyError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| ThermyError::Input(format!("not a usable font: {}", e)))?;
        Ok(Self {
            font,
            size: size.max(1),
        })
    }

    fn scale(&self) -> PxScale {
        PxScale::from(self.size as f32)
    }

    /// Glyph ids with their x positions, plus the total advance.
    fn layout(&self, text: &str) -> (Vec<(ab_glyph::GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(self.scale());
        let mut glyphs = Vec::new();
        let mut caret_x = 0.0f32;
        for ch in text.chars() {
            let glyph_id = self.font.glyph_id(ch);
            glyphs.push((glyph_id, caret_x));
            caret_x += scaled.h_advance(glyph_id);
        }
        (glyphs, caret_x)
    }
}

impl GlyphSource for TtfFont {
    fn line_height(&self) -> usize {
        self.size
    }

    fn measure(&self, text: &str) -> usize {
        self.layout(text).1.ceil() as usize
    }

    fn render_line(&self, text: &str) -> RasterImage {
        let (glyphs, advance) = self.layout(text);
        let width = advance.ceil() as usize;
        let height = self.size;
        let baseline_y = self.font.as_scaled(self.scale()).ascent();
        let mut coverage = vec![0.0f32; width * height];

        for (glyph_id, glyph_x) in glyphs {
            let glyph =
                glyph_id.with_scale_and_position(self.scale(), ab_glyph::point(glyph_x, baseline_y));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, c| {
                    let x = px as i32 + bounds.min.x as i32;
                    let y = py as i32 + bounds.min.y as i32;
                    if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                        let idx = y as usize * width + x as usize;
                        coverage[idx] = (coverage[idx] + c).min(1.0);
                    }
                });
            }
        }

        RasterImage::from_fn(width, height, |x, y| coverage[y * width + x] >= 0.5)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_selection() {
        assert_eq!(BitmapFont::new(12).face, SPLEEN_FACES[0]);
        assert_eq!(BitmapFont::new(8).face, SPLEEN_FACES[0]);
        assert_eq!(BitmapFont::new(16).face, SPLEEN_FACES[1]);
        assert_eq!(BitmapFont::new(48).face, SPLEEN_FACES[1]);
    }

    #[test]
    fn test_cell_geometry() {
        assert_eq!(BitmapFont::new(24).cell_width(), 12);
        assert_eq!(BitmapFont::new(16).cell_width(), 8);
        assert_eq!(BitmapFont::new(12).cell_width(), 6);
        assert_eq!(BitmapFont::new(1).cell_width(), 1);
        assert_eq!(BitmapFont::new(0).line_height(), 1);
    }

    #[test]
    fn test_huge_size_is_clamped() {
        let font = BitmapFont::new(usize::MAX);
        assert_eq!(font.line_height(), MAX_BITMAP_SIZE);
        assert_eq!(font.cell_width(), MAX_BITMAP_SIZE / 2);
        assert_eq!(font.measure("ab"), MAX_BITMAP_SIZE);
    }

    #[test]
    fn test_render_line_dimensions() {
        let font = BitmapFont::new(16);
        let run = font.render_line("Hello");
        assert_eq!(run.width_dots(), 40);
        assert_eq!(run.height_rows(), 16);
        assert!(run.ink_count() > 0);
    }

    #[test]
    fn test_space_is_blank() {
        let run = BitmapFont::new(24).render_line("   ");
        assert_eq!(run.width_dots(), 36);
        assert_eq!(run.ink_count(), 0);
    }

    #[test]
    fn test_empty_line() {
        let run = BitmapFont::new(16).render_line("");
        assert_eq!(run.width_dots(), 0);
        assert_eq!(run.height_rows(), 16);
    }

    #[test]
    fn test_glyph_stays_in_cell() {
        // Each glyph's ink stays inside its own cell
        let font = BitmapFont::new(24);
        let single = font.render_line("W");
        let pair = font.render_line("W ");
        assert_eq!(pair.crop(0, 0, 12, 24), single);
        assert_eq!(pair.crop(12, 0, 12, 24).ink_count(), 0);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let font = BitmapFont::new(20);
        assert_eq!(font.render_line("abc 123"), font.render_line("abc 123"));
    }

    #[test]
    fn test_bad_font_bytes_rejected() {
        let err = TtfFont::from_bytes(vec![0, 1, 2, 3], 16).err().unwrap();
        assert!(matches!(err, ThermyError::Input(_)));
    }

    #[test]
    fn test_missing_font_file() {
        let err = TtfFont::load(Path::new("/nonexistent/font.ttf"), 16).err().unwrap();
        assert!(err.to_string().contains("Failed to read font"));
    }
}
