//! # Rendering Module
//!
//! Everything that turns user input into a printable [`RasterImage`].
//!
//! ## Modules
//!
//! - [`raster`]: the packed 1-bit bitmap and its geometry helpers
//! - [`font`]: glyph sources (embedded Spleen, TrueType)
//! - [`text`]: text layout, alignment, invert and border
//! - [`image`]: decoded pictures scaled, dithered and centered
//! - [`dither`]: threshold, Floyd-Steinberg and Bayer dithering
//!
//! Both input paths produce a bitmap exactly as wide as the paper.
//!
//! ## Usage Example
//!
//! ```
//! use thermy::render::font::BitmapFont;
//! use thermy::render::text::{render_text, TextOptions};
//!
//! let font = BitmapFont::new(24);
//! let bitmap = render_text("Meow", 384, &font, &TextOptions::default());
//!
//! // bitmap is ready for protocol::job::encode()
//! assert_eq!(bitmap.width_dots(), 384);
//! ```

pub mod dither;
pub mod font;
pub mod image;
pub mod raster;
pub mod text;

pub use raster::RasterImage;
