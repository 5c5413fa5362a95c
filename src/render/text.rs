//! # Text Rasterization
//!
//! Turns a string into a paper-wide [`RasterImage`].
//!
//! ## Pipeline
//!
//! ```text
//! text ─► normalize ─► split + wrap ─► render runs ─► align ─► stack
//!                                                               │
//!                    RasterImage ◄─ frame (border) ◄─ invert ◄──┘
//! ```
//!
//! ## Geometry
//!
//! - Each line is rendered as one run exactly `line_height` (= font size) tall.
//! - Runs are placed at `left` → 0, `center` → `(width - run) / 2`,
//!   `right` → `width - run`.
//! - Lines stack with a pitch of `line_height + spacing`, where
//!   `spacing = max(line_height / 4, 4)`.
//! - With a border of N dots, text is laid out N dots narrower on each side
//!   and the frame is added around the finished region, so the output is
//!   still exactly the paper width.
//!
//! ## Example
//!
//! ```
//! use thermy::render::font::BitmapFont;
//! use thermy::render::text::{render_text, Alignment, TextOptions};
//!
//! let font = BitmapFont::new(16);
//! let options = TextOptions { align: Alignment::Center, ..Default::default() };
//! let image = render_text("Hello\nWorld", 384, &font, &options);
//! assert_eq!(image.width_dots(), 384);
//! assert_eq!(image.height_rows(), 16 + 4 + 16);
//! ```

use std::fmt;
use std::str::FromStr;

use super::font::GlyphSource;
use super::raster::RasterImage;

/// Spaces a tab expands to.
const TAB_WIDTH: usize = 4;

/// Minimum gap between lines in pixels.
const MIN_LINE_SPACING: usize = 4;

/// Horizontal placement of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl Alignment {
    /// Offset of a run `run_width` wide inside `width`.
    #[inline]
    pub fn offset(self, width: usize, run_width: usize) -> usize {
        let slack = width.saturating_sub(run_width);
        match self {
            Self::Left => 0,
            Self::Center => slack / 2,
            Self::Right => slack,
        }
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" | "centre" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(format!(
                "unknown alignment '{}' (expected left, center or right)",
                other
            )),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        })
    }
}

/// Styling of a text print.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOptions {
    pub align: Alignment,
    /// Swap ink and background inside the text region
    pub invert: bool,
    /// Frame thickness in dots, 0 for none
    pub border: usize,
}

/// One laid-out line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRun {
    pub text: String,
    /// Horizontal offset of the run inside the region
    pub offset: usize,
    /// Top row of the run inside the region
    pub top: usize,
    /// Rendered glyphs, `line_height` tall
    pub run: RasterImage,
}

/// Lines placed inside a region of fixed width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayout {
    pub width: usize,
    pub height: usize,
    pub lines: Vec<LineRun>,
}

impl TextLayout {
    /// Draw every run onto a blank region.
    pub fn compose(&self) -> RasterImage {
        let mut region = RasterImage::new(self.width, self.height);
        for line in &self.lines {
            region.blit(&line.run, line.offset, line.top);
        }
        region
    }
}

/// Gap between stacked lines for a given line height.
#[inline]
pub fn line_spacing(line_height: usize) -> usize {
    (line_height / 4).max(MIN_LINE_SPACING)
}

/// Clean up text coming from the command line or a file.
///
/// - literal `\n` and `\t` escape sequences become a newline and a tab
/// - CRLF becomes LF and trailing line breaks are dropped
/// - tabs expand to spaces
pub fn normalize(text: &str) -> String {
    text.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\r\n", "\n")
        .trim_end_matches(['\n', '\r'])
        .replace('\t', &" ".repeat(TAB_WIDTH))
}

/// Break one line into pieces no wider than `width`.
///
/// Breaks at spaces where possible; a single word wider than `width` is
/// split between characters. Every piece holds at least one character, so
/// nothing is ever dropped.
pub fn wrap_line(line: &str, width: usize, font: &dyn GlyphSource) -> Vec<String> {
    if font.measure(line) <= width {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in line.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if font.measure(&candidate) <= width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if font.measure(word) <= width {
            current = word.to_string();
            continue;
        }

        // Hard-break an overlong word
        for ch in word.chars() {
            let mut next = current.clone();
            next.push(ch);
            if font.measure(&next) > width && !current.is_empty() {
                pieces.push(std::mem::replace(&mut current, ch.to_string()));
            } else {
                current = next;
            }
        }
    }

    if !current.is_empty() || pieces.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Lay out already-normalized text inside a region `width` dots wide.
pub fn layout(text: &str, width: usize, font: &dyn GlyphSource, align: Alignment) -> TextLayout {
    let line_height = font.line_height();
    let pitch = line_height + line_spacing(line_height);

    let lines: Vec<String> = text
        .split('\n')
        .flat_map(|line| wrap_line(line, width, font))
        .collect();

    let runs: Vec<LineRun> = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let run = font.render_line(&text);
            LineRun {
                offset: align.offset(width, run.width_dots()),
                top: i * pitch,
                run,
                text,
            }
        })
        .collect();

    let height = match runs.len() {
        0 => 1,
        n => (n * pitch - line_spacing(line_height)).max(1),
    };

    TextLayout {
        width,
        height,
        lines: runs,
    }
}

/// Render text to a bitmap exactly `paper_width` dots wide.
///
/// Invert is applied to the composed text region, then the border frames it.
pub fn render_text(
    text: &str,
    paper_width: usize,
    font: &dyn GlyphSource,
    options: &TextOptions,
) -> RasterImage {
    let inner_width = paper_width.saturating_sub(2 * options.border);
    let mut region = layout(&normalize(text), inner_width, font, options.align).compose();

    if options.invert {
        region.invert();
    }

    if options.border > 0 {
        region = region.framed(options.border);
    }

    debug_assert_eq!(region.width_dots(), paper_width.max(2 * options.border));
    region
}

// ============================================================================
// TESTS
// ============================================================================
