//! # Thermy - Bluetooth LE Cat Printer Library
//!
//! Thermy prints text and images on the cheap Bluetooth LE thermal printers
//! sold as GB01, MX10, XW001 and friends ("cat printers"). It provides:
//!
//! - **Rendering**: text and images to a paper-wide 1-bit bitmap
//! - **Protocol**: checksummed command frames and the print job sequence
//! - **Transport**: scanning and a paced, retrying BLE session
//! - **Profiles**: a static table of supported models
//!
//! ## Quick Start
//!
//! ```no_run
//! use thermy::{
//!     config::{PrintSettings, TransportConfig},
//!     printer::profile,
//!     protocol::job,
//!     render::{font::BitmapFont, text::{render_text, TextOptions}},
//!     transport::{memory::{MemoryAdapter, MemoryPrinter}, TransportSession},
//! };
//!
//! # async fn demo() -> Result<(), thermy::ThermyError> {
//! let profile = profile::DEFAULT_PROFILE;
//!
//! // Render text to a bitmap as wide as the paper
//! let font = BitmapFont::new(16);
//! let bitmap = render_text("Hello, cat!", profile.paper_width_dots as usize, &font, &TextOptions::default());
//!
//! // Encode it into packets
//! let job = job::encode(&bitmap, profile, &PrintSettings::default())?;
//!
//! // Send it (swap in transport::btle::BtleAdapter for a real printer)
//! let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new("AA:BB:CC:DD:EE:FF", "GB01"));
//! let mut session = TransportSession::new(&adapter, "AA:BB:CC:DD:EE:FF", TransportConfig::default());
//! session.run(&job, std::future::pending::<()>()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`render`] | Bitmaps, fonts, text layout, image dithering |
//! | [`protocol`] | Frames, CRC-8, job encoding |
//! | [`transport`] | BLE adapter seam, discovery, session |
//! | [`printer`] | Printer profiles |
//! | [`config`] | Settings and validation |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! All models have a 384 dot (48 mm) print head:
//! GB01-GB04, MX10, XW001-XW009, JX001-JX006, LY01-LY03, LY10, M01, PR02,
//! PR07, AI01, GT01.

pub mod config;
pub mod error;
pub mod logging;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod requirements;
pub mod transport;

// Re-exports for convenience
pub use error::ThermyError;
pub use printer::PrinterProfile;
pub use render::RasterImage;
