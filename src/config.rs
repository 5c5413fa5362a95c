//! # Configuration
//!
//! Settings with their defaults and validation.
//!
//! | Type | Source | Purpose |
//! |------|--------|---------|
//! | [`TransportConfig`] | defaults, `--config <json>` | BLE link timing and chunking |
//! | [`PrintSettings`] | `--speed`, `--energy`, `--feed` | printer command parameters |
//! | [`JobOptions`] | all job flags | what to print and how |
//!
//! Everything is validated before any Bluetooth activity, so a bad flag
//! never leaves a half-configured printer behind.
//!
//! ## Config File
//!
//! All keys are optional:
//!
//! ```json
//! {
//!   "connect_timeout_ms": 10000,
//!   "mtu": 200,
//!   "write_delay_ms": 20,
//!   "max_retries": 3,
//!   "retry_backoff_ms": 100
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ThermyError;
use crate::printer::PrinterProfile;
use crate::render::dither::DitheringAlgorithm;
use crate::render::text::TextOptions;

/// Speed range accepted by the firmware.
pub const SPEED_RANGE: std::ops::RangeInclusive<u32> = 10..=90;

/// Energy range accepted by the firmware.
pub const ENERGY_RANGE: std::ops::RangeInclusive<u32> = 1..=65535;

/// Border thickness range in dots.
pub const BORDER_RANGE: std::ops::RangeInclusive<usize> = 1..=10;

/// Font size range in pixels.
pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<usize> = 4..=256;

/// Smallest write size worth using (ATT default MTU minus header).
pub const MIN_MTU: usize = 20;

// ============================================================================
// TRANSPORT
// ============================================================================

/// Timing and chunking of the BLE link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Give up connecting after this long
    pub connect_timeout_ms: u64,
    /// Largest single write in bytes
    pub mtu: usize,
    /// Pause after every write
    pub write_delay_ms: u64,
    /// Extra attempts for a failed write
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on each following one
    pub retry_backoff_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            mtu: 200,
            write_delay_ms: 20,
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl TransportConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ThermyError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ThermyError::Input(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            ThermyError::Input(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ThermyError> {
        if self.mtu < MIN_MTU {
            return Err(ThermyError::Input(format!(
                "mtu must be at least {} bytes, got {}",
                MIN_MTU, self.mtu
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ThermyError::Input("connect_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    /// Backoff before retry number `attempt` (0-based): `retry_backoff * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

// ============================================================================
// PRINT SETTINGS
// ============================================================================

/// Printer command parameters of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintSettings {
    /// Motor speed, 10 (slow, dark) to 90 (fast, light)
    pub speed: u8,
    /// Heating energy
    pub energy: u16,
    /// Rows of paper fed after the image
    pub feed_rows: u16,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            speed: 35,
            energy: 8000,
            feed_rows: 50,
        }
    }
}

impl PrintSettings {
    /// Build from raw flag values, rejecting anything out of range.
    pub fn new(speed: u32, energy: u32, feed_rows: u32) -> Result<Self, ThermyError> {
        if !SPEED_RANGE.contains(&speed) {
            return Err(ThermyError::Input(format!(
                "speed must be between {} and {}, got {}",
                SPEED_RANGE.start(),
                SPEED_RANGE.end(),
                speed
            )));
        }
        if !ENERGY_RANGE.contains(&energy) {
            return Err(ThermyError::Input(format!(
                "energy must be between {} and {}, got {}",
                ENERGY_RANGE.start(),
                ENERGY_RANGE.end(),
                energy
            )));
        }
        let feed_rows = u16::try_from(feed_rows).map_err(|_| {
            ThermyError::Input(format!("feed must be at most {} rows, got {}", u16::MAX, feed_rows))
        })?;
        Ok(Self {
            speed: speed as u8,
            energy: energy as u16,
            feed_rows,
        })
    }

    /// Re-check a value that did not come through [`PrintSettings::new`].
    pub fn validate(&self) -> Result<(), ThermyError> {
        Self::new(self.speed as u32, self.energy as u32, self.feed_rows as u32).map(|_| ())
    }
}

// ============================================================================
// JOB OPTIONS
// ============================================================================

/// What to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInput {
    Text(String),
    TextFile(PathBuf),
    Image(PathBuf),
}

/// A fully described print job, before rendering.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub input: JobInput,
    pub profile: &'static PrinterProfile,
    pub font_size: usize,
    /// TrueType font; the embedded bitmap font when `None`
    pub font_path: Option<PathBuf>,
    pub text: TextOptions,
    pub dither: DitheringAlgorithm,
    pub settings: PrintSettings,
}

impl JobOptions {
    /// Check every field. Input files must exist and be readable.
    pub fn validate(&self) -> Result<(), ThermyError> {
        if !FONT_SIZE_RANGE.contains(&self.font_size) {
            return Err(ThermyError::Input(format!(
                "font size must be between {} and {}, got {}",
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end(),
                self.font_size
            )));
        }
        validate_border(self.text.border)?;
        self.settings.validate()?;

        if let Some(font) = &self.font_path {
            check_readable(font, "font")?;
        }
        match &self.input {
            JobInput::Text(_) => {}
            JobInput::TextFile(path) => check_readable(path, "text file")?,
            JobInput::Image(path) => check_readable(path, "image")?,
        }

        let paper = self.profile.paper_width_dots as usize;
        if 2 * self.text.border >= paper {
            return Err(ThermyError::Input(format!(
                "border of {} dots leaves no room on {} dot paper",
                self.text.border, paper
            )));
        }
        Ok(())
    }
}

/// Border 0 means none; anything else must be within [`BORDER_RANGE`].
pub fn validate_border(border: usize) -> Result<(), ThermyError> {
    if border != 0 && !BORDER_RANGE.contains(&border) {
        return Err(ThermyError::Input(format!(
            "border must be between {} and {} dots, got {}",
            BORDER_RANGE.start(),
            BORDER_RANGE.end(),
            border
        )));
    }
    Ok(())
}

fn check_readable(path: &Path, what: &str) -> Result<(), ThermyError> {
    std::fs::File::open(path)
        .map(|_| ())
        .map_err(|e| ThermyError::Input(format!("Cannot read {} {}: {}", what, path.display(), e)))
}

// ============================================================================
// TESTS
// ============================================================================
