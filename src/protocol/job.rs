//! # Print Jobs
//!
//! [`encode`] turns a bitmap and settings into the ordered packet list for
//! one print.
//!
//! ## Packet Sequence
//!
//! ```text
//! ┌─ prepare ─────────────────────────────────────────────────────────┐
//! │ GetDeviceState  [camera]  SetDpi(200)  SetSpeed  SetEnergy        │
//! │ ApplyEnergy     UpdateDevice  Lattice(start)                      │
//! ├─ body ────────────────────────────────────────────────────────────┤
//! │ PrintRasterLine × height_rows                                     │
//! ├─ finish ──────────────────────────────────────────────────────────┤
//! │ Lattice(end)  SetSpeed(8)  Feed(feed_rows)  GetDeviceState        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `[camera]` is the raw [`PREPARE_CAMERA`](commands::PREPARE_CAMERA) frame.
//! It is not a [`CommandPacket`], so it only shows up in [`PrintJob::frames`].

use super::commands::{self, CommandPacket};
use crate::config::PrintSettings;
use crate::error::ThermyError;
use crate::printer::PrinterProfile;
use crate::render::raster::RasterImage;

/// Packets sent before the first raster line
pub const PREPARE_PACKETS: usize = 7;

/// Packets sent after the last raster line
pub const FINISH_PACKETS: usize = 4;

/// Position of the camera-prepare frame in [`PrintJob::frames`]
const CAMERA_FRAME_POSITION: usize = 1;

/// An encoded print, ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub profile: &'static PrinterProfile,
    pub packets: Vec<CommandPacket>,
}

impl PrintJob {
    /// Wire frames in send order: every packet, plus the camera-prepare
    /// frame after the first one.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        let mut frames: Vec<Vec<u8>> = self.packets.iter().map(CommandPacket::to_frame).collect();
        let position = CAMERA_FRAME_POSITION.min(frames.len());
        frames.insert(position, commands::PREPARE_CAMERA.to_vec());
        frames
    }

    /// Total bytes on the wire.
    pub fn byte_len(&self) -> usize {
        commands::PREPARE_CAMERA.len()
            + self.packets.iter().map(CommandPacket::frame_len).sum::<usize>()
    }

    /// Number of raster lines in the job.
    pub fn raster_lines(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| p.command == commands::Command::PrintRasterLine)
            .count()
    }

    /// Re-parse every encoded frame and compare it with its packet.
    pub fn verify(&self) -> Result<(), ThermyError> {
        for (index, packet) in self.packets.iter().enumerate() {
            let parsed = CommandPacket::parse(&packet.to_frame()).map_err(|e| {
                ThermyError::Protocol(format!("packet {} failed self-check: {}", index, e))
            })?;
            if &parsed != packet {
                return Err(ThermyError::Protocol(format!(
                    "packet {} ({:?}) does not survive encoding",
                    index, packet.command
                )));
            }
        }
        Ok(())
    }
}

/// Encode a bitmap for `profile`.
///
/// The bitmap must be exactly as wide as the profile's paper.
///
/// ## Example
///
/// ```
/// use thermy::config::PrintSettings;
/// use thermy::printer::profile;
/// use thermy::protocol::job;
/// use thermy::render::raster::RasterImage;
///
/// let bitmap = RasterImage::new(384, 3);
/// let job = job::encode(&bitmap, profile::DEFAULT_PROFILE, &PrintSettings::default()).unwrap();
/// assert_eq!(job.packets.len(), 7 + 3 + 4);
/// ```
pub fn encode(
    image: &RasterImage,
    profile: &'static PrinterProfile,
    settings: &PrintSettings,
) -> Result<PrintJob, ThermyError> {
    let paper_width = profile.paper_width_dots as usize;
    if image.width_dots() != paper_width {
        return Err(ThermyError::Protocol(format!(
            "bitmap is {} dots wide but {} paper is {} dots",
            image.width_dots(),
            profile.name,
            paper_width
        )));
    }

    let mut packets =
        Vec::with_capacity(PREPARE_PACKETS + image.height_rows() + FINISH_PACKETS);

    packets.push(commands::get_device_state());
    packets.push(commands::set_dpi());
    packets.push(commands::set_speed(settings.speed));
    packets.push(commands::set_energy(settings.energy));
    packets.push(commands::apply_energy());
    packets.push(commands::update_device());
    packets.push(commands::lattice_start());

    for row in image.rows().take(image.height_rows()) {
        packets.push(commands::print_raster_line(row)?);
    }

    packets.push(commands::lattice_end());
    packets.push(commands::set_speed(commands::FINISH_SPEED));
    packets.push(commands::feed(settings.feed_rows));
    packets.push(commands::get_device_state());

    tracing::debug!(
        profile = profile.name,
        rows = image.height_rows(),
        packets = packets.len(),
        "encoded print job"
    );

    Ok(PrintJob { profile, packets })
}

// ============================================================================
// TESTS
// ============================================================================
