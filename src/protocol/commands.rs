//! # Cat Printer Command Frames
//!
//! Every command sent to the printer is a self-contained frame:
//!
//! ```text
//! ┌──────┬──────┬────────┬──────┬────────┬────────┬─────────┬───────┬──────┐
//! │ 0x51 │ 0x78 │ opcode │ type │ len_lo │ len_hi │ payload │ crc8  │ 0xFF │
//! └──────┴──────┴────────┴──────┴────────┴────────┴─────────┴───────┴──────┘
//!   start marker                   u16 little-endian          of payload  end
//! ```
//!
//! - `type` is 0 for host → printer transfers, 1 for printer → host responses
//! - `crc8` covers the payload bytes only (see [`super::crc8`])
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 8000 (0x1F40) is sent as bytes `[0x40, 0x1F]`
//!
//! ## Raster Lines
//!
//! A raster line payload carries 8 dots per byte with the **leftmost dot in
//! bit 0**. [`RasterImage`](crate::render::raster::RasterImage) packs rows
//! MSB-first, so each byte is bit-reversed on the way out
//! ([`reverse_bits`]).

use super::crc8;
use crate::error::ThermyError;

/// First start-marker byte
pub const START_0: u8 = 0x51;

/// Second start-marker byte
pub const START_1: u8 = 0x78;

/// End marker
pub const END: u8 = 0xFF;

/// Bytes of framing around a payload (6 header + crc + end)
pub const FRAME_OVERHEAD: usize = 8;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Lattice payload that opens a raster block
pub const LATTICE_START: [u8; 11] = [
    0xaa, 0x55, 0x17, 0x38, 0x44, 0x5f, 0x5f, 0x5f, 0x44, 0x38, 0x2c,
];

/// Lattice payload that closes a raster block
pub const LATTICE_END: [u8; 11] = [
    0xaa, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17,
];

/// DPI selector sent during initialization (the firmware's 200 DPI mode)
pub const DPI_200: u8 = 50;

/// Speed the printer is left at while feeding out the paper
pub const FINISH_SPEED: u8 = 8;

/// Camera-prepare frame sent right after the first state query of a job.
///
/// Sent verbatim. Its length field says 513 bytes but it carries one, so it
/// does not go through [`CommandPacket`] and never parses.
pub const PREPARE_CAMERA: [u8; 9] = [0x51, 0x78, 0xbc, 0x00, 0x01, 0x02, 0x01, 0x2d, 0xff];

/// Command opcodes of the protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Retract = 0xA0,
    Feed = 0xA1,
    PrintRasterLine = 0xA2,
    GetDeviceState = 0xA3,
    SetDpi = 0xA4,
    Lattice = 0xA6,
    GetDeviceInfo = 0xA8,
    UpdateDevice = 0xA9,
    SetEnergy = 0xAF,
    SetSpeed = 0xBD,
    ApplyEnergy = 0xBE,
}

impl Command {
    /// Wire opcode
    #[inline]
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Decode a wire opcode.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode {
            0xA0 => Self::Retract,
            0xA1 => Self::Feed,
            0xA2 => Self::PrintRasterLine,
            0xA3 => Self::GetDeviceState,
            0xA4 => Self::SetDpi,
            0xA6 => Self::Lattice,
            0xA8 => Self::GetDeviceInfo,
            0xA9 => Self::UpdateDevice,
            0xAF => Self::SetEnergy,
            0xBD => Self::SetSpeed,
            0xBE => Self::ApplyEnergy,
            _ => return None,
        })
    }
}

/// Direction byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Transfer = 0,
    Response = 1,
}

/// # Command Packet
///
/// One command with its payload and checksum. Built by the constructors
/// below and turned into wire bytes by [`CommandPacket::to_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub command: Command,
    pub frame_type: FrameType,
    pub payload: Vec<u8>,
    pub crc8: u8,
}

impl CommandPacket {
    /// Build a host → printer packet.
    ///
    /// Fails with a protocol error if the payload does not fit the 16-bit
    /// length field.
    pub fn new(command: Command, payload: Vec<u8>) -> Result<Self, ThermyError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ThermyError::Protocol(format!(
                "{:?} payload of {} bytes exceeds the {} byte limit",
                command,
                payload.len(),
                MAX_PAYLOAD_LEN
            )));
        }
        let crc8 = crc8::checksum(&payload);
        Ok(Self {
            command,
            frame_type: FrameType::Transfer,
            payload,
            crc8,
        })
    }

    /// Total encoded length in bytes.
    #[inline]
    pub fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode to wire bytes.
    ///
    /// ## Example
    ///
    /// ```
    /// use thermy::protocol::commands;
    ///
    /// let frame = commands::get_device_info().to_frame();
    /// assert_eq!(frame, vec![0x51, 0x78, 0xa8, 0x00, 0x01, 0x00, 0x00, 0x00, 0xff]);
    /// ```
    pub fn to_frame(&self) -> Vec<u8> {
        let [len_lo, len_hi] = u16_le(self.payload.len() as u16);
        let mut frame = Vec::with_capacity(self.frame_len());
        frame.push(START_0);
        frame.push(START_1);
        frame.push(self.command.opcode());
        frame.push(self.frame_type as u8);
        frame.push(len_lo);
        frame.push(len_hi);
        frame.extend_from_slice(&self.payload);
        frame.push(self.crc8);
        frame.push(END);
        frame
    }

    /// Decode one complete frame, verifying markers, length and checksum.
    pub fn parse(frame: &[u8]) -> Result<Self, ThermyError> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(ThermyError::Protocol(format!(
                "frame of {} bytes is shorter than the {} byte minimum",
                frame.len(),
                FRAME_OVERHEAD
            )));
        }
        if frame[0] != START_0 || frame[1] != START_1 {
            return Err(ThermyError::Protocol(format!(
                "bad start marker {:02x} {:02x}",
                frame[0], frame[1]
            )));
        }
        let command = Command::from_opcode(frame[2]).ok_or_else(|| {
            ThermyError::Protocol(format!("unknown opcode {:#04x}", frame[2]))
        })?;
        let frame_type = match frame[3] {
            0 => FrameType::Transfer,
            1 => FrameType::Response,
            other => {
                return Err(ThermyError::Protocol(format!("unknown frame type {}", other)));
            }
        };
        let len = u16::from_le_bytes([frame[4], frame[5]]) as usize;
        if frame.len() != FRAME_OVERHEAD + len {
            return Err(ThermyError::Protocol(format!(
                "length field says {} payload bytes but frame carries {}",
                len,
                frame.len() - FRAME_OVERHEAD
            )));
        }
        let payload = frame[6..6 + len].to_vec();
        let crc = frame[6 + len];
        if frame[7 + len] != END {
            return Err(ThermyError::Protocol(format!(
                "bad end marker {:#04x}",
                frame[7 + len]
            )));
        }
        let expected = crc8::checksum(&payload);
        if crc != expected {
            return Err(ThermyError::Protocol(format!(
                "CRC mismatch on {:?}: frame has {:#04x}, payload gives {:#04x}",
                command, crc, expected
            )));
        }
        Ok(Self {
            command,
            frame_type,
            payload,
            crc8: crc,
        })
    }
}

/// Encode a u16 as little-endian bytes.
#[inline]
pub fn u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Reverse the bit order of a byte (MSB-first ↔ LSB-first).
///
/// ```
/// use thermy::protocol::commands::reverse_bits;
///
/// assert_eq!(reverse_bits(0b1000_0000), 0b0000_0001);
/// assert_eq!(reverse_bits(0b1100_1010), 0b0101_0011);
/// ```
#[inline]
pub fn reverse_bits(byte: u8) -> u8 {
    byte.reverse_bits()
}

// ============================================================================
// COMMAND BUILDERS
// ============================================================================
//
// Fixed-size payloads cannot overflow the length field, so these builders go
// through `fixed()` and never fail.

fn fixed<const N: usize>(command: Command, payload: [u8; N]) -> CommandPacket {
    CommandPacket {
        command,
        frame_type: FrameType::Transfer,
        crc8: crc8::checksum(&payload),
        payload: payload.to_vec(),
    }
}

/// Ask the printer for its state flags (paper, cover, heat, battery).
pub fn get_device_state() -> CommandPacket {
    fixed(Command::GetDeviceState, [0x00])
}

/// Ask the printer for its device info. Also used as a harmless write probe.
pub fn get_device_info() -> CommandPacket {
    fixed(Command::GetDeviceInfo, [0x00])
}

/// Commit the pending energy/speed settings.
pub fn update_device() -> CommandPacket {
    fixed(Command::UpdateDevice, [0x00])
}

/// Select 200 DPI mode.
pub fn set_dpi() -> CommandPacket {
    fixed(Command::SetDpi, [DPI_200])
}

/// Set print speed (lower is slower and darker).
pub fn set_speed(speed: u8) -> CommandPacket {
    fixed(Command::SetSpeed, [speed])
}

/// Set heating energy.
pub fn set_energy(energy: u16) -> CommandPacket {
    fixed(Command::SetEnergy, u16_le(energy))
}

/// Apply the energy setting.
pub fn apply_energy() -> CommandPacket {
    fixed(Command::ApplyEnergy, [0x01])
}

/// Open a raster block.
pub fn lattice_start() -> CommandPacket {
    fixed(Command::Lattice, LATTICE_START)
}

/// Close a raster block.
pub fn lattice_end() -> CommandPacket {
    fixed(Command::Lattice, LATTICE_END)
}

/// Feed paper forward by `rows` dot rows.
pub fn feed(rows: u16) -> CommandPacket {
    fixed(Command::Feed, u16_le(rows))
}

/// Print one raster line from MSB-first packed row bytes.
///
/// The bytes are bit-reversed into the printer's LSB-first dot order.
pub fn print_raster_line(row_msb_first: &[u8]) -> Result<CommandPacket, ThermyError> {
    let payload = row_msb_first.iter().map(|&b| reverse_bits(b)).collect();
    CommandPacket::new(Command::PrintRasterLine, payload)
}

// ============================================================================
// TESTS
// ============================================================================
