//! # Cat Printer Protocol
//!
//! Command framing for the family of cheap Bluetooth LE thermal printers
//! sold under names like GB01, MX10 or XW001 ("cat printers").
//!
//! ## Module Structure
//!
//! - [`crc8`]: payload checksum
//! - [`commands`]: frame layout, opcodes and command builders
//! - [`job`]: the full packet sequence for one bitmap
//!
//! ## Usage Example
//!
//! ```
//! use thermy::protocol::commands;
//!
//! // Build a simple command sequence
//! let mut data = Vec::new();
//! data.extend(commands::get_device_state().to_frame());
//! data.extend(commands::set_speed(35).to_frame());
//! data.extend(commands::feed(50).to_frame());
//!
//! assert_eq!(&data[..2], &[0x51, 0x78]);
//! // Send `data` to the printer via transport...
//! ```

pub mod commands;
pub mod crc8;
pub mod job;

pub use commands::{Command, CommandPacket};
pub use job::{PrintJob, encode};
