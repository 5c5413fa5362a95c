//! # Printer Transport Layer
//!
//! Bluetooth LE plumbing between an encoded [`PrintJob`](crate::protocol::PrintJob)
//! and the printer.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │ discovery::scan              │   │ session::TransportSession    │
//! │ advertisements → printers    │   │ connect → resolve → stream   │
//! └──────────────┬───────────────┘   └──────────────┬───────────────┘
//!                │                                  │
//!        ┌───────▼──────────────────────────────────▼───────┐
//!        │ BleAdapter / BleLink (traits)                    │
//!        └───────┬──────────────────────────────────┬───────┘
//!                │                                  │
//!        ┌───────▼────────┐                 ┌───────▼────────┐
//!        │ btle (btleplug)│                 │ memory (fake)  │
//!        └────────────────┘                 └────────────────┘
//! ```
//!
//! ## Available Backends
//!
//! - `btle`: real radios through `btleplug` (feature `bluetooth`, on by default)
//! - [`memory`]: an in-memory printer for tests and dry runs
//!
//! The adapter is always passed in explicitly; nothing here keeps global
//! Bluetooth state.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ThermyError;

#[cfg(feature = "bluetooth")]
pub mod btle;
pub mod discovery;
pub mod memory;
pub mod session;

pub use discovery::{DiscoveredPrinter, scan};
pub use session::{SessionState, TransportSession};

/// One advertisement seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Platform address (MAC on Linux/Windows, UUID on macOS)
    pub address: String,
    /// Advertised local name, if any
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// A GATT service and the characteristics under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Handle to a Bluetooth radio.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Start scanning. Advertisements arrive on the returned channel until
    /// [`stop_scan`](Self::stop_scan) is called or the adapter goes away.
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, ThermyError>;

    async fn stop_scan(&self) -> Result<(), ThermyError>;

    /// Open a connection to the device at `address`.
    async fn connect(&self, address: &str) -> Result<Box<dyn BleLink>, ThermyError>;

    /// Best-effort cleanup after a `connect()` that was interrupted before
    /// it returned a link: stop any scan it started and drop a connection
    /// that completed late.
    async fn release(&self, address: &str) -> Result<(), ThermyError>;
}

/// An open connection to one device.
#[async_trait]
pub trait BleLink: Send {
    /// Enumerate the device's GATT services.
    async fn discover_services(&mut self) -> Result<Vec<GattService>, ThermyError>;

    /// Negotiated write size in bytes, when the backend knows it.
    fn mtu(&self) -> Option<usize> {
        None
    }

    /// Write `data` to a characteristic (write without response).
    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), ThermyError>;

    async fn disconnect(&mut self) -> Result<(), ThermyError>;
}
