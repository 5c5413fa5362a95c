//! # In-Memory Transport
//!
//! A [`BleAdapter`] with no radio behind it. Advertisements are replayed
//! from a list and every write is recorded, which makes it the backend for
//! tests and for dry runs.
//!
//! Faults can be injected:
//!
//! | Method | Effect |
//! |--------|--------|
//! | [`MemoryAdapter::fail_writes`] | N writes fail once a number have succeeded |
//! | [`MemoryAdapter::reject_characteristic`] | every write to one characteristic fails |
//! | [`MemoryAdapter::with_connect_delay`] | `connect()` takes this long |
//! | [`MemoryAdapter::without_radio`] | scanning and connecting fail |
//!
//! ```
//! use thermy::transport::memory::{MemoryAdapter, MemoryPrinter};
//!
//! let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new("AA:BB:CC:DD:EE:FF", "GB01"));
//! assert_eq!(adapter.writes().len(), 0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Advertisement, BleAdapter, BleLink, GattService};
use crate::error::ThermyError;
use crate::printer::profile::{SERVICE_UUIDS, WRITE_CHARACTERISTIC_UUIDS};

/// Capacity of the advertisement channel.
const SCAN_CHANNEL_CAPACITY: usize = 64;

/// A simulated printer reachable through a [`MemoryAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPrinter {
    pub address: String,
    pub name: String,
    pub services: Vec<GattService>,
    pub mtu: Option<usize>,
}

impl MemoryPrinter {
    /// A printer exposing the usual `AE00`/`AE01` service and characteristic.
    pub fn new(address: &str, name: &str) -> Self {
        Self {
            address: address.to_string(),
            name: name.to_string(),
            services: vec![GattService {
                uuid: SERVICE_UUIDS[0],
                characteristics: vec![WRITE_CHARACTERISTIC_UUIDS[0]],
            }],
            mtu: None,
        }
    }

    pub fn with_services(mut self, services: Vec<GattService>) -> Self {
        self.services = services;
        self
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = Some(mtu);
        self
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            address: self.address.clone(),
            name: Some(self.name.clone()),
            rssi: Some(-60),
        }
    }

    fn has_characteristic(&self, characteristic: Uuid) -> bool {
        self.services
            .iter()
            .any(|s| s.characteristics.contains(&characteristic))
    }
}

/// Everything the adapter and its links have seen.
#[derive(Debug, Default)]
struct Recorder {
    writes: Vec<(Uuid, Vec<u8>)>,
    fail_after: usize,
    failures_remaining: u32,
    rejected: Vec<Uuid>,
    scanning: bool,
    connects: usize,
    disconnects: usize,
    releases: usize,
    connected: bool,
}

/// A fake Bluetooth adapter. Clones share the same recorder.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    printers: Vec<MemoryPrinter>,
    /// Extra advertisements (unnamed devices, other gadgets, repeats)
    extra_advertisements: Vec<Advertisement>,
    connect_delay: Option<Duration>,
    no_radio: bool,
    recorder: Arc<Mutex<Recorder>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a printer. It advertises and accepts connections.
    pub fn with_printer(mut self, printer: MemoryPrinter) -> Self {
        self.printers.push(printer);
        self
    }

    /// Replay an advertisement after the printers' own.
    pub fn with_advertisement(mut self, advertisement: Advertisement) -> Self {
        self.extra_advertisements.push(advertisement);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Behave like a machine whose Bluetooth radio is off.
    pub fn without_radio(mut self) -> Self {
        self.no_radio = true;
        self
    }

    /// Make `count` write attempts fail once `after` writes have succeeded.
    pub fn fail_writes(&self, after: usize, count: u32) {
        let mut recorder = self.recorder();
        recorder.fail_after = after;
        recorder.failures_remaining = count;
    }

    /// Make every write to `characteristic` fail.
    pub fn reject_characteristic(&self, characteristic: Uuid) {
        self.recorder().rejected.push(characteristic);
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.recorder().writes.clone()
    }

    /// All bytes successfully written to `characteristic`, concatenated.
    pub fn written_bytes(&self, characteristic: Uuid) -> Vec<u8> {
        self.recorder()
            .writes
            .iter()
            .filter(|(uuid, _)| *uuid == characteristic)
            .flat_map(|(_, data)| data.iter().copied())
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.recorder().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.recorder().disconnects
    }

    /// Calls to [`BleAdapter::release`].
    pub fn release_count(&self) -> usize {
        self.recorder().releases
    }

    pub fn is_connected(&self) -> bool {
        self.recorder().connected
    }

    pub fn is_scanning(&self) -> bool {
        self.recorder().scanning
    }

    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BleAdapter for MemoryAdapter {
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, ThermyError> {
        if self.no_radio {
            return Err(ThermyError::Discovery("Bluetooth radio unavailable".to_string()));
        }
        self.recorder().scanning = true;

        let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let adverts: Vec<Advertisement> = self
            .printers
            .iter()
            .map(MemoryPrinter::advertisement)
            .chain(self.extra_advertisements.iter().cloned())
            .collect();

        tokio::spawn(async move {
            for advert in adverts {
                if tx.send(advert).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), ThermyError> {
        self.recorder().scanning = false;
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<Box<dyn BleLink>, ThermyError> {
        if self.no_radio {
            return Err(ThermyError::Connection("Bluetooth radio unavailable".to_string()));
        }
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let printer = self
            .printers
            .iter()
            .find(|p| p.address.eq_ignore_ascii_case(address))
            .cloned()
            .ok_or_else(|| ThermyError::Connection(format!("no device at {}", address)))?;

        {
            let mut recorder = self.recorder();
            recorder.connects += 1;
            recorder.connected = true;
        }
        Ok(Box::new(MemoryLink {
            printer,
            recorder: Arc::clone(&self.recorder),
            open: true,
        }))
    }

    async fn release(&self, _address: &str) -> Result<(), ThermyError> {
        let mut recorder = self.recorder();
        recorder.releases += 1;
        recorder.scanning = false;
        Ok(())
    }
}

/// Connection to a [`MemoryPrinter`].
struct MemoryLink {
    printer: MemoryPrinter,
    recorder: Arc<Mutex<Recorder>>,
    open: bool,
}

impl MemoryLink {
    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BleLink for MemoryLink {
    async fn discover_services(&mut self) -> Result<Vec<GattService>, ThermyError> {
        if !self.open {
            return Err(ThermyError::Connection("link is closed".to_string()));
        }
        Ok(self.printer.services.clone())
    }

    fn mtu(&self) -> Option<usize> {
        self.printer.mtu
    }

    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), ThermyError> {
        if !self.open {
            return Err(ThermyError::Connection("link is closed".to_string()));
        }
        if !self.printer.has_characteristic(characteristic) {
            return Err(ThermyError::Transmission(format!(
                "characteristic {} does not exist",
                characteristic
            )));
        }

        let mut recorder = self.recorder();
        if recorder.rejected.contains(&characteristic) {
            return Err(ThermyError::Transmission(format!(
                "characteristic {} rejected the write",
                characteristic
            )));
        }
        if recorder.failures_remaining > 0 && recorder.writes.len() >= recorder.fail_after {
            recorder.failures_remaining -= 1;
            return Err(ThermyError::Transmission("simulated write failure".to_string()));
        }
        recorder.writes.push((characteristic, data.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ThermyError> {
        if self.open {
            self.open = false;
            let mut recorder = self.recorder();
            recorder.disconnects += 1;
            recorder.connected = false;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    #[tokio::test]
    async fn test_replays_advertisements() {
        let adapter = MemoryAdapter::new()
            .with_printer(MemoryPrinter::new(ADDRESS, "GB02"))
            .with_advertisement(Advertisement {
                address: "11:22:33:44:55:66".to_string(),
                name: None,
                rssi: None,
            });
        let mut rx = adapter.start_scan().await.unwrap();
        assert!(adapter.is_scanning());
        assert_eq!(rx.recv().await.unwrap().name.as_deref(), Some("GB02"));
        assert_eq!(rx.recv().await.unwrap().name, None);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_records_writes() {
        let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new(ADDRESS, "GB01"));
        let mut link = adapter.connect(ADDRESS).await.unwrap();
        let characteristic = WRITE_CHARACTERISTIC_UUIDS[0];
        link.write(characteristic, &[1, 2]).await.unwrap();
        link.write(characteristic, &[3]).await.unwrap();
        assert_eq!(adapter.written_bytes(characteristic), vec![1, 2, 3]);

        link.disconnect().await.unwrap();
        assert!(!adapter.is_connected());
        assert!(link.write(characteristic, &[4]).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new(ADDRESS, "GB01"));
        let mut link = adapter.connect(ADDRESS).await.unwrap();
        let characteristic = WRITE_CHARACTERISTIC_UUIDS[0];
        adapter.fail_writes(1, 2);
        assert!(link.write(characteristic, &[0]).await.is_ok());
        assert!(link.write(characteristic, &[1]).await.is_err());
        assert!(link.write(characteristic, &[1]).await.is_err());
        assert!(link.write(characteristic, &[1]).await.is_ok());
        assert_eq!(adapter.written_bytes(characteristic), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let adapter = MemoryAdapter::new();
        let err = adapter.connect(ADDRESS).await.err().unwrap();
        assert!(matches!(err, ThermyError::Connection(_)));
    }

    #[tokio::test]
    async fn test_release_stops_scan() {
        let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new(ADDRESS, "GB01"));
        let _rx = adapter.start_scan().await.unwrap();
        adapter.release(ADDRESS).await.unwrap();
        assert!(!adapter.is_scanning());
        assert_eq!(adapter.release_count(), 1);
    }

    #[tokio::test]
    async fn test_no_radio() {
        let adapter = MemoryAdapter::new().without_radio();
        assert!(matches!(
            adapter.start_scan().await,
            Err(ThermyError::Discovery(_))
        ));
    }
}
