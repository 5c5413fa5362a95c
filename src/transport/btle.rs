//! # btleplug Backend
//!
//! Real Bluetooth LE radios through `btleplug` (BlueZ on Linux, CoreBluetooth
//! on macOS, WinRT on Windows).
//!
//! ## Platform Notes
//!
//! - **Linux**: needs a running `bluetoothd` and D-Bus. The printer must not
//!   be connected to another host.
//! - **macOS**: devices are identified by a per-host UUID instead of a MAC
//!   address, so addresses from a scan on another machine will not match.
//!
//! ## Connecting
//!
//! `connect()` uses a peripheral the adapter already knows about. An address
//! that has not been seen yet is searched for with a scan, so a bare
//! `--device` works without a preceding `--scan`.
//!
//! A cancelled `connect()` leaves nothing running: the search scan is stopped
//! by a drop guard, and `release()` disconnects a peripheral whose connection
//! finished after the caller gave up.

use std::collections::HashMap;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{Advertisement, BleAdapter, BleLink, GattService};
use crate::error::ThermyError;

/// Capacity of the advertisement channel.
const SCAN_CHANNEL_CAPACITY: usize = 64;

fn discovery_error(e: btleplug::Error) -> ThermyError {
    ThermyError::Discovery(e.to_string())
}

fn connection_error(e: btleplug::Error) -> ThermyError {
    ThermyError::Connection(e.to_string())
}

/// A system Bluetooth adapter.
#[derive(Clone)]
pub struct BtleAdapter {
    adapter: Adapter,
}

impl BtleAdapter {
    /// Open the first adapter of the system.
    pub async fn first() -> Result<Self, ThermyError> {
        let manager = Manager::new().await.map_err(discovery_error)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(discovery_error)?
            .into_iter()
            .next()
            .ok_or_else(|| ThermyError::Discovery("no Bluetooth adapter found".to_string()))?;
        if let Ok(info) = adapter.adapter_info().await {
            debug!(adapter = %info, "using Bluetooth adapter");
        }
        Ok(Self { adapter })
    }

    async fn known_peripheral(&self, address: &str) -> Result<Option<Peripheral>, ThermyError> {
        let peripherals = self.adapter.peripherals().await.map_err(connection_error)?;
        Ok(peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(address)))
    }

    /// Scan until `address` shows up.
    ///
    /// Unbounded on its own; callers put a timeout around `connect()`. The
    /// scan is stopped however this future ends.
    async fn wait_for(&self, address: &str) -> Result<Peripheral, ThermyError> {
        debug!(address, "device not known yet, scanning for it");
        let mut events = self.start_scan().await?;
        let scan = ScanGuard::new(self.adapter.clone());
        while let Some(advert) = events.recv().await {
            if advert.address.eq_ignore_ascii_case(address) {
                break;
            }
        }
        scan.stop().await?;
        self.known_peripheral(address)
            .await?
            .ok_or_else(|| ThermyError::Connection(format!("no device at {}", address)))
    }
}

/// Stops an adapter scan on drop unless [`ScanGuard::stop`] already did.
struct ScanGuard {
    adapter: Adapter,
    armed: bool,
}

impl ScanGuard {
    fn new(adapter: Adapter) -> Self {
        Self { adapter, armed: true }
    }

    async fn stop(mut self) -> Result<(), ThermyError> {
        self.armed = false;
        self.adapter.stop_scan().await.map_err(discovery_error)
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Drop cannot await; hand the stop to the runtime
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let adapter = self.adapter.clone();
        handle.spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                debug!(error = %e, "stopping interrupted scan failed");
            }
        });
    }
}

#[async_trait]
impl BleAdapter for BtleAdapter {
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, ThermyError> {
        let mut events = self.adapter.events().await.map_err(discovery_error)?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(discovery_error)?;

        let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    event = events.next() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let properties = peripheral.properties().await.ok().flatten();
                let advert = Advertisement {
                    address: peripheral.address().to_string(),
                    name: properties.as_ref().and_then(|p| p.local_name.clone()),
                    rssi: properties.as_ref().and_then(|p| p.rssi),
                };
                trace!(address = %advert.address, name = ?advert.name, "advertisement");
                if tx.send(advert).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), ThermyError> {
        self.adapter.stop_scan().await.map_err(discovery_error)
    }

    async fn connect(&self, address: &str) -> Result<Box<dyn BleLink>, ThermyError> {
        let peripheral = match self.known_peripheral(address).await? {
            Some(peripheral) => peripheral,
            None => self.wait_for(address).await?,
        };
        peripheral.connect().await.map_err(|e| {
            ThermyError::Connection(format!("Failed to connect to {}: {}", address, e))
        })?;
        Ok(Box::new(BtleLink {
            peripheral,
            characteristics: HashMap::new(),
        }))
    }

    async fn release(&self, address: &str) -> Result<(), ThermyError> {
        if let Err(e) = self.adapter.stop_scan().await {
            debug!(error = %e, "stop_scan during release");
        }
        let Some(peripheral) = self.known_peripheral(address).await? else {
            return Ok(());
        };
        if peripheral.is_connected().await.unwrap_or(false) {
            debug!(address, "dropping connection that completed after cancel");
            peripheral.disconnect().await.map_err(connection_error)?;
        }
        Ok(())
    }
}

/// A connected peripheral.
struct BtleLink {
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
}

#[async_trait]
impl BleLink for BtleLink {
    async fn discover_services(&mut self) -> Result<Vec<GattService>, ThermyError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(connection_error)?;

        let mut services = Vec::new();
        for service in self.peripheral.services() {
            let mut characteristics = Vec::new();
            for characteristic in service.characteristics {
                characteristics.push(characteristic.uuid);
                self.characteristics
                    .entry(characteristic.uuid)
                    .or_insert(characteristic);
            }
            services.push(GattService {
                uuid: service.uuid,
                characteristics,
            });
        }
        Ok(services)
    }

    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), ThermyError> {
        let target = self.characteristics.get(&characteristic).ok_or_else(|| {
            ThermyError::Transmission(format!("characteristic {} does not exist", characteristic))
        })?;
        self.peripheral
            .write(target, data, WriteType::WithoutResponse)
            .await
            .map_err(|e| ThermyError::Transmission(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), ThermyError> {
        self.peripheral.disconnect().await.map_err(connection_error)
    }
}
