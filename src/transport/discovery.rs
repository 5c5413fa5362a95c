//! # Device Discovery
//!
//! Finds nearby printers by listening to advertisements for a fixed window.
//!
//! - Advertisements without a name, or whose name matches no
//!   [`PrinterProfile`], are ignored.
//! - An address is reported once, with the first advertisement that matched.
//! - Results keep the order in which devices were first seen.
//! - Finding nothing is not an error.

use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, trace};

use super::BleAdapter;
use crate::error::ThermyError;
use crate::printer::{PrinterProfile, profile};

/// A printer seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPrinter {
    pub address: String,
    /// Advertised name, trimmed
    pub name: String,
    pub profile: &'static PrinterProfile,
    pub rssi: Option<i16>,
}

/// Scan for `window` and return every supported printer seen.
pub async fn scan(
    adapter: &dyn BleAdapter,
    window: Duration,
) -> Result<Vec<DiscoveredPrinter>, ThermyError> {
    let mut events = adapter.start_scan().await?;
    let deadline = Instant::now() + window;
    let mut found: Vec<DiscoveredPrinter> = Vec::new();

    debug!(window_ms = window.as_millis() as u64, "scanning");

    loop {
        let advert = match timeout_at(deadline, events.recv()).await {
            Ok(Some(advert)) => advert,
            Ok(None) => {
                debug!("advertisement stream ended");
                break;
            }
            Err(_) => break,
        };

        let Some(name) = advert.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            trace!(address = %advert.address, "ignoring unnamed device");
            continue;
        };
        let Some(profile) = profile::match_name(name) else {
            trace!(address = %advert.address, name, "ignoring unsupported device");
            continue;
        };
        if found.iter().any(|p| p.address == advert.address) {
            continue;
        }

        info!(address = %advert.address, name, profile = profile.name, "found printer");
        found.push(DiscoveredPrinter {
            address: advert.address,
            name: name.to_string(),
            profile,
            rssi: advert.rssi,
        });
    }

    adapter.stop_scan().await?;
    debug!(count = found.len(), "scan finished");
    Ok(found)
}

// ============================================================================
// TESTS
// ============================================================================
