//! # Transport Session
//!
//! Delivers one [`PrintJob`] to one printer.
//!
//! ## State Machine
//!
//! ```text
//! Disconnected ─► Connecting ─► DiscoveringServices ─► Ready ─► Transmitting
//!       ▲                                                            │
//!       └──────────────────────── Disconnecting ◄────────────────────┘
//!
//! any non-terminal state ─► Error(category) ─► Disconnecting ─► Disconnected
//! ```
//!
//! A session is single-use and always ends `Disconnected`, whether the job
//! succeeded, failed or was cancelled.
//!
//! ## Writes
//!
//! Whole frames are packed into writes of at most `mtu` bytes. A frame longer
//! than the MTU is split across consecutive writes holding only its own bytes.
//! Every write is followed by a pacing delay; a failed write is retried with
//! exponential backoff.
//!
//! ```text
//! mtu = 200, raster frames of 56 bytes:
//!
//! write 1: [prepare frames ..............]
//! write 2: [line 0][line 1][line 2]
//! write 3: [line 3][line 4][line 5]
//! ...
//! ```

use std::fmt;
use std::future::Future;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BleAdapter, BleLink, GattService};
use crate::config::TransportConfig;
use crate::error::{ErrorCategory, ThermyError};
use crate::printer::PrinterProfile;
use crate::protocol::PrintJob;
use crate::protocol::commands;

/// Lifecycle state of a [`TransportSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    DiscoveringServices,
    Ready,
    Transmitting,
    Disconnecting,
    Error(ErrorCategory),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::DiscoveringServices => f.write_str("discovering services"),
            Self::Ready => f.write_str("ready"),
            Self::Transmitting => f.write_str("transmitting"),
            Self::Disconnecting => f.write_str("disconnecting"),
            Self::Error(category) => write!(f, "error ({:?})", category),
        }
    }
}

/// What a completed transfer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferReport {
    /// Writes that reached the printer, probe excluded
    pub writes: usize,
    /// Job bytes delivered
    pub bytes: usize,
    /// Failed attempts that were retried
    pub retries: u32,
}

/// Pack frames into writes of at most `mtu` bytes.
///
/// Frames stay in order and are never split unless they alone exceed `mtu`.
pub fn plan_writes(frames: &[Vec<u8>], mtu: usize) -> Vec<Vec<u8>> {
    let mtu = mtu.max(1);
    let mut writes = Vec::new();
    let mut buffer: Vec<u8> = Vec::with_capacity(mtu);

    for frame in frames {
        if frame.len() > mtu {
            if !buffer.is_empty() {
                writes.push(std::mem::take(&mut buffer));
            }
            writes.extend(frame.chunks(mtu).map(<[u8]>::to_vec));
            continue;
        }
        if buffer.len() + frame.len() > mtu {
            writes.push(std::mem::take(&mut buffer));
        }
        buffer.extend_from_slice(frame);
    }

    if !buffer.is_empty() {
        writes.push(buffer);
    }
    writes
}

/// A single-use connection that prints one job.
pub struct TransportSession<'a> {
    adapter: &'a dyn BleAdapter,
    address: String,
    config: TransportConfig,
    state: SessionState,
    negotiated_mtu: usize,
    resolved_write_characteristic: Option<Uuid>,
    transitions: Vec<SessionState>,
    used: bool,
}

impl<'a> TransportSession<'a> {
    pub fn new(adapter: &'a dyn BleAdapter, address: &str, config: TransportConfig) -> Self {
        let negotiated_mtu = config.mtu;
        Self {
            adapter,
            address: address.to_string(),
            config,
            state: SessionState::Disconnected,
            negotiated_mtu,
            resolved_write_characteristic: None,
            transitions: vec![SessionState::Disconnected],
            used: false,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state the session has been in, starting with `Disconnected`.
    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    /// Write size in use. The configured MTU until a link reports a smaller one.
    pub fn negotiated_mtu(&self) -> usize {
        self.negotiated_mtu
    }

    pub fn resolved_write_characteristic(&self) -> Option<Uuid> {
        self.resolved_write_characteristic
    }

    /// Connect, send `job` and disconnect.
    ///
    /// If `cancel` completes first the session disconnects and returns
    /// [`ThermyError::Cancelled`].
    pub async fn run<F>(&mut self, job: &PrintJob, cancel: F) -> Result<TransferReport, ThermyError>
    where
        F: Future<Output = ()>,
    {
        if self.used {
            return Err(ThermyError::Protocol(
                "transport session already used; open a new one per job".to_string(),
            ));
        }
        self.used = true;

        let mut link: Option<Box<dyn BleLink>> = None;
        let outcome = {
            let work = self.drive(job, &mut link);
            tokio::pin!(cancel);
            tokio::select! {
                biased;
                _ = &mut cancel => Err(ThermyError::Cancelled),
                result = work => result,
            }
        };

        if let Err(e) = &outcome {
            warn!(address = %self.address, error = %e, "print job failed");
            self.transition(SessionState::Error(e.category()));
        }
        self.teardown(link).await;
        outcome
    }

    fn transition(&mut self, next: SessionState) {
        debug!(address = %self.address, from = %self.state, to = %next, "session state");
        self.state = next;
        self.transitions.push(next);
    }

    async fn drive(
        &mut self,
        job: &PrintJob,
        link_slot: &mut Option<Box<dyn BleLink>>,
    ) -> Result<TransferReport, ThermyError> {
        self.transition(SessionState::Connecting);
        let timeout = self.config.connect_timeout();
        let connected = tokio::time::timeout(timeout, self.adapter.connect(&self.address))
            .await
            .map_err(|_| {
                ThermyError::Connection(format!(
                    "timed out connecting to {} after {} ms",
                    self.address,
                    timeout.as_millis()
                ))
            })?;
        let link = link_slot.insert(connected.map_err(|e| match e {
            ThermyError::Connection(_) | ThermyError::Cancelled => e,
            other => ThermyError::Connection(other.to_string()),
        })?);
        info!(address = %self.address, "connected");

        self.transition(SessionState::DiscoveringServices);
        let services = link.discover_services().await?;
        if let Some(mtu) = link.mtu() {
            self.negotiated_mtu = mtu.min(self.config.mtu);
        }
        let characteristic = self.resolve_characteristic(link.as_mut(), &services, job.profile).await?;
        self.resolved_write_characteristic = Some(characteristic);

        self.transition(SessionState::Ready);
        self.transition(SessionState::Transmitting);
        self.transmit(link.as_mut(), characteristic, job).await
    }

    /// Find the first write characteristic, in profile order, that exists
    /// and accepts a probe write.
    async fn resolve_characteristic(
        &self,
        link: &mut dyn BleLink,
        services: &[GattService],
        profile: &PrinterProfile,
    ) -> Result<Uuid, ThermyError> {
        let probe = commands::get_device_info().to_frame();

        for &candidate in profile.write_characteristic_uuids {
            let preferred = services
                .iter()
                .filter(|s| profile.service_uuids.contains(&s.uuid))
                .find(|s| s.characteristics.contains(&candidate));
            let Some(service) =
                preferred.or_else(|| services.iter().find(|s| s.characteristics.contains(&candidate)))
            else {
                debug!(characteristic = %candidate, "not present");
                continue;
            };

            match link.write(candidate, &probe).await {
                Ok(()) => {
                    info!(service = %service.uuid, characteristic = %candidate, "resolved write characteristic");
                    return Ok(candidate);
                }
                Err(e) => {
                    debug!(characteristic = %candidate, error = %e, "probe write rejected");
                }
            }
        }

        Err(ThermyError::Protocol("characteristic not found".to_string()))
    }

    async fn transmit(
        &self,
        link: &mut dyn BleLink,
        characteristic: Uuid,
        job: &PrintJob,
    ) -> Result<TransferReport, ThermyError> {
        let writes = plan_writes(&job.frames(), self.negotiated_mtu);
        let delay = self.config.write_delay();
        let mut report = TransferReport::default();

        info!(
            packets = job.packets.len(),
            writes = writes.len(),
            mtu = self.negotiated_mtu,
            "transmitting"
        );

        for (index, chunk) in writes.iter().enumerate() {
            report.retries += self.write_with_retry(link, characteristic, chunk, index).await?;
            report.writes += 1;
            report.bytes += chunk.len();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        info!(writes = report.writes, bytes = report.bytes, retries = report.retries, "job sent");
        Ok(report)
    }

    /// Write one chunk, retrying with backoff. Returns the number of retries used.
    async fn write_with_retry(
        &self,
        link: &mut dyn BleLink,
        characteristic: Uuid,
        chunk: &[u8],
        index: usize,
    ) -> Result<u32, ThermyError> {
        let mut attempt = 0u32;
        loop {
            match link.write(characteristic, chunk).await {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt < self.config.max_retries => {
                    let backoff = self.config.backoff(attempt);
                    warn!(
                        write = index,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "write failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ThermyError::Transmission(format!(
                        "write {} failed after {} attempts: {}",
                        index,
                        attempt + 1,
                        e
                    )));
                }
            }
        }
    }

    async fn teardown(&mut self, link: Option<Box<dyn BleLink>>) {
        self.transition(SessionState::Disconnecting);
        match link {
            Some(mut link) => {
                if let Err(e) = link.disconnect().await {
                    warn!(address = %self.address, error = %e, "disconnect failed");
                }
            }
            // Connect was interrupted; it may have left a scan or a late connection behind
            None if self.transitions.contains(&SessionState::Connecting) => {
                if let Err(e) = self.adapter.release(&self.address).await {
                    warn!(address = %self.address, error = %e, "release failed");
                }
            }
            None => {}
        }
        self.transition(SessionState::Disconnected);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrintSettings;
    use crate::printer::profile;
    use crate::protocol::job;
    use crate::render::raster::RasterImage;
    use crate::transport::memory::{MemoryAdapter, MemoryPrinter};
    use pretty_assertions::assert_eq;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:01";

    fn fast_config() -> TransportConfig {
        TransportConfig {
            write_delay_ms: 0,
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn small_job(rows: usize) -> PrintJob {
        let image = RasterImage::from_fn(384, rows, |x, y| (x + y) % 2 == 0);
        job::encode(&image, profile::DEFAULT_PROFILE, &PrintSettings::default()).unwrap()
    }

    #[test]
    fn test_plan_coalesces_whole_frames() {
        let frames = vec![vec![1; 60], vec![2; 60], vec![3; 60], vec![4; 60]];
        let writes = plan_writes(&frames, 200);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), 180);
        assert_eq!(writes[1], vec![4; 60]);
    }

    #[test]
    fn test_plan_splits_oversized_frame_alone() {
        let frames = vec![vec![1; 10], vec![2; 450], vec![3; 10]];
        let writes = plan_writes(&frames, 200);
        assert_eq!(
            writes.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![10, 200, 200, 50, 10]
        );
        for write in &writes[1..4] {
            assert!(write.iter().all(|&b| b == 2));
        }
    }

    #[test]
    fn test_plan_preserves_bytes() {
        let frames: Vec<Vec<u8>> = (0..50u8).map(|i| vec![i; (i as usize % 17) + 1]).collect();
        let writes = plan_writes(&frames, 23);
        assert!(writes.iter().all(|w| w.len() <= 23));
        assert_eq!(writes.concat(), frames.concat());
    }

    #[tokio::test]
    async fn test_successful_run_state_sequence() {
        let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new(ADDRESS, "GB01"));
        let mut session = TransportSession::new(&adapter, ADDRESS, fast_config());
        let report = session
            .run(&small_job(3), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(
            session.transitions(),
            &[
                SessionState::Disconnected,
                SessionState::Connecting,
                SessionState::DiscoveringServices,
                SessionState::Ready,
                SessionState::Transmitting,
                SessionState::Disconnecting,
                SessionState::Disconnected,
            ]
        );
        assert_eq!(report.retries, 0);
        assert_eq!(adapter.disconnect_count(), 1);
        assert_eq!(adapter.release_count(), 0);
        assert_eq!(
            session.resolved_write_characteristic(),
            Some(profile::WRITE_CHARACTERISTIC_UUIDS[0])
        );
    }

    #[tokio::test]
    async fn test_session_is_single_use() {
        let adapter = MemoryAdapter::new().with_printer(MemoryPrinter::new(ADDRESS, "GB01"));
        let mut session = TransportSession::new(&adapter, ADDRESS, fast_config());
        let job = small_job(1);
        session.run(&job, std::future::pending::<()>()).await.unwrap();
        let err = session.run(&job, std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("already used"));
        assert_eq!(adapter.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let adapter = MemoryAdapter::new()
            .with_printer(MemoryPrinter::new(ADDRESS, "GB01"))
            .with_connect_delay(std::time::Duration::from_millis(500));
        let config = TransportConfig {
            connect_timeout_ms: 20,
            ..fast_config()
        };
        let mut session = TransportSession::new(&adapter, ADDRESS, config);
        let err = session
            .run(&small_job(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, ThermyError::Connection(_)));
        assert!(session.transitions().contains(&SessionState::Error(ErrorCategory::Connection)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(adapter.release_count(), 1);
    }

    #[tokio::test]
    async fn test_link_mtu_caps_writes() {
        let adapter = MemoryAdapter::new()
            .with_printer(MemoryPrinter::new(ADDRESS, "GB01").with_mtu(64));
        let mut session = TransportSession::new(&adapter, ADDRESS, fast_config());
        session.run(&small_job(2), std::future::pending::<()>()).await.unwrap();
        assert_eq!(session.negotiated_mtu(), 64);
        assert!(adapter.writes().iter().all(|(_, data)| data.len() <= 64));
    }
}
