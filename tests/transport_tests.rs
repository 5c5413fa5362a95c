//! # Transport Tests
//!
//! Full jobs against the in-memory adapter: what reaches the printer, how
//! failures are retried, and that the link is always released.

use std::time::Duration;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use thermy::{
    ThermyError,
    config::{PrintSettings, TransportConfig},
    error::ErrorCategory,
    printer::profile::{self, SERVICE_UUIDS, WRITE_CHARACTERISTIC_UUIDS},
    protocol::{
        commands,
        job::{self, PrintJob},
    },
    render::{
        font::BitmapFont,
        raster::RasterImage,
        text::{self, TextOptions},
    },
    transport::{
        GattService, SessionState, TransportSession, discovery,
        memory::{MemoryAdapter, MemoryPrinter},
        session::plan_writes,
    },
};

const ADDRESS: &str = "C0:FF:EE:00:00:01";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn fast_config() -> TransportConfig {
    TransportConfig {
        write_delay_ms: 0,
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

fn gb01() -> MemoryAdapter {
    MemoryAdapter::new().with_printer(MemoryPrinter::new(ADDRESS, "GB01"))
}

fn text_job(content: &str) -> PrintJob {
    let bitmap = text::render_text(content, 384, &BitmapFont::new(16), &TextOptions::default());
    job::encode(&bitmap, profile::DEFAULT_PROFILE, &PrintSettings::default()).unwrap()
}

fn striped_job(rows: usize) -> PrintJob {
    let bitmap = RasterImage::from_fn(384, rows, |x, y| (x / 8 + y) % 2 == 0);
    job::encode(&bitmap, profile::DEFAULT_PROFILE, &PrintSettings::default()).unwrap()
}

/// What a finished session looked like.
struct Outcome {
    transitions: Vec<SessionState>,
    state: SessionState,
    characteristic: Option<Uuid>,
    result: Result<(), ThermyError>,
}

async fn run(adapter: &MemoryAdapter, config: TransportConfig, job: &PrintJob) -> Outcome {
    let mut session = TransportSession::new(adapter, ADDRESS, config);
    let result = session.run(job, std::future::pending::<()>()).await.map(|_| ());
    Outcome {
        transitions: session.transitions().to_vec(),
        state: session.state(),
        characteristic: session.resolved_write_characteristic(),
        result,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_job_bytes_reach_printer_in_order() {
    let adapter = gb01();
    let job = text_job("Hello\\nWorld");
    let outcome = run(&adapter, fast_config(), &job).await;
    outcome.result.unwrap();

    let characteristic = WRITE_CHARACTERISTIC_UUIDS[0];
    let probe = commands::get_device_info().to_frame();
    let mut expected = probe.clone();
    expected.extend(job.frames().concat());

    assert_eq!(adapter.written_bytes(characteristic), expected);
    assert_eq!(adapter.writes()[0].1, probe);
    assert!(adapter.writes().iter().all(|(_, data)| data.len() <= 200));
    assert_eq!(outcome.state, SessionState::Disconnected);
    assert_eq!(adapter.disconnect_count(), 1);
    assert!(!adapter.is_connected());
}

#[tokio::test]
async fn test_writes_follow_plan() {
    let adapter = gb01();
    let job = striped_job(10);
    run(&adapter, fast_config(), &job).await.result.unwrap();

    let sent: Vec<Vec<u8>> = adapter.writes().into_iter().skip(1).map(|(_, d)| d).collect();
    assert_eq!(sent, plan_writes(&job.frames(), 200));
}

#[tokio::test]
async fn test_oversized_frames_are_split_alone() {
    let adapter = gb01();
    let job = striped_job(3);
    let config = TransportConfig {
        mtu: 20,
        ..fast_config()
    };
    run(&adapter, config, &job).await.result.unwrap();

    let writes: Vec<Vec<u8>> = adapter.writes().into_iter().skip(1).map(|(_, d)| d).collect();
    assert!(writes.iter().all(|w| w.len() <= 20));
    assert_eq!(writes.concat(), job.frames().concat());

    // A raster frame (56 bytes) is split 20 + 20 + 16, with nothing else mixed in
    let raster_frame = job.packets[job::PREPARE_PACKETS].to_frame();
    let start = writes
        .iter()
        .position(|w| w.as_slice() == &raster_frame[..20])
        .unwrap();
    assert_eq!(writes[start + 1], raster_frame[20..40].to_vec());
    assert_eq!(writes[start + 2], raster_frame[40..].to_vec());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let adapter = gb01();
    adapter.fail_writes(3, 2);
    let job = striped_job(5);
    run(&adapter, fast_config(), &job).await.result.unwrap();

    let characteristic = WRITE_CHARACTERISTIC_UUIDS[0];
    let delivered = adapter.written_bytes(characteristic);
    let probe_len = commands::get_device_info().frame_len();
    assert_eq!(&delivered[probe_len..], job.frames().concat().as_slice());
}

#[tokio::test]
async fn test_persistent_failure_fails_job_and_disconnects() {
    let adapter = gb01();
    adapter.fail_writes(2, 100);
    let job = striped_job(20);
    let outcome = run(&adapter, fast_config(), &job).await;

    let err = outcome.result.unwrap_err();
    assert!(matches!(err, ThermyError::Transmission(_)));
    assert_eq!(err.exit_code(), 6);
    assert!(
        outcome
            .transitions
            .contains(&SessionState::Error(ErrorCategory::Transmission))
    );
    assert_eq!(outcome.state, SessionState::Disconnected);
    assert_eq!(adapter.disconnect_count(), 1);
    // probe + first write only
    assert_eq!(adapter.writes().len(), 2);
}

#[tokio::test]
async fn test_missing_characteristic() {
    let adapter = MemoryAdapter::new().with_printer(
        MemoryPrinter::new(ADDRESS, "GB01").with_services(vec![GattService {
            uuid: profile::uuid_from_u16(0x180A),
            characteristics: vec![profile::uuid_from_u16(0x2A29)],
        }]),
    );
    let outcome = run(&adapter, fast_config(), &striped_job(1)).await;

    let err = outcome.result.unwrap_err();
    assert_eq!(err.to_string(), "Protocol error: characteristic not found");
    assert_eq!(outcome.characteristic, None);
    assert_eq!(adapter.disconnect_count(), 1);
    assert!(adapter.writes().is_empty());
}

#[tokio::test]
async fn test_falls_back_to_next_candidate() {
    let adapter = MemoryAdapter::new().with_printer(
        MemoryPrinter::new(ADDRESS, "MX10").with_services(vec![
            GattService {
                uuid: SERVICE_UUIDS[0],
                characteristics: vec![WRITE_CHARACTERISTIC_UUIDS[0]],
            },
            GattService {
                uuid: SERVICE_UUIDS[1],
                characteristics: vec![WRITE_CHARACTERISTIC_UUIDS[1]],
            },
        ]),
    );
    adapter.reject_characteristic(WRITE_CHARACTERISTIC_UUIDS[0]);

    let job = striped_job(2);
    let outcome = run(&adapter, fast_config(), &job).await;
    outcome.result.unwrap();

    assert_eq!(
        outcome.characteristic,
        Some(WRITE_CHARACTERISTIC_UUIDS[1])
    );
    assert!(adapter.written_bytes(WRITE_CHARACTERISTIC_UUIDS[0]).is_empty());
    assert!(!adapter.written_bytes(WRITE_CHARACTERISTIC_UUIDS[1]).is_empty());
}

#[tokio::test]
async fn test_cancellation_disconnects() {
    let adapter = gb01();
    let job = striped_job(200);
    let config = TransportConfig {
        write_delay_ms: 5,
        ..fast_config()
    };
    let mut session = TransportSession::new(&adapter, ADDRESS, config);

    let watcher = adapter.clone();
    let cancel = async move {
        while watcher.writes().len() < 4 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };

    let err = session.run(&job, cancel).await.unwrap_err();
    assert!(matches!(err, ThermyError::Cancelled));
    assert_eq!(err.exit_code(), 130);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.transitions().contains(&SessionState::Error(ErrorCategory::Cancelled)));
    assert_eq!(adapter.disconnect_count(), 1);
    assert!(adapter.writes().len() < plan_writes(&job.frames(), 200).len());
}

#[tokio::test]
async fn test_cancel_while_connecting_releases_adapter() {
    let adapter = gb01().with_connect_delay(Duration::from_millis(500));
    let mut session = TransportSession::new(&adapter, ADDRESS, fast_config());

    let cancel = tokio::time::sleep(Duration::from_millis(10));
    let err = session.run(&striped_job(1), cancel).await.unwrap_err();

    assert!(matches!(err, ThermyError::Cancelled));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(adapter.release_count(), 1);
    assert_eq!(adapter.connect_count(), 0);
    assert!(!adapter.is_connected());
    assert!(adapter.writes().is_empty());
}

#[tokio::test]
async fn test_unknown_address_is_connection_error() {
    let adapter = MemoryAdapter::new();
    let outcome = run(&adapter, fast_config(), &striped_job(1)).await;
    let err = outcome.result.unwrap_err();
    assert!(matches!(err, ThermyError::Connection(_)));
    assert_eq!(
        outcome.transitions,
        vec![
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::Error(ErrorCategory::Connection),
            SessionState::Disconnecting,
            SessionState::Disconnected,
        ]
    );
    assert_eq!(adapter.release_count(), 1);
}

#[tokio::test]
async fn test_scan_then_print() {
    let adapter = gb01();
    let printers = discovery::scan(&adapter, Duration::from_millis(100)).await.unwrap();
    assert_eq!(printers.len(), 1);
    assert_eq!(printers[0].address, ADDRESS);

    let job = text_job("meow");
    let mut session = TransportSession::new(&adapter, &printers[0].address, fast_config());
    session.run(&job, std::future::pending::<()>()).await.unwrap();
    assert_eq!(adapter.connect_count(), 1);
}

#[tokio::test]
async fn test_scan_with_no_printers_is_empty() {
    let printers = discovery::scan(&MemoryAdapter::new(), Duration::from_millis(20))
        .await
        .unwrap();
    assert!(printers.is_empty());
}
