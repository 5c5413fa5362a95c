//! Log output for the CLI.
//!
//! Library code only emits `tracing` events; this module installs the
//! subscriber. Logs go to stderr so they never mix with printed results.
//! `RUST_LOG` takes precedence over the `-v`/`-q` level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber at `level`.
///
/// Does nothing if a subscriber is already installed.
pub fn init(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
