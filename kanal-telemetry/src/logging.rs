//! ## kanal-telemetry::logging
//! **Structured logging with tracing**
//!
//! `RUST_LOG` wins over the configured default filter, so a single run can be
//! turned up to `kanal_core=trace` without touching the config file.

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use kanal_core::TransportSnapshot;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber with an `info` default filter.
    pub fn init() {
        Self::init_with_filter("info")
    }

    /// Installs the global subscriber. A second call is a no-op.
    pub fn init_with_filter(default_filter: &str) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Emits one structured event summarising a transport snapshot.
    pub fn log_snapshot(label: &str, snapshot: &TransportSnapshot) {
        let span = info_span!("transport_state", label = label);
        let _entered = span.enter();
        tracing::info!(
            last_client = ?snapshot.last_client.map(|id| id.index()),
            sent = snapshot.sent,
            delivered = snapshot.delivered,
            empty_polls = snapshot.empty_polls,
            in_flight = snapshot.in_flight(),
            buffers = ?snapshot.buffer_sizes,
            "Transport state"
        );
    }
}
