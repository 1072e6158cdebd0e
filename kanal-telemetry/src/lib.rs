//! # Kanal Telemetry
//!
//! Logging setup and Prometheus metrics for transport runs.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::{MetricsError, MetricsRecorder};
