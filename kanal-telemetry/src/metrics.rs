//! ## kanal-telemetry::metrics
//! **Prometheus exporter for transport counters**
//!
//! The transport keeps its own counters; the recorder copies them from a
//! [`TransportSnapshot`] into a private registry, alongside a histogram of
//! round completion times observed by the harness.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

use kanal_core::TransportSnapshot;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub sent: IntGauge,
    pub delivered: IntGauge,
    pub empty_polls: IntGauge,
    pub in_flight: IntGauge,
    pub buffer_len: IntGaugeVec,
    pub round_duration: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let sent = IntGauge::new("kanal_envelopes_sent", "Envelopes accepted onto the wire")?;
        let delivered = IntGauge::new("kanal_envelopes_delivered", "Envelopes handed to receivers")?;
        let empty_polls = IntGauge::new(
            "kanal_empty_polls",
            "Deliver calls that found nothing due",
        )?;
        let in_flight = IntGauge::new(
            "kanal_envelopes_in_flight",
            "Envelopes on the wire or in a delivery buffer",
        )?;
        let buffer_len = IntGaugeVec::new(
            Opts::new("kanal_buffer_len", "Envelopes waiting per destination"),
            &["process"],
        )?;
        let round_duration = Histogram::with_opts(
            HistogramOpts::new(
                "kanal_round_duration_ms",
                "Time for one process to broadcast and collect a full round",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1_000.0]),
        )?;

        registry.register(Box::new(sent.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(empty_polls.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(buffer_len.clone()))?;
        registry.register(Box::new(round_duration.clone()))?;

        Ok(Self {
            registry,
            sent,
            delivered,
            empty_polls,
            in_flight,
            buffer_len,
            round_duration,
        })
    }

    pub fn record_snapshot(&self, snapshot: &TransportSnapshot) {
        self.sent.set(clamp(snapshot.sent));
        self.delivered.set(clamp(snapshot.delivered));
        self.empty_polls.set(clamp(snapshot.empty_polls));
        self.in_flight.set(clamp(snapshot.in_flight() as u64));
        for (process, len) in snapshot.buffer_sizes.iter().enumerate() {
            self.buffer_len
                .with_label_values(&[&process.to_string()])
                .set(clamp(*len as u64));
        }
    }

    pub fn observe_round(&self, elapsed: Duration) {
        self.round_duration.observe(elapsed.as_secs_f64() * 1_000.0);
    }

    pub fn gather_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanal_core::ProcessId;

    #[test]
    fn snapshot_is_exported() {
        let recorder = MetricsRecorder::new().unwrap();
        recorder.record_snapshot(&TransportSnapshot {
            last_client: Some(ProcessId::new(0)),
            sent: 12,
            delivered: 10,
            empty_polls: 3,
            wire_len: 1,
            buffer_sizes: vec![1, 0],
        });
        recorder.observe_round(Duration::from_millis(12));

        let text = recorder.gather_metrics().unwrap();
        assert!(text.contains("kanal_envelopes_sent 12"));
        assert!(text.contains("kanal_envelopes_delivered 10"));
        assert!(text.contains("kanal_envelopes_in_flight 2"));
        assert!(text.contains("kanal_buffer_len{process=\"0\"} 1"));
        assert!(text.contains("kanal_round_duration_ms_count 1"));
    }

    #[test]
    fn recorders_do_not_share_registries() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.sent.set(5);
        assert_eq!(b.sent.get(), 0);
    }
}
