//! ## kanal-cli::simulation
//! **Broadcast-round harness**
//!
//! One OS thread per simulated process. Each round a process broadcasts a
//! report and then polls its own delivery buffer until it has collected the
//! whole round from everybody. Finished processes hand a [`ProcessReport`]
//! back over a crossbeam channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use tracing::{debug, info, instrument, warn};

use kanal_config::KanalConfig;
use kanal_core::prelude::*;
use kanal_telemetry::{EventLogger, MetricsRecorder};

use crate::error::HarnessError;

#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub process: ProcessId,
    pub received: usize,
    pub round_times: Vec<Duration>,
    /// Sum of the estimates carried by received reports.
    pub estimate_sum: i64,
}

#[derive(Debug)]
pub struct SimulationOutcome {
    pub reports: Vec<ProcessReport>,
    pub snapshot: TransportSnapshot,
    pub elapsed: Duration,
}

pub fn build_transport(config: &KanalConfig) -> Result<Transport, TransportError> {
    let settings = &config.transport;
    let mut builder = Transport::builder(settings.process_count)
        .gaussian_delay(settings.mean_delay_ms, settings.variance_ms);
    if let Some(seed) = settings.seed {
        builder = builder.seed(seed);
    }
    if let Some(limit) = settings.buffer_limit {
        builder = builder.buffer_limit(limit);
    }
    builder.build()
}

/// How often the collector checks for workers that died without reporting.
const REAP_INTERVAL: Duration = Duration::from_millis(50);

/// Process threads plus the flag that tells them to give up early.
struct Workers {
    handles: Vec<Option<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
}

impl Workers {
    fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            handles: Vec::new(),
            stop,
        }
    }

    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(Some(handle));
    }

    /// Joins every worker that has already exited.
    fn reap(&mut self) -> Result<(), HarnessError> {
        for (id, slot) in self.handles.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(JoinHandle::is_finished) {
                if let Some(handle) = slot.take() {
                    handle.join().map_err(|_| HarnessError::WorkerPanicked(id))?;
                }
            }
        }
        Ok(())
    }

    fn join_all(&mut self) -> Result<(), HarnessError> {
        for (id, slot) in self.handles.iter_mut().enumerate() {
            if let Some(handle) = slot.take() {
                handle.join().map_err(|_| HarnessError::WorkerPanicked(id))?;
            }
        }
        Ok(())
    }

    /// Tells the remaining workers to stop and waits for them.
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for slot in self.handles.iter_mut() {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Runs every round on every process and checks that nothing was lost.
#[instrument(level = "info", name = "run_simulation", skip_all, fields(
    processes = config.transport.process_count,
    rounds = config.simulation.rounds,
))]
pub fn run_simulation(
    config: &KanalConfig,
    metrics: Option<&MetricsRecorder>,
) -> Result<SimulationOutcome, HarnessError> {
    let transport = Arc::new(build_transport(config)?);
    let processes = transport.process_count();
    let rounds = config.simulation.rounds;
    let poll_interval = Duration::from_micros(config.simulation.poll_interval_us);
    let timeout = Duration::from_secs(config.simulation.timeout_secs);
    let deadline = Instant::now() + timeout;
    let started = Instant::now();

    let (tx, rx) = channel::unbounded::<Result<ProcessReport, HarnessError>>();
    let mut workers = Workers::new(Arc::new(AtomicBool::new(false)));
    for id in 0..processes {
        let transport = Arc::clone(&transport);
        let stop = Arc::clone(&workers.stop);
        let tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("process-{}", id))
            .spawn(move || {
                let context = ProcessContext {
                    transport: &transport,
                    me: ProcessId::new(id),
                    poll_interval,
                    deadline,
                    stop: &stop,
                };
                let _ = tx.send(run_process(&context, rounds));
            });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                workers.shutdown();
                return Err(err.into());
            }
        }
    }
    drop(tx);

    let reports = match collect_reports(&rx, &mut workers, processes, deadline, timeout) {
        Ok(reports) => reports,
        Err(err) => {
            warn!(%err, "simulation aborted, stopping remaining processes");
            workers.shutdown();
            return Err(err);
        }
    };
    workers.join_all()?;

    if let Some(metrics) = metrics {
        for elapsed in reports.iter().flat_map(|report| &report.round_times) {
            metrics.observe_round(*elapsed);
        }
    }

    let snapshot = transport.snapshot();
    EventLogger::log_snapshot("simulation", &snapshot);
    if let Some(metrics) = metrics {
        metrics.record_snapshot(&snapshot);
    }
    if snapshot.sent != snapshot.delivered {
        warn!(sent = snapshot.sent, delivered = snapshot.delivered, "transport unbalanced");
        return Err(HarnessError::Unbalanced {
            sent: snapshot.sent,
            delivered: snapshot.delivered,
        });
    }

    let elapsed = started.elapsed();
    info!(?elapsed, sent = snapshot.sent, "Simulation complete");
    Ok(SimulationOutcome {
        reports,
        snapshot,
        elapsed,
    })
}

/// Waits for one report per process. A worker that exits without reporting
/// surfaces as [`HarnessError::WorkerPanicked`] within [`REAP_INTERVAL`].
fn collect_reports(
    rx: &Receiver<Result<ProcessReport, HarnessError>>,
    workers: &mut Workers,
    processes: usize,
    deadline: Instant,
    timeout: Duration,
) -> Result<Vec<ProcessReport>, HarnessError> {
    let mut reports = Vec::with_capacity(processes);
    while reports.len() < processes {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining.min(REAP_INTERVAL)) {
            Ok(Ok(report)) => {
                debug!(process = %report.process, received = report.received, "process finished");
                reports.push(report);
                continue;
            }
            Ok(Err(err)) => return Err(err),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                workers.reap()?;
            }
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::Timeout {
                missing: processes - reports.len(),
                timeout,
            });
        }
    }
    reports.sort_by_key(|report| report.process);
    Ok(reports)
}

struct ProcessContext<'a> {
    transport: &'a Transport,
    me: ProcessId,
    poll_interval: Duration,
    deadline: Instant,
    stop: &'a AtomicBool,
}

impl ProcessContext<'_> {
    /// Fails once the deadline passes or the collector gave up on the run.
    fn check_running(&self, round: u64, received: usize) -> Result<(), HarnessError> {
        if self.stop.load(Ordering::Relaxed) {
            return Err(HarnessError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(HarnessError::Starved {
                process: self.me.index(),
                round,
                received,
            });
        }
        Ok(())
    }
}

fn run_process(ctx: &ProcessContext<'_>, rounds: u64) -> Result<ProcessReport, HarnessError> {
    let processes = ctx.transport.process_count();
    let mut report = ProcessReport {
        process: ctx.me,
        received: 0,
        round_times: Vec::with_capacity(rounds as usize),
        estimate_sum: 0,
    };

    for round in 1..=rounds {
        let round_started = Instant::now();
        let estimate = ctx.me.index() as i64;
        let envelope = Envelope::new(ctx.me, ctx.me, MessageKind::Report, round, estimate);
        broadcast_with_retry(ctx, &envelope, &mut report)?;

        let target = processes * round as usize;
        while report.received < target {
            ctx.check_running(round, report.received)?;
            if !poll_once(ctx.transport, &mut report)? {
                thread::sleep(ctx.poll_interval);
            }
        }
        report.round_times.push(round_started.elapsed());
    }
    Ok(report)
}

/// Broadcasts, then resends to every destination the wire refused. Our own
/// buffer keeps being polled meanwhile, or a full buffer here could block the
/// drain that would free the wire.
fn broadcast_with_retry(
    ctx: &ProcessContext<'_>,
    envelope: &Envelope,
    report: &mut ProcessReport,
) -> Result<(), HarnessError> {
    let mut pending: Vec<ProcessId> = match ctx.transport.broadcast(envelope) {
        Ok(()) => return Ok(()),
        Err(err) => err.failed_destinations().collect(),
    };

    loop {
        let mut failures = Vec::new();
        for to in pending {
            if let Err(err) = ctx.transport.send(envelope.readdressed(to)) {
                failures.push((to, err));
            }
        }
        if failures.is_empty() {
            return Ok(());
        }
        if ctx.stop.load(Ordering::Relaxed) {
            return Err(HarnessError::Cancelled);
        }
        if Instant::now() >= ctx.deadline {
            return Err(BroadcastError { failures }.into());
        }
        if !poll_once(ctx.transport, report)? {
            thread::sleep(ctx.poll_interval);
        }
        pending = failures.into_iter().map(|(to, _)| to).collect();
    }
}

fn poll_once(transport: &Transport, report: &mut ProcessReport) -> Result<bool, HarnessError> {
    match transport.deliver(report.process)? {
        Some(envelope) => {
            report.received += 1;
            report.estimate_sum += envelope.estimate();
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Two processes, one report from 0 to 1, then a single poll by process 1.
/// The drain stops at the first envelope for process 1 and the delay keeps
/// it buffered, so the wire ends empty and process 1's buffer holds one.
pub fn state_demo() -> Result<Transport, TransportError> {
    let transport = Transport::new(2, 1_000, 0)?;
    let zero = ProcessId::new(0);
    let one = ProcessId::new(1);
    transport.send(Envelope::new(zero, one, MessageKind::Report, 1, 0))?;
    let _ = transport.deliver(one)?;
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(processes: usize, rounds: u64) -> KanalConfig {
        let mut config = KanalConfig::default();
        config.transport.process_count = processes;
        config.transport.mean_delay_ms = 1;
        config.transport.variance_ms = 1;
        config.transport.seed = Some(3);
        config.simulation.rounds = rounds;
        config.simulation.poll_interval_us = 100;
        config.simulation.timeout_secs = 30;
        config
    }

    #[test]
    fn every_process_collects_every_round() {
        let metrics = MetricsRecorder::new().unwrap();
        let outcome = run_simulation(&config(4, 5), Some(&metrics)).unwrap();

        assert_eq!(outcome.reports.len(), 4);
        for report in &outcome.reports {
            assert_eq!(report.received, 4 * 5);
            assert_eq!(report.round_times.len(), 5);
            // Every process reports its own id as the estimate: 0+1+2+3 per round.
            assert_eq!(report.estimate_sum, 6 * 5);
        }
        assert_eq!(outcome.snapshot.sent, 4 * 4 * 5);
        assert_eq!(outcome.snapshot.delivered, outcome.snapshot.sent);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("kanal_envelopes_sent 80"));
        assert!(text.contains("kanal_round_duration_ms_count 20"));
    }

    #[test]
    fn bounded_buffers_still_complete() {
        let mut config = config(3, 4);
        config.transport.buffer_limit = Some(1);
        let outcome = run_simulation(&config, None).unwrap();
        assert_eq!(outcome.snapshot.sent, 3 * 3 * 4);
        assert_eq!(outcome.snapshot.in_flight(), 0);
    }

    #[test]
    fn panicking_process_is_reported_promptly() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Workers::new(Arc::clone(&stop));
        let (tx, rx) = channel::unbounded::<Result<ProcessReport, HarnessError>>();

        workers.push(thread::spawn(|| panic!("process blew up")));
        let waiting = Arc::clone(&stop);
        let keep_alive = tx.clone();
        workers.push(thread::spawn(move || {
            let _sender = keep_alive;
            while !waiting.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
        }));
        drop(tx);

        let started = Instant::now();
        let timeout = Duration::from_secs(30);
        let err = collect_reports(&rx, &mut workers, 2, started + timeout, timeout).unwrap_err();
        assert!(matches!(err, HarnessError::WorkerPanicked(0)), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(5));

        workers.shutdown();
        assert!(workers.handles.iter().all(Option::is_none));
    }

    #[test]
    fn stopped_process_cancels() {
        let transport = Transport::builder(2)
            .delay_model(NoDelayModel)
            .build()
            .unwrap();
        let stop = AtomicBool::new(true);
        let context = ProcessContext {
            transport: &transport,
            me: ProcessId::new(0),
            poll_interval: Duration::from_micros(100),
            deadline: Instant::now() + Duration::from_secs(30),
            stop: &stop,
        };
        assert!(matches!(run_process(&context, 3), Err(HarnessError::Cancelled)));
    }

    #[test]
    fn state_demo_leaves_one_envelope_buffered() {
        let transport = state_demo().unwrap();
        let snapshot = transport.snapshot();
        assert_eq!(snapshot.last_client, Some(ProcessId::new(1)));
        assert_eq!(snapshot.sent, 1);
        assert_eq!(snapshot.delivered, 0);
        assert_eq!(snapshot.empty_polls, 1);
        assert_eq!(snapshot.wire_len, 0);
        assert_eq!(snapshot.buffer_sizes, vec![0, 1]);
    }
}
