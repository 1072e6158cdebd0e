//! ## kanal-core::transport
//! **Simulated point-to-point and broadcast transport**
//!
//! Senders push envelopes onto a shared, capacity-bounded wire
//! (`process_count²` slots). Receivers poll [`Transport::deliver`]; when the
//! caller's delivery buffer is empty the wire is drained, each drained envelope
//! gets a delivery instant from the delay model and is routed into its
//! receiver's buffer.
//!
//! ### Locking:
//! - The transport lock guards the delay model and serialises every push and
//!   every drain. The wire itself is a lock-free queue, so its length and
//!   capacity can be read without the lock.
//! - Each delivery buffer has its own lock. Lock order is always
//!   transport → buffer, and `pop` only takes the buffer lock.
//!
//! ### Ordering:
//! - FIFO per destination, nothing across destinations.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::buffer::DeliveryBuffer;
use crate::envelope::{Envelope, ProcessId, ScheduledEnvelope};
use crate::error::{BroadcastError, TransportError};
use crate::network::delay::{DelayModel, GaussianDelayModel};
use crate::time::{Clock, SystemClock};
use crate::wire::Wire;

const NO_CLIENT: usize = usize::MAX;

/// How far a drain goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTarget {
    /// Empty the wire.
    All,
    /// Stop right after the first envelope addressed to this process.
    Until(ProcessId),
}

struct Core {
    delay: Box<dyn DelayModel>,
}

pub struct Transport {
    process_count: usize,
    core: Mutex<Core>,
    wire: Wire,
    buffers: Box<[DeliveryBuffer]>,
    clock: Arc<dyn Clock>,
    sent: AtomicU64,
    delivered: AtomicU64,
    empty_polls: AtomicU64,
    last_client: AtomicUsize,
}

impl Transport {
    /// Creates a transport for `process_count` processes with a time-seeded
    /// Gaussian delay of `mean_delay_ms` and spread `variance_ms`.
    pub fn new(
        process_count: usize,
        mean_delay_ms: u64,
        variance_ms: u64,
    ) -> Result<Self, TransportError> {
        Self::builder(process_count)
            .gaussian_delay(mean_delay_ms, variance_ms)
            .build()
    }

    pub fn builder(process_count: usize) -> TransportBuilder {
        TransportBuilder::new(process_count)
    }

    /// Enqueues `envelope` on the wire.
    ///
    /// A full wire is drained completely before the push is retried once. If
    /// the drain could not free a slot (a bounded delivery buffer refused
    /// traffic), the send fails with [`TransportError::ChannelFull`].
    pub fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.check_id(envelope.sender())?;
        self.check_id(envelope.receiver())?;
        self.touch(envelope.sender());

        let mut core = self.core.lock();
        if let Err(rejected) = self.wire.try_push(envelope) {
            let moved = self.drain_locked(&mut core, DrainTarget::All);
            trace!(moved, "wire full, drained before retrying push");
            if self.wire.try_push(rejected).is_err() {
                let capacity = self.wire.capacity();
                warn!(
                    sender = %envelope.sender(),
                    receiver = %envelope.receiver(),
                    capacity,
                    "wire still full after draining, send rejected"
                );
                return Err(TransportError::ChannelFull { capacity });
            }
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        trace!(
            sender = %envelope.sender(),
            receiver = %envelope.receiver(),
            kind = %envelope.kind(),
            round = envelope.round(),
            "envelope sent"
        );
        Ok(())
    }

    /// Sends a copy of `envelope` to every process, including the sender.
    ///
    /// Every destination is attempted; failures are collected rather than
    /// stopping the loop.
    pub fn broadcast(&self, envelope: &Envelope) -> Result<(), BroadcastError> {
        let failures: Vec<_> = (0..self.process_count)
            .map(ProcessId::new)
            .filter_map(|to| {
                self.send(envelope.readdressed(to))
                    .err()
                    .map(|err| (to, err))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(
                sender = %envelope.sender(),
                failed = failures.len(),
                "broadcast incomplete"
            );
            Err(BroadcastError { failures })
        }
    }

    /// Returns the next due envelope for `id`, or `Ok(None)` when nothing is
    /// due yet. Never blocks beyond lock acquisition; callers poll.
    pub fn deliver(&self, id: ProcessId) -> Result<Option<Envelope>, TransportError> {
        self.check_id(id)?;
        self.touch(id);

        let buffer = &self.buffers[id.index()];
        if buffer.is_empty() {
            self.drain(DrainTarget::Until(id))?;
        }

        match buffer.pop(self.clock.now()) {
            Some(envelope) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(
                    receiver = %id,
                    sender = %envelope.sender(),
                    round = envelope.round(),
                    "envelope delivered"
                );
                Ok(Some(envelope))
            }
            None => {
                self.empty_polls.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Moves envelopes from the wire into their delivery buffers and returns
    /// how many were moved.
    ///
    /// A targeted drain is skipped when the target's buffer already holds
    /// something by the time the transport lock is acquired.
    pub fn drain(&self, target: DrainTarget) -> Result<usize, TransportError> {
        if let DrainTarget::Until(id) = target {
            self.check_id(id)?;
        }
        let mut core = self.core.lock();
        if let DrainTarget::Until(id) = target {
            if !self.buffers[id.index()].is_empty() {
                return Ok(0);
            }
        }
        Ok(self.drain_locked(&mut core, target))
    }

    fn drain_locked(&self, core: &mut Core, target: DrainTarget) -> usize {
        let mut moved = 0;
        while let Some(head) = self.wire.front() {
            let receiver = head.receiver();
            let buffer = &self.buffers[receiver.index()];
            if !buffer.has_room() {
                trace!(%receiver, "delivery buffer full, drain stalled");
                break;
            }
            let Some(envelope) = self.wire.try_pop() else {
                break;
            };
            let deliver_at = self.clock.now() + core.delay.delay();
            buffer.add(ScheduledEnvelope::new(envelope, deliver_at));
            moved += 1;

            if target == DrainTarget::Until(receiver) {
                break;
            }
        }
        if moved > 0 {
            trace!(moved, ?target, remaining = self.wire.len(), "wire drained");
        }
        moved
    }

    fn check_id(&self, id: ProcessId) -> Result<(), TransportError> {
        if id.is_valid_for(self.process_count) {
            Ok(())
        } else {
            warn!(%id, process_count = self.process_count, "invalid process id");
            Err(TransportError::InvalidProcessId {
                id,
                process_count: self.process_count,
            })
        }
    }

    #[inline]
    fn touch(&self, id: ProcessId) {
        self.last_client.store(id.index(), Ordering::Relaxed);
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    /// Wire capacity, `process_count²`.
    pub fn capacity(&self) -> usize {
        self.wire.capacity()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of `deliver` calls that found nothing due.
    pub fn empty_polls(&self) -> u64 {
        self.empty_polls.load(Ordering::Relaxed)
    }

    /// Last process that sent or polled. Diagnostic only.
    pub fn last_client(&self) -> Option<ProcessId> {
        match self.last_client.load(Ordering::Relaxed) {
            NO_CLIENT => None,
            id => Some(ProcessId::new(id)),
        }
    }

    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Number of envelopes waiting in `id`'s delivery buffer.
    pub fn buffer_len(&self, id: ProcessId) -> Result<usize, TransportError> {
        self.check_id(id)?;
        Ok(self.buffers[id.index()].len())
    }

    /// Envelopes sent but not yet delivered: on the wire or in a buffer.
    pub fn in_flight(&self) -> usize {
        let _core = self.core.lock();
        self.wire.len() + self.buffers.iter().map(DeliveryBuffer::len).sum::<usize>()
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let _core = self.core.lock();
        TransportSnapshot {
            last_client: self.last_client(),
            sent: self.sent(),
            delivered: self.delivered(),
            empty_polls: self.empty_polls(),
            wire_len: self.wire.len(),
            buffer_sizes: self.buffers.iter().map(DeliveryBuffer::len).collect(),
        }
    }

    /// Writes the current state to standard output.
    pub fn print_state(&self) {
        println!("{}", self.snapshot());
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("process_count", &self.process_count)
            .field("sent", &self.sent())
            .field("delivered", &self.delivered())
            .field("empty_polls", &self.empty_polls())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Transport`].
pub struct TransportBuilder {
    process_count: usize,
    mean_delay_ms: u64,
    variance_ms: u64,
    seed: Option<u64>,
    delay: Option<Box<dyn DelayModel>>,
    clock: Option<Arc<dyn Clock>>,
    buffer_limit: Option<usize>,
}

impl TransportBuilder {
    fn new(process_count: usize) -> Self {
        Self {
            process_count,
            mean_delay_ms: 0,
            variance_ms: 0,
            seed: None,
            delay: None,
            clock: None,
            buffer_limit: None,
        }
    }

    /// Gaussian delay parameters, in milliseconds.
    pub fn gaussian_delay(mut self, mean_delay_ms: u64, variance_ms: u64) -> Self {
        self.mean_delay_ms = mean_delay_ms;
        self.variance_ms = variance_ms;
        self
    }

    /// Seeds the Gaussian delay model instead of seeding from the clock.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replaces the Gaussian delay model entirely.
    pub fn delay_model(mut self, model: impl DelayModel + 'static) -> Self {
        self.delay = Some(Box::new(model));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Bounds every delivery buffer to `limit` envelopes.
    pub fn buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<Transport, TransportError> {
        if self.process_count == 0 {
            return Err(TransportError::InvalidProcessCount);
        }
        let capacity = self.process_count.saturating_mul(self.process_count);

        let (delay, seed) = match (self.delay, self.seed) {
            (Some(model), _) => (model, None),
            (None, seed) => {
                let model = match seed {
                    Some(seed) => {
                        GaussianDelayModel::with_seed(self.mean_delay_ms, self.variance_ms, seed)
                    }
                    None => GaussianDelayModel::new(self.mean_delay_ms, self.variance_ms),
                };
                let seed = model.seed();
                (Box::new(model) as Box<dyn DelayModel>, Some(seed))
            }
        };

        let buffers = (0..self.process_count)
            .map(|_| match self.buffer_limit {
                Some(limit) => DeliveryBuffer::bounded(limit),
                None => DeliveryBuffer::new(),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(
            process_count = self.process_count,
            capacity,
            mean_delay_ms = self.mean_delay_ms,
            variance_ms = self.variance_ms,
            seed = ?seed,
            buffer_limit = ?self.buffer_limit,
            "transport created"
        );

        Ok(Transport {
            process_count: self.process_count,
            core: Mutex::new(Core { delay }),
            wire: Wire::with_capacity(capacity),
            buffers,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sent: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            last_client: AtomicUsize::new(NO_CLIENT),
        })
    }
}

/// Point-in-time view of a transport's counters and queue sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSnapshot {
    pub last_client: Option<ProcessId>,
    pub sent: u64,
    pub delivered: u64,
    pub empty_polls: u64,
    pub wire_len: usize,
    pub buffer_sizes: Vec<usize>,
}

impl TransportSnapshot {
    pub fn in_flight(&self) -> usize {
        self.wire_len + self.buffer_sizes.iter().sum::<usize>()
    }
}

impl fmt::Display for TransportSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_client {
            Some(id) => writeln!(f, "last client {}", id)?,
            None => writeln!(f, "last client none")?,
        }
        writeln!(
            f,
            "sent: {}; delivered: {}; empty polls: {}",
            self.sent, self.delivered, self.empty_polls
        )?;
        write!(f, "wire: {}\nqueue sizes:", self.wire_len)?;
        for (process, size) in self.buffer_sizes.iter().enumerate() {
            write!(f, "\n\tprocess {} : {}", process, size)?;
        }
        Ok(())
    }
}
