//! ## kanal-core::buffer
//! **Per-destination delivery buffers**
//!
//! Each simulated process owns one [`DeliveryBuffer`]. The drain appends
//! scheduled envelopes to it and the owning process pops them once due.
//!
//! ### Ordering:
//! - Strict FIFO by insertion order.
//! - `pop` only ever looks at the head. A later envelope that is already due
//!   waits behind an earlier one that is not (head-of-line stalling).

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

use crate::envelope::{Envelope, ScheduledEnvelope};

/// Lock-protected FIFO of envelopes waiting for their delivery instant.
#[derive(Debug, Default)]
pub struct DeliveryBuffer {
    queue: Mutex<VecDeque<ScheduledEnvelope>>,
    limit: Option<usize>,
}

impl DeliveryBuffer {
    /// Creates an unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that stops admitting envelopes once it holds `limit`.
    ///
    /// The drain checks [`has_room`](Self::has_room) before moving an envelope
    /// off the wire, so a full bounded buffer leaves its traffic on the wire.
    pub fn bounded(limit: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(limit)),
            limit: Some(limit),
        }
    }

    /// Appends to the tail. Always succeeds; admission is decided by the
    /// caller through [`has_room`](Self::has_room).
    pub fn add(&self, scheduled: ScheduledEnvelope) {
        self.queue.lock().push_back(scheduled);
    }

    /// Removes and returns the head envelope if it is due at `now`.
    pub fn pop(&self, now: Instant) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        if queue.front().is_some_and(|head| head.is_due(now)) {
            queue.pop_front().map(ScheduledEnvelope::into_envelope)
        } else {
            None
        }
    }

    pub fn has_room(&self) -> bool {
        match self.limit {
            Some(limit) => self.len() < limit,
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}
