//! ## kanal-core::wire
//! **Capacity-bounded FIFO shared by all senders**
//!
//! Backed by a crossbeam [`ArrayQueue`] sized to the wire capacity. Pushes and
//! pops happen while the transport lock is held, which makes the capacity
//! check plus enqueue one atomic step; `len` and `capacity` can be read
//! without it.
//!
//! The drain needs to look at the head before deciding whether its receiver
//! can take it. The queue has no peek, so [`front`](Wire::front) moves the
//! head into a one-slot hold that [`try_pop`](Wire::try_pop) serves first.
//! A held envelope still counts against the capacity.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;

use crate::envelope::Envelope;

#[derive(Debug)]
pub struct Wire {
    queue: ArrayQueue<Envelope>,
    head: Mutex<Option<Envelope>>,
    holding: AtomicBool,
    capacity: usize,
}

impl Wire {
    /// # Panics
    /// If `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            head: Mutex::new(None),
            holding: AtomicBool::new(false),
            capacity,
        }
    }

    /// Enqueues at the tail, or returns the envelope when the wire is full.
    #[inline]
    pub fn try_push(&self, envelope: Envelope) -> Result<(), Envelope> {
        if self.is_full() {
            return Err(envelope);
        }
        self.queue.push(envelope)
    }

    /// The oldest envelope on the wire, without removing it.
    pub fn front(&self) -> Option<Envelope> {
        let mut head = self.head.lock();
        if head.is_none() {
            *head = self.queue.pop();
            self.holding.store(head.is_some(), Ordering::Release);
        }
        *head
    }

    #[inline]
    pub fn try_pop(&self) -> Option<Envelope> {
        let mut head = self.head.lock();
        match head.take() {
            Some(envelope) => {
                self.holding.store(false, Ordering::Release);
                Some(envelope)
            }
            None => self.queue.pop(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len() + usize::from(self.holding.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{MessageKind, ProcessId};

    fn envelope(round: u64) -> Envelope {
        Envelope::new(ProcessId::new(0), ProcessId::new(0), MessageKind::Report, round, 0)
    }

    #[test]
    fn signals_full() {
        let wire = Wire::with_capacity(2);
        wire.try_push(envelope(1)).unwrap();
        wire.try_push(envelope(2)).unwrap();
        assert!(wire.is_full());
        assert_eq!(wire.try_push(envelope(3)), Err(envelope(3)));
        assert_eq!(wire.len(), 2);
    }

    #[test]
    fn maintains_ordering() {
        let wire = Wire::with_capacity(4);
        wire.try_push(envelope(1)).unwrap();
        wire.try_push(envelope(2)).unwrap();
        assert_eq!(wire.front().map(|e| e.round()), Some(1));
        assert_eq!(wire.try_pop().map(|e| e.round()), Some(1));
        assert_eq!(wire.try_pop().map(|e| e.round()), Some(2));
        assert!(wire.try_pop().is_none());
        assert!(wire.is_empty());
    }

    #[test]
    fn held_head_counts_against_capacity() {
        let wire = Wire::with_capacity(2);
        wire.try_push(envelope(1)).unwrap();
        wire.try_push(envelope(2)).unwrap();

        assert_eq!(wire.front().map(|e| e.round()), Some(1));
        assert_eq!(wire.front().map(|e| e.round()), Some(1));
        assert_eq!(wire.len(), 2);
        assert_eq!(wire.try_push(envelope(3)), Err(envelope(3)));

        assert_eq!(wire.try_pop().map(|e| e.round()), Some(1));
        assert_eq!(wire.len(), 1);
        wire.try_push(envelope(3)).unwrap();
        assert_eq!(wire.try_pop().map(|e| e.round()), Some(2));
        assert_eq!(wire.try_pop().map(|e| e.round()), Some(3));
    }
}
