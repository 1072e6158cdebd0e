//! ## kanal-core::envelope
//! **Message units exchanged between simulated processes**
//!
//! An [`Envelope`] is a small `Copy` value. It is created by a sender, travels
//! over the wire, gets a delivery instant when it is drained
//! ([`ScheduledEnvelope`]) and is handed back to the receiver by `deliver`.

use std::fmt;
use std::time::Instant;

/// Identifier of a simulated process, valid in `0..process_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(usize);

impl ProcessId {
    #[inline]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns true when the id addresses one of `process_count` processes.
    #[inline]
    pub const fn is_valid_for(self, process_count: usize) -> bool {
        self.0 < process_count
    }
}

impl From<usize> for ProcessId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of consensus message carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Report,
    Proposal,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Report => f.write_str("report"),
            MessageKind::Proposal => f.write_str("proposal"),
        }
    }
}

/// A message from one process to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Envelope {
    sender: ProcessId,
    receiver: ProcessId,
    kind: MessageKind,
    round: u64,
    estimate: i64,
}

impl Envelope {
    pub fn new(
        sender: ProcessId,
        receiver: ProcessId,
        kind: MessageKind,
        round: u64,
        estimate: i64,
    ) -> Self {
        Self {
            sender,
            receiver,
            kind,
            round,
            estimate,
        }
    }

    /// Returns a copy of this envelope addressed to `receiver`.
    ///
    /// Broadcast uses this to build one envelope per destination; `self` is
    /// left untouched.
    #[must_use]
    pub fn readdressed(&self, receiver: ProcessId) -> Self {
        Self { receiver, ..*self }
    }

    #[inline]
    pub fn sender(&self) -> ProcessId {
        self.sender
    }

    #[inline]
    pub fn receiver(&self) -> ProcessId {
        self.receiver
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    #[inline]
    pub fn round(&self) -> u64 {
        self.round
    }

    #[inline]
    pub fn estimate(&self) -> i64 {
        self.estimate
    }
}

/// An envelope paired with the instant at which it becomes deliverable.
///
/// Only the drain creates these: the delay is computed when the envelope
/// leaves the wire, not when it was sent.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledEnvelope {
    envelope: Envelope,
    deliver_at: Instant,
}

impl ScheduledEnvelope {
    pub fn new(envelope: Envelope, deliver_at: Instant) -> Self {
        Self {
            envelope,
            deliver_at,
        }
    }

    #[inline]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[inline]
    pub fn deliver_at(&self) -> Instant {
        self.deliver_at
    }

    /// Due once `now` has reached the delivery instant.
    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deliver_at <= now
    }

    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }
}
