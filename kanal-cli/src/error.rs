use std::time::Duration;

use thiserror::Error;

use kanal_core::{BroadcastError, TransportError};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error("process {process} starved in round {round} after {received} envelopes")]
    Starved {
        process: usize,
        round: u64,
        received: usize,
    },

    #[error("no report from {missing} process(es) within {timeout:?}")]
    Timeout { missing: usize, timeout: Duration },

    #[error("failed to spawn process thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("process thread {0} panicked")]
    WorkerPanicked(usize),

    #[error("run cancelled after another process failed")]
    Cancelled,

    #[error("transport lost envelopes: sent {sent}, delivered {delivered}")]
    Unbalanced { sent: u64, delivered: u64 },
}
