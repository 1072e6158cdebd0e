use thiserror::Error;

use crate::envelope::ProcessId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid process id {id}: expected a value below {process_count}")]
    InvalidProcessId { id: ProcessId, process_count: usize },

    #[error("Channel full: wire still holds {capacity} envelopes after draining")]
    ChannelFull { capacity: usize },

    #[error("Invalid process count: a transport needs at least one process")]
    InvalidProcessCount,
}

/// Per-destination failures of a broadcast. Every destination is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_failures(.failures))]
pub struct BroadcastError {
    pub failures: Vec<(ProcessId, TransportError)>,
}

impl BroadcastError {
    pub fn failed_destinations(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.failures.iter().map(|(id, _)| *id)
    }
}

fn format_failures(failures: &[(ProcessId, TransportError)]) -> String {
    use std::fmt::Write;

    let mut output = format!("Broadcast failed for {} destination(s)", failures.len());
    for (id, err) in failures {
        let _ = write!(output, "; {}: {}", id, err);
    }
    output
}
