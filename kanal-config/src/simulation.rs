//! Simulation harness configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Parameters of the broadcast-round harness.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of broadcast rounds each process runs.
    #[serde(default = "default_rounds")]
    #[validate(range(min = 1, max = 100_000))]
    pub rounds: u64,

    /// Sleep between empty polls (µs).
    #[serde(default = "default_poll_interval_us")]
    #[validate(range(max = 1_000_000))]
    pub poll_interval_us: u64,

    /// Give up on a process that has not finished within this many seconds.
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
}

fn default_rounds() -> u64 {
    10
}

fn default_poll_interval_us() -> u64 {
    200
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            poll_interval_us: default_poll_interval_us(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
