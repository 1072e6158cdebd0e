//! Transport configuration.
//!
//! Sizing and delay parameters for the simulated wire:
//! - Number of simulated processes (wire capacity is its square)
//! - Gaussian delay mean and spread
//! - Optional seed and delivery buffer bound

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Number of simulated processes.
    #[serde(default = "default_process_count")]
    #[validate(range(min = 1, max = 1024))]
    pub process_count: usize,

    /// Mean delivery delay (ms).
    #[serde(default = "default_mean_delay_ms")]
    #[validate(range(max = 60_000))]
    pub mean_delay_ms: u64,

    /// Spread applied to the standard-normal delay sample (ms).
    #[serde(default = "default_variance_ms")]
    #[validate(range(max = 60_000))]
    pub variance_ms: u64,

    /// Fixed seed for the delay model. Seeded from the clock when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Maximum envelopes per delivery buffer. Unbounded when absent.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub buffer_limit: Option<usize>,
}

fn default_process_count() -> usize {
    4
}

fn default_mean_delay_ms() -> u64 {
    10
}

fn default_variance_ms() -> u64 {
    2
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            process_count: default_process_count(),
            mean_delay_ms: default_mean_delay_ms(),
            variance_ms: default_variance_ms(),
            seed: None,
            buffer_limit: None,
        }
    }
}

impl TransportConfig {
    /// Wire capacity implied by `process_count`.
    pub fn wire_capacity(&self) -> usize {
        self.process_count * self.process_count
    }
}
