//! ## kanal-core::network::delay
//! **Per-message delay models**
//!
//! A delay model is sampled once per envelope, at the moment the envelope is
//! drained off the wire. The resulting delay is added to the transport clock's
//! current instant to produce the delivery instant.
//!
//! ### Available Models:
//! - `GaussianDelayModel`: `N(0, 1) * variance_ms + mean_ms`, negative samples
//!   collapse to "already due".
//! - `FixedDelayModel`: constant delay.
//! - `NoDelayModel`: everything is due immediately.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

/// Trait for delay models.
pub trait DelayModel: Send {
    /// Draws one raw delay sample in milliseconds. May be negative.
    fn sample_ms(&mut self) -> f64;

    /// Draws one delay. Negative and non-finite samples become zero.
    fn delay(&mut self) -> Duration {
        let ms = self.sample_ms();
        if ms.is_finite() && ms > 0.0 {
            Duration::from_nanos((ms * 1_000_000.0) as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl<M: DelayModel + ?Sized> DelayModel for Box<M> {
    fn sample_ms(&mut self) -> f64 {
        (**self).sample_ms()
    }
}

/// Gaussian delay around `mean_ms`.
///
/// The standard-normal sample is scaled by `variance_ms` directly, so the
/// configured "variance" acts as the spread of the distribution.
#[derive(Debug, Clone)]
pub struct GaussianDelayModel {
    mean_ms: f64,
    variance_ms: f64,
    seed: u64,
    rng: SmallRng,
}

impl GaussianDelayModel {
    /// Creates a model seeded from the current wall-clock time.
    ///
    /// The seed is logged at debug level so a run can be replayed with
    /// [`with_seed`](Self::with_seed).
    pub fn new(mean_ms: u64, variance_ms: u64) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        debug!(seed, mean_ms, variance_ms, "seeded gaussian delay model from clock");
        Self::with_seed(mean_ms, variance_ms, seed)
    }

    /// Creates a reproducible model.
    pub fn with_seed(mean_ms: u64, variance_ms: u64, seed: u64) -> Self {
        Self {
            mean_ms: mean_ms as f64,
            variance_ms: variance_ms as f64,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DelayModel for GaussianDelayModel {
    #[inline]
    fn sample_ms(&mut self) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * self.variance_ms + self.mean_ms
    }
}

/// Fixed delay model.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayModel {
    delay_ms: u64,
}

impl FixedDelayModel {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl DelayModel for FixedDelayModel {
    #[inline]
    fn sample_ms(&mut self) -> f64 {
        self.delay_ms as f64
    }
}

/// No-op delay model (everything is due as soon as it is drained).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelayModel;

impl DelayModel for NoDelayModel {
    #[inline]
    fn sample_ms(&mut self) -> f64 {
        0.0
    }
}
