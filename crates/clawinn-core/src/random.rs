//! Shared, seedable randomness.
//!
//! Every random decision in the simulation draws from one [`SimRng`], so a
//! fixed seed plus a [`ManualClock`](crate::ManualClock) reproduces a run
//! exactly. The generator sits behind a synchronous mutex; callers must not
//! hold it across an `.await`, which the closure-based API enforces.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

/// Cloneable handle to a shared random generator.
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: Arc<Mutex<StdRng>>,
}

impl SimRng {
    /// Deterministic generator.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Generator seeded from the OS.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Runs `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.inner.lock();
        f(&mut rng)
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&self) -> f64 {
        self.with(|rng| rng.r#gen::<f64>())
    }

    /// Returns true with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        self.unit() < p
    }

    /// Uniform integer in `[min, max]`.
    pub fn between(&self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.with(|rng| rng.gen_range(min..=max))
    }

    /// Uniform index below `len`, or `None` for an empty range.
    pub fn index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.with(|rng| rng.gen_range(0..len)))
    }

    /// A v4 UUID drawn from this generator.
    pub fn uuid(&self) -> Uuid {
        let bytes: [u8; 16] = self.with(|rng| rng.r#gen());
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
