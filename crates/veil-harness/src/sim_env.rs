//! Simulation environment.

#![allow(clippy::disallowed_types, reason = "RNG access is synchronous, never held across await")]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use veil_core::Environment;

/// Deterministic environment for tests.
///
/// Time comes from tokio, so `#[tokio::test(start_paused = true)]` gives a
/// virtual clock that only advances when every task is idle. Clones share one
/// RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with a specific seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // A poisoned lock still holds a valid RNG state.
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bytes() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);

        assert_eq!(a.random_u64(), b.random_u64());
        assert_eq!(a.random_u128(), b.random_u128());
    }

    #[test]
    fn clones_share_stream() {
        let env = SimEnv::with_seed(7);
        let clone = env.clone();
        let fresh = SimEnv::with_seed(7);

        let first = env.random_u64();
        let second = clone.random_u64();

        assert_eq!(first, fresh.random_u64());
        assert_ne!(second, first);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_virtual_clock() {
        let env = SimEnv::new();
        let start = env.now();

        env.sleep(Duration::from_secs(2)).await;

        assert_eq!(env.now() - start, Duration::from_secs(2));
    }
}
