//! Environment abstraction for deterministic testing.
//!
//! Decouples client logic from system resources (time, randomness). Enables
//! deterministic simulation (virtual clock, seeded RNG) and production use
//! with real system resources.

use std::{future::Future, ops::Sub, time::Duration};

use rand_core::{CryptoRng, RngCore};

/// Abstract environment providing time, randomness, and async sleeping.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`, simulation uses virtual time.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code (the sync loop) sleeps; protocol logic never does.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Used for room IDs.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// CSPRNG view of this environment for `veil_crypto` primitives.
    fn rng(&self) -> EnvRng<'_, Self> {
        EnvRng { env: self }
    }
}

/// Adapter exposing an [`Environment`] as a `rand_core` generator.
///
/// Marked [`CryptoRng`] on the strength of the `random_bytes` contract.
pub struct EnvRng<'a, E> {
    env: &'a E,
}

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.env.random_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.env.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.env.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.env.random_bytes(dest);
        Ok(())
    }
}

impl<E: Environment> CryptoRng for EnvRng<'_, E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct CountingEnv;

    impl Environment for CountingEnv {
        type Instant = std::time::Instant;

        #[allow(clippy::disallowed_methods)]
        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    #[test]
    fn rng_delegates_to_random_bytes() {
        let env = CountingEnv;
        let mut rng = env.rng();

        let mut buffer = [0u8; 4];
        rng.fill_bytes(&mut buffer);

        assert_eq!(buffer, [0, 1, 2, 3]);
        assert_eq!(rng.next_u32(), u32::from_le_bytes([0, 1, 2, 3]));
    }

    #[test]
    fn random_u128_uses_sixteen_bytes() {
        let value = CountingEnv.random_u128();
        assert_eq!(value.to_be_bytes(), std::array::from_fn::<u8, 16, _>(|i| i as u8));
    }
}
