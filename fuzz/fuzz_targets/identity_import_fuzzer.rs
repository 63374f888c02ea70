//! Fuzz target for identity import
//!
//! # Strategy
//!
//! - Raw slots: arbitrary strings as the two persisted identity slots
//! - Swapped halves: a real private key with a different real public key
//!
//! # Invariants
//!
//! - Import never panics
//! - Mismatched halves never import
//! - A genuine pair always imports with its own public key

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use veil_crypto::{IdentityKeyPair, StoredKeyMaterial};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    Raw { private_key: String, public_key: String },
    Swapped { seed_a: u64, seed_b: u64 },
}

fuzz_target!(|input: Input| match input {
    Input::Raw { private_key, public_key } => {
        let material = StoredKeyMaterial { private_key: Zeroizing::new(private_key), public_key };
        let _ = IdentityKeyPair::import(&material);
    },
    Input::Swapped { seed_a, seed_b } => {
        let a = IdentityKeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed_a)).export();
        let b = IdentityKeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed_b)).export();

        let own = IdentityKeyPair::import(&a).unwrap();
        assert_eq!(own.public_key().as_str(), a.public_key);

        if a.public_key != b.public_key {
            let swapped =
                StoredKeyMaterial { private_key: a.private_key.clone(), public_key: b.public_key };
            assert!(IdentityKeyPair::import(&swapped).is_err());
        }
    },
});
