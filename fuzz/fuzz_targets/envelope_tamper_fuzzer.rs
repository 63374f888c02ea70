//! Fuzz target for envelope decryption
//!
//! # Strategy
//!
//! - Raw fields: arbitrary ciphertext/iv strings straight into `decrypt`
//! - Bit flips: seal a real message, flip one bit of the decoded ciphertext
//!   or IV, re-encode
//! - Truncation: cut the ciphertext short, down to below the tag size
//!
//! # Invariants
//!
//! - `decrypt` never panics
//! - A modified envelope never decrypts, let alone to different plaintext
//! - The untouched envelope always decrypts to the original

#![no_main]

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::STANDARD};
use libfuzzer_sys::fuzz_target;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use veil_crypto::{EncryptedEnvelope, RoomKey, decrypt, encrypt};

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    Raw { ciphertext: String, iv: String },
    FlipCiphertext { plaintext: String, bit: u16 },
    FlipIv { plaintext: String, bit: u8 },
    Truncate { plaintext: String, keep: u16 },
}

fuzz_target!(|case: (u64, Input)| {
    let (seed, input) = case;
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let key = RoomKey::generate(&mut rng);

    match input {
        Input::Raw { ciphertext, iv } => {
            let _ = decrypt(&EncryptedEnvelope { ciphertext, iv }, key.key());
        },
        Input::FlipCiphertext { plaintext, bit } => {
            let sealed = encrypt(&plaintext, key.key(), &mut rng).unwrap();
            assert_eq!(decrypt(&sealed, key.key()).unwrap(), plaintext);

            let mut bytes = STANDARD.decode(&sealed.ciphertext).unwrap();
            let bit = usize::from(bit) % (bytes.len() * 8);
            bytes[bit / 8] ^= 1 << (bit % 8);
            let tampered = EncryptedEnvelope { ciphertext: STANDARD.encode(&bytes), iv: sealed.iv };

            assert!(decrypt(&tampered, key.key()).is_err());
        },
        Input::FlipIv { plaintext, bit } => {
            let sealed = encrypt(&plaintext, key.key(), &mut rng).unwrap();

            let mut bytes = STANDARD.decode(&sealed.iv).unwrap();
            let bit = usize::from(bit) % (bytes.len() * 8);
            bytes[bit / 8] ^= 1 << (bit % 8);
            let tampered =
                EncryptedEnvelope { ciphertext: sealed.ciphertext, iv: STANDARD.encode(&bytes) };

            assert!(decrypt(&tampered, key.key()).is_err());
        },
        Input::Truncate { plaintext, keep } => {
            let sealed = encrypt(&plaintext, key.key(), &mut rng).unwrap();

            let bytes = STANDARD.decode(&sealed.ciphertext).unwrap();
            let keep = usize::from(keep) % bytes.len();
            let tampered =
                EncryptedEnvelope { ciphertext: STANDARD.encode(&bytes[..keep]), iv: sealed.iv };

            assert!(decrypt(&tampered, key.key()).is_err());
        },
    }
});
