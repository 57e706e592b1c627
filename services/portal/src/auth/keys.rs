//! Session signing seed helpers.
//!
//! # Purpose
//! Session tokens are signed with an Ed25519 key derived from a 32-byte seed.
//! The seed comes from configuration (base64) or is generated per process.
//!
//! # Key invariants
//! - Seeds are exactly 32 bytes; anything else is rejected.
//! - Seed material is never logged.
use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;

pub const SEED_LEN: usize = 32;

pub fn generate_seed() -> [u8; SEED_LEN] {
    let mut seed = [0u8; SEED_LEN];
    rand::thread_rng().fill_bytes(&mut seed);
    seed
}

/// Random key id; not a secret, only used to pick the verification key.
pub fn generate_kid() -> String {
    let mut kid_bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut kid_bytes);
    hex::encode(kid_bytes)
}

/// Accepts standard or URL-safe base64.
pub fn decode_seed(raw: &str) -> Result<[u8; SEED_LEN]> {
    let raw = raw.trim();
    let bytes = STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')))?;
    let Ok(seed) = <[u8; SEED_LEN]>::try_from(bytes.as_slice()) else {
        bail!("session seed must be {SEED_LEN} bytes, got {}", bytes.len());
    };
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_seeds_differ() {
        assert_ne!(generate_seed(), generate_seed());
        assert_eq!(generate_kid().len(), 16);
    }

    #[test]
    fn decode_accepts_both_alphabets() {
        let seed = [0xfbu8; SEED_LEN];
        assert_eq!(decode_seed(&STANDARD.encode(seed)).unwrap(), seed);
        assert_eq!(decode_seed(&URL_SAFE_NO_PAD.encode(seed)).unwrap(), seed);
    }

    #[test]
    fn decode_rejects_wrong_length_and_garbage() {
        assert!(decode_seed(&STANDARD.encode([1u8; 16])).is_err());
        assert!(decode_seed("***").is_err());
    }
}
