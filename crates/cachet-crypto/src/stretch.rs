//! Key stretching: arbitrary-length user key material → exact AES key length.
//!
//! The raw material is hex-encoded first (doubling its length), then
//! cyclically repeated or truncated to the byte length the chosen AES
//! variant needs. The hex step is part of the on-disk key derivation and
//! must stay bit-for-bit stable; changing it would orphan existing files.

use cachet_core::{CachetError, CachetResult, KeyBits};

use crate::cipher::SessionKey;

/// Expand or truncate `seed` to exactly `target` bytes.
///
/// Long seeds are truncated; short seeds are repeated cyclically, with a
/// partial final copy filling the remainder. An empty seed cannot be
/// stretched.
pub fn stretch(seed: &[u8], target: usize) -> CachetResult<Vec<u8>> {
    if seed.is_empty() {
        return Err(CachetError::InvalidKeyMaterial);
    }
    if seed.len() >= target {
        return Ok(seed[..target].to_vec());
    }
    let mut out = Vec::with_capacity(target);
    while out.len() < target {
        let take = (target - out.len()).min(seed.len());
        out.extend_from_slice(&seed[..take]);
    }
    Ok(out)
}

/// Derive the session key for `bits` from raw user key material.
pub fn derive_key(raw: &[u8], bits: KeyBits) -> CachetResult<SessionKey> {
    let seed = hex::encode(raw).into_bytes();
    let key = stretch(&seed, bits.key_len())?;
    Ok(SessionKey::new(key))
}
