//! PKCS#7 padding over a byte buffer and a block size.
//!
//! Unpadding trusts the final byte as the padding count and does NOT check
//! that the trailing bytes all hold that value. Files written by older
//! producers depend on this; only counts that would make slicing unsafe are
//! rejected.

use cachet_core::{CachetError, CachetResult};

/// Pad `data` to a multiple of `block`.
///
/// Always appends between 1 and `block` bytes, each holding the pad count;
/// input already on a block boundary gets a full extra block. `block` must
/// be in 1..=255 so the count fits one byte.
pub fn pad(data: &[u8], block: usize) -> Vec<u8> {
    debug_assert!(block > 0 && block <= 255);
    let padding = block - data.len() % block;
    let mut out = Vec::with_capacity(data.len() + padding);
    out.extend_from_slice(data);
    out.resize(data.len() + padding, padding as u8);
    out
}

/// Strip PKCS#7 padding, trusting the final count byte.
///
/// Rejects counts of zero, counts larger than `block`, and counts larger
/// than the buffer itself; anything else is sliced off unchecked.
pub fn unpad(data: &[u8], block: usize) -> CachetResult<Vec<u8>> {
    let last = *data
        .last()
        .ok_or_else(|| CachetError::Padding("empty buffer".into()))?;
    let count = last as usize;
    if count == 0 || count > block {
        return Err(CachetError::Padding(format!(
            "pad count {count} outside 1..={block}"
        )));
    }
    if count > data.len() {
        return Err(CachetError::Padding(format!(
            "pad count {count} exceeds buffer of {} bytes",
            data.len()
        )));
    }
    Ok(data[..data.len() - count].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::BLOCK_SIZE;
    use proptest::prelude::*;

    #[test]
    fn test_pad_partial_block() {
        let padded = pad(b"hello", 8);
        assert_eq!(padded, b"hello\x03\x03\x03");
    }

    #[test]
    fn test_pad_aligned_input_gets_full_block() {
        let padded = pad(&[7u8; 16], BLOCK_SIZE);
        assert_eq!(padded.len(), 32);
        assert!(padded[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn test_pad_empty_input() {
        let padded = pad(b"", BLOCK_SIZE);
        assert_eq!(padded, vec![16u8; 16]);
    }

    #[test]
    fn test_unpad_rejects_zero_count() {
        let err = unpad(&[1, 2, 3, 0], BLOCK_SIZE).unwrap_err();
        assert!(matches!(err, cachet_core::CachetError::Padding(_)));
    }

    #[test]
    fn test_unpad_rejects_oversized_count() {
        assert!(unpad(&[5, 5], 4).is_err());
        assert!(unpad(&[3], 4).is_err());
    }

    #[test]
    fn test_unpad_is_permissive_about_content() {
        // Trailing bytes do not all match the count; older files rely on
        // this being accepted.
        let out = unpad(&[9, 9, 9, 2], 4).unwrap();
        assert_eq!(out, vec![9, 9]);
    }

    proptest! {
        #[test]
        fn prop_unpad_inverts_pad(data in proptest::collection::vec(any::<u8>(), 0..200),
                                  block in 1usize..=32) {
            let padded = pad(&data, block);
            prop_assert_eq!(padded.len() % block, 0);
            prop_assert!(padded.len() > data.len());
            prop_assert!(padded.len() - data.len() <= block);
            prop_assert_eq!(unpad(&padded, block).unwrap(), data);
        }
    }
}
