//! Envelope header encode/decode and the plaintext digest.

use std::io::{Read, Write};

use md5::{Digest, Md5};

use cachet_core::{CachetError, CachetResult};

/// Fixed marker opening every hybrid-encrypted file.
pub const ENVELOPE_MAGIC: &[u8] = b"cachet-envelope-v1";

/// MD5 digest length in bytes.
pub const DIGEST_LEN: usize = 16;

/// Upper bound on the wrapped-key field; anything bigger than the largest
/// plausible RSA modulus means we are not looking at a header.
const MAX_WRAPPED_LEN: u32 = 64 * 1024;

/// Header of a hybrid-encrypted file: the RSA-wrapped session key plus an
/// MD5 digest of the plaintext for the post-decrypt self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub wrapped_key: Vec<u8>,
    pub digest: [u8; DIGEST_LEN],
}

impl EnvelopeHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> CachetResult<()> {
        w.write_all(ENVELOPE_MAGIC)?;
        w.write_all(&(self.wrapped_key.len() as u32).to_be_bytes())?;
        w.write_all(&self.wrapped_key)?;
        w.write_all(&self.digest)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> CachetResult<Self> {
        let mut magic = vec![0u8; ENVELOPE_MAGIC.len()];
        r.read_exact(&mut magic)
            .map_err(|_| CachetError::MalformedFrame("missing envelope header".into()))?;
        if magic != ENVELOPE_MAGIC {
            return Err(CachetError::MalformedFrame(
                "missing envelope header (was this file encrypted with --key?)".into(),
            ));
        }

        let mut len_bytes = [0u8; 4];
        r.read_exact(&mut len_bytes)?;
        let len = u32::from_be_bytes(len_bytes);
        if len == 0 || len > MAX_WRAPPED_LEN {
            return Err(CachetError::MalformedFrame(format!(
                "implausible wrapped-key length: {len}"
            )));
        }

        let mut wrapped_key = vec![0u8; len as usize];
        r.read_exact(&mut wrapped_key)?;
        let mut digest = [0u8; DIGEST_LEN];
        r.read_exact(&mut digest)?;

        Ok(Self {
            wrapped_key,
            digest,
        })
    }
}

/// Incremental MD5 over plaintext; the decrypt path feeds it one record at
/// a time for the post-run self-check.
#[derive(Default)]
pub struct PlaintextDigest {
    hasher: Md5,
}

impl PlaintextDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.hasher.finalize().into()
    }
}

/// Streaming MD5 over a reader; used for the header digest on encrypt.
pub fn plaintext_digest<R: Read>(mut r: R) -> CachetResult<[u8; DIGEST_LEN]> {
    let mut digest = PlaintextDigest::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    Ok(digest.finalize())
}
