use std::fmt;
use std::str::FromStr;

use crate::error::{CachetError, CachetResult};

/// AES block size in bytes. Every mode operates on 16-byte blocks and every
/// framed file starts with a 16-byte IV record, ECB included.
pub const BLOCK_SIZE: usize = 16;

/// Block-cipher mode of operation.
///
/// ECB ignores the IV; the other four require a full block-length IV before
/// the first cipher call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Ecb,
    Cbc,
    Ctr,
    Cfb,
    Ofb,
}

impl CipherMode {
    pub fn requires_iv(self) -> bool {
        !matches!(self, CipherMode::Ecb)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CipherMode::Ecb => "ecb",
            CipherMode::Cbc => "cbc",
            CipherMode::Ctr => "ctr",
            CipherMode::Cfb => "cfb",
            CipherMode::Ofb => "ofb",
        }
    }
}

impl FromStr for CipherMode {
    type Err = CachetError;

    fn from_str(s: &str) -> CachetResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ecb" => Ok(CipherMode::Ecb),
            "cbc" => Ok(CipherMode::Cbc),
            "ctr" => Ok(CipherMode::Ctr),
            "cfb" => Ok(CipherMode::Cfb),
            "ofb" => Ok(CipherMode::Ofb),
            other => Err(CachetError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AES key width selected by the middle field of the security string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBits {
    Aes128,
    Aes192,
    Aes256,
}

impl KeyBits {
    /// Key length in bytes for this AES variant.
    pub fn key_len(self) -> usize {
        match self {
            KeyBits::Aes128 => 16,
            KeyBits::Aes192 => 24,
            KeyBits::Aes256 => 32,
        }
    }

    pub fn bits(self) -> u32 {
        self.key_len() as u32 * 8
    }
}

/// A parsed `aes-<bits>-<mode>` security string, e.g. `aes-256-cbc`.
///
/// Exactly three hyphen-separated fields; the algorithm field must be `aes`;
/// bits and mode are validated here, before any cipher is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecuritySpec {
    pub bits: KeyBits,
    pub mode: CipherMode,
}

impl FromStr for SecuritySpec {
    type Err = CachetError;

    fn from_str(s: &str) -> CachetResult<Self> {
        let fields: Vec<&str> = s.split('-').collect();
        if fields.len() != 3 {
            return Err(CachetError::Config(format!(
                "security must be aes-<bits>-<mode>, got: {s}"
            )));
        }
        if !fields[0].eq_ignore_ascii_case("aes") {
            return Err(CachetError::Config(format!(
                "unsupported algorithm: {} (only aes)",
                fields[0]
            )));
        }
        let bits = match fields[1] {
            "128" => KeyBits::Aes128,
            "192" => KeyBits::Aes192,
            "256" => KeyBits::Aes256,
            other => {
                return Err(CachetError::Config(format!(
                    "unsupported key bits: {other} (128, 192, or 256)"
                )))
            }
        };
        let mode = fields[2].parse()?;
        Ok(SecuritySpec { bits, mode })
    }
}

impl fmt::Display for SecuritySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aes-{}-{}", self.bits.bits(), self.mode)
    }
}
