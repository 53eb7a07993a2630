//! cachet-crypto: the symmetric half of cachet
//!
//! Pipeline: key material → hex-encode → stretch to AES key length →
//! `Encryptor` over whole byte buffers, one of five modes:
//!
//! ```text
//! Encryptor (key + IV + mode)
//!   ├── ECB  independent blocks, no IV
//!   ├── CBC  block chaining seeded by IV
//!   ├── CTR  big-endian counter keystream
//!   ├── CFB  full-block ciphertext feedback
//!   └── OFB  output feedback keystream
//! ```
//!
//! Input is PKCS#7-padded before encryption in every mode, stream modes
//! included, so ciphertext length is always a block multiple. That is a
//! wire-format property, not an accident.

pub mod cipher;
pub mod padding;
pub mod stretch;

pub use cipher::{Encryptor, SessionKey};
pub use padding::{pad, unpad};
pub use stretch::{derive_key, stretch};

pub use cachet_core::BLOCK_SIZE;
