//! cachet-envelope: the asymmetric half of the hybrid scheme
//!
//! The bulk of a file is encrypted symmetrically (cachet-crypto); this crate
//! protects the session key and the plaintext integrity:
//!
//! ```text
//! [magic "cachet-envelope-v1"][u32 BE wrapped len][RSA-OAEP(session key)][16-byte MD5]
//! └───────────────── envelope header ─────────────────────────────────────────────┘
//! [framed body: IV record + ciphertext records]
//! ```
//!
//! Symmetric-only runs (`--key`) write no header; the framed body starts at
//! byte zero. The digest is MD5 of the original plaintext, checked after
//! decryption as a whole-file self-test. It is an integrity convenience, not
//! an authenticity guarantee.

pub mod header;
pub mod keys;

pub use header::{
    plaintext_digest, EnvelopeHeader, PlaintextDigest, DIGEST_LEN, ENVELOPE_MAGIC,
};
pub use keys::{
    generate_keypair, unwrap_key, wrap_key, KeyPairPaths, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE,
};
