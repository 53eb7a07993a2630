use thiserror::Error;

pub type CachetResult<T> = Result<T, CachetError>;

#[derive(Debug, Error)]
pub enum CachetError {
    #[error("invalid key length: {0} bytes (AES needs 16, 24, or 32)")]
    InvalidKeyLength(usize),

    #[error("invalid IV length: {0} bytes (need at least 16)")]
    InvalidIvLength(usize),

    #[error("IV not set before cipher operation")]
    IvNotSet,

    #[error("unsupported cipher mode: {0}")]
    UnsupportedMode(String),

    #[error("malformed ciphertext: {0} bytes is not a block multiple")]
    MalformedCiphertext(usize),

    #[error("bad padding: {0}")]
    Padding(String),

    #[error("invalid key material: seed must not be empty")]
    InvalidKeyMaterial,

    #[error("malformed framed file: {0}")]
    MalformedFrame(String),

    #[error("envelope error: {0}")]
    Envelope(String),

    #[error("plaintext digest mismatch: file corrupted or wrong key")]
    DigestMismatch,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
