pub mod config;
pub mod error;
pub mod types;

pub use error::{CachetError, CachetResult};
pub use types::{CipherMode, KeyBits, SecuritySpec, BLOCK_SIZE};
