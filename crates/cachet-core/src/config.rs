use serde::{Deserialize, Serialize};

/// Top-level configuration (loaded from cachet.toml).
///
/// The merged config (file + CLI overrides) is built once at startup and is
/// immutable for the duration of one encrypt-or-decrypt run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CachetConfig {
    pub cipher: CipherConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Security string: aes-<bits>-<mode> (default: aes-256-cbc)
    pub security: String,
    /// Chunk size in MiB; files larger than one chunk are split and each
    /// chunk encrypted as its own framed record (default: 100)
    pub chunk_size_mib: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info); RUST_LOG overrides
    pub level: String,
    /// Log format: "text" or "json"
    pub format: String,
}

impl CipherConfig {
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mib * 1024 * 1024
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            security: "aes-256-cbc".into(),
            chunk_size_mib: 100,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
