//! SQLite backend configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the embedded SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the database file, or `:memory:` for an in-memory database.
    pub path: PathBuf,

    /// Enable WAL journaling. Keeps readers unblocked during long writes.
    pub wal_mode: bool,

    /// Enforce foreign key constraints at the engine level.
    pub foreign_keys: bool,

    /// How long the engine retries when the file is locked by another
    /// process before giving up, in milliseconds.
    pub busy_timeout_ms: u32,

    /// Page cache size passed to `PRAGMA cache_size`.
    pub cache_size: i32,
}

impl SqliteConfig {
    /// Configuration for a file-backed database with default tuning.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Configuration for an in-memory database, mainly for tests.
    pub fn memory() -> Self {
        Self::new(":memory:")
    }

    /// Whether this configuration targets an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(":memory:")
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_ms: 5000,
            cache_size: -2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config_is_detected() {
        assert!(SqliteConfig::memory().is_memory());
        assert!(!SqliteConfig::new("/tmp/piezo.db").is_memory());
    }

    #[test]
    fn defaults_enable_integrity_settings() {
        let config = SqliteConfig::default();
        assert!(config.wal_mode);
        assert!(config.foreign_keys);
        assert!(config.busy_timeout_ms > 0);
    }
}
