//! Credential storage collaborator interface.
//!
//! Backends that require credentials (e.g. a remote relational backend)
//! fetch them through this trait. When no secret store is available the
//! application falls back to [`NoopSecretStore`], which degrades to empty
//! passwords instead of crashing.

use std::collections::HashMap;

/// Minimal password store keyed by (database, username).
pub trait SecretStore: Send {
    /// The stored password, or an empty string when none is known.
    fn get_password(&self, database: &str, username: &str) -> String;

    /// Persist a password for later retrieval.
    fn store_password(&mut self, database: &str, username: &str, password: &str);
}

/// Secret store used when no platform backend is available; never stores
/// anything and always returns empty passwords.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSecretStore;

impl SecretStore for NoopSecretStore {
    fn get_password(&self, _database: &str, _username: &str) -> String {
        String::new()
    }

    fn store_password(&mut self, _database: &str, _username: &str, _password: &str) {}
}

/// Volatile in-process store, mainly useful in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecretStore {
    passwords: HashMap<(String, String), String>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get_password(&self, database: &str, username: &str) -> String {
        self.passwords
            .get(&(database.to_string(), username.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn store_password(&mut self, database: &str, username: &str, password: &str) {
        self.passwords.insert(
            (database.to_string(), username.to_string()),
            password.to_string(),
        );
    }
}
