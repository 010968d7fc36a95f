//! Error types for the SQLite backend.

use piezo_core::AccessorError;
use thiserror::Error;

/// SQLite backend error type.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database file unreachable or could not be opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("query error: {0}")]
    Query(String),

    /// The file does not carry the expected application id.
    #[error("'{path}' is not a recognized database file (application id {found})")]
    NotADatabase {
        path: String,
        found: i32,
        expected: i32,
    },

    /// The schema version is newer than this build supports.
    #[error("database schema version {version} is newer than the supported version {supported}")]
    VersionTooNew { version: i32, supported: i32 },

    /// A schema migration step failed and was rolled back.
    #[error("failed to update the database schema from version {from} to {to}: {source}")]
    Migration {
        from: i32,
        to: i32,
        #[source]
        source: rusqlite::Error,
    },

    /// No row with the given identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// Deleting would strand rows that still reference the entity.
    #[error("delete violates foreign key constraint on {table}.{column}")]
    ForeignKey { table: String, column: String },

    /// The caller supplied inconsistent or unknown attributes.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored datetime deviates from the fixed storage format.
    #[error("stored datetime '{0}' does not match the storage format")]
    Datetime(String),

    /// Underlying rusqlite error.
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite backend operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for AccessorError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Connection(msg) => Self::Connection(msg),
            SqliteError::Query(msg) => Self::Backend(msg),
            SqliteError::NotADatabase {
                path,
                found,
                expected,
            } => Self::NotADatabase {
                path,
                found,
                expected,
            },
            SqliteError::VersionTooNew { version, supported } => {
                Self::VersionTooNew { version, supported }
            }
            SqliteError::Migration { from, to, source } => Self::MigrationFailed {
                from,
                to,
                source: Box::new(source),
            },
            SqliteError::NotFound(msg) => Self::NotFound(msg),
            SqliteError::ForeignKey { table, column } => {
                Self::ForeignKeyViolation { table, column }
            }
            SqliteError::InvalidInput(msg) => Self::InvalidInput(msg),
            SqliteError::Datetime(text) => Self::DatetimeFormat(text),
            SqliteError::Rusqlite(e) => Self::Backend(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_maps_to_accessor_violation() {
        let err = SqliteError::ForeignKey {
            table: "sonde_installation".to_string(),
            column: "sonde_uuid".to_string(),
        };
        assert!(matches!(
            AccessorError::from(err),
            AccessorError::ForeignKeyViolation { .. }
        ));
    }

    #[test]
    fn version_mismatch_survives_conversion() {
        let err = SqliteError::VersionTooNew {
            version: 9,
            supported: 3,
        };
        match AccessorError::from(err) {
            AccessorError::VersionTooNew { version, supported } => {
                assert_eq!(version, 9);
                assert_eq!(supported, 3);
            }
            other => panic!("unexpected conversion: {other}"),
        }
    }
}
