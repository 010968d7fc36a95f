//! Error types for the accessor contract.

use crate::model::DataKind;
use thiserror::Error;

/// Backend-agnostic error type for accessor operations.
#[derive(Error, Debug)]
pub enum AccessorError {
    /// The database could not be reached or opened.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The file exists but does not carry the expected application
    /// signature; refusing to operate on it.
    #[error(
        "'{path}' is not a recognized database file \
         (application id {found}, expected {expected})"
    )]
    NotADatabase {
        path: String,
        found: i32,
        expected: i32,
    },

    /// The database schema is newer than this build supports.
    #[error(
        "database schema version {version} is newer than the supported \
         version {supported}; please update the application"
    )]
    VersionTooNew { version: i32, supported: i32 },

    /// A forward migration step failed; the step was rolled back.
    #[error("failed to update the database schema from version {from} to {to}: {source}")]
    MigrationFailed {
        from: i32,
        to: i32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The entity addressed by an identifier does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Deleting would strand rows that still reference the entity.
    #[error("delete violates foreign key constraint on {table}.{column}")]
    ForeignKeyViolation { table: String, column: String },

    /// The caller supplied inconsistent or unknown attributes.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend does not implement this operation for this kind.
    #[error("backend does not implement {operation}_{kind}")]
    Unimplemented {
        operation: &'static str,
        kind: DataKind,
    },

    /// A stored datetime does not match the fixed storage format.
    #[error("datetime '{0}' does not match the storage format")]
    DatetimeFormat(String),

    /// Any other backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for accessor operations.
pub type AccessorResult<T> = Result<T, AccessorError>;
