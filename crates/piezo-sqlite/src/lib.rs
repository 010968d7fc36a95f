//! Embedded SQLite backend for the piezo groundwater-monitoring data
//! layer.
//!
//! Implements the [`piezo_core::DatabaseAccessor`] contract against a
//! local, application-signature-tagged, schema-versioned database file.
//!
//! ## Features
//!
//! - **Versioned schema**: `PRAGMA application_id`/`user_version` based
//!   validation with ordered, idempotent forward migrations (see
//!   [`schema`]).
//! - **Transaction serializer**: one connection behind a mutex; every
//!   operation runs in an exclusive transaction, with optional chaining
//!   for batch scripts (see [`session`]).
//! - **Timeseries merge engine**: bulk add with skip-on-duplicate,
//!   keyed delete with observation garbage collection, overwrite edits
//!   (see [`stores::timeseries`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use piezo_core::DatabaseAccessor;
//! use piezo_sqlite::SqliteAccessor;
//!
//! # fn main() -> Result<(), piezo_core::AccessorError> {
//! let mut accessor = SqliteAccessor::new("./monitoring.db");
//! accessor.init_database()?;
//! accessor.connect()?;
//! let wells = accessor.get(piezo_core::DataKind::ObservationWells)?;
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod config;
pub mod error;
pub mod schema;
pub mod session;
pub mod stores;

pub use accessor::SqliteAccessor;
pub use config::SqliteConfig;
pub use error::{SqliteError, SqliteResult};
pub use session::SqliteSession;
