//! The embedded database accessor.
//!
//! Implements [`DatabaseAccessor`] against a local single-file SQLite
//! database. On connect the accessor validates the file's application id
//! and schema version, migrating older files forward and refusing newer
//! ones.

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use crate::schema;
use crate::session::SqliteSession;
use crate::stores::{self, installations, timeseries, wells};
use piezo_core::accessor::DatabaseAccessor;
use piezo_core::data_types::DataType;
use piezo_core::error::{AccessorError, AccessorResult};
use piezo_core::model::DataKind;
use piezo_core::readings::{ReadingsFrame, TimeSeriesDels, TimeSeriesEdits};
use piezo_core::value::{AttributeMap, RecordId, TableData};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Accessor for a schema-versioned single-file SQLite database.
pub struct SqliteAccessor {
    config: SqliteConfig,
    session: Option<SqliteSession>,
}

impl SqliteAccessor {
    /// Accessor for the database file at `path`, with default tuning.
    /// No connection is opened until [`DatabaseAccessor::connect`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_config(SqliteConfig::new(path))
    }

    pub fn with_config(config: SqliteConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Create and connect an in-memory database, mainly for tests and
    /// demos.
    pub fn in_memory() -> AccessorResult<Self> {
        let mut accessor = Self::with_config(SqliteConfig::memory());
        let session = SqliteSession::open(&accessor.config)?;
        schema::create_database(&session, ":memory:")?;
        accessor.session = Some(session);
        Ok(accessor)
    }

    /// Create a fresh database at the configured path: full schema at the
    /// current version plus the seeded libraries.
    pub fn init_database(&self) -> AccessorResult<()> {
        let session = SqliteSession::open(&self.config)?;
        schema::create_database(&session, &self.config.path.display().to_string())?;
        Ok(())
    }

    /// The session serializer, for batch scripts that need chained
    /// transactions across several accessor calls.
    pub fn session(&self) -> AccessorResult<&SqliteSession> {
        self.session
            .as_ref()
            .ok_or_else(|| AccessorError::Connection("no active database connection".to_string()))
    }

    fn with_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> SqliteResult<T>,
    ) -> AccessorResult<T> {
        Ok(self.session()?.with_transaction(f)?)
    }
}

/// The static table spec of a simple kind; kinds without one are not
/// served by the generic helpers.
fn table_spec(
    kind: DataKind,
    operation: &'static str,
) -> AccessorResult<&'static stores::TableSpec> {
    stores::spec_for(kind).ok_or(AccessorError::Unimplemented { operation, kind })
}

fn random_ids(n: usize) -> Vec<RecordId> {
    (0..n).map(|_| RecordId::Uuid(Uuid::new_v4())).collect()
}

impl DatabaseAccessor for SqliteAccessor {
    fn connect(&mut self) -> AccessorResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        if !self.config.is_memory() && !self.config.path.exists() {
            return Err(AccessorError::Connection(format!(
                "'{}' does not exist",
                self.config.path.display()
            )));
        }

        let session = SqliteSession::open(&self.config)?;
        let (app_id, version) = session.with_transaction(|conn| schema::signature(conn))?;

        if app_id != schema::APPLICATION_ID {
            return Err(SqliteError::NotADatabase {
                path: self.config.path.display().to_string(),
                found: app_id,
                expected: schema::APPLICATION_ID,
            }
            .into());
        }
        if version > schema::SCHEMA_VERSION {
            return Err(SqliteError::VersionTooNew {
                version,
                supported: schema::SCHEMA_VERSION,
            }
            .into());
        }
        if version < schema::SCHEMA_VERSION {
            schema::upgrade_database(&session, version)?;
        }

        info!(path = %self.config.path.display(), version = schema::SCHEMA_VERSION, "connected");
        self.session = Some(session);
        Ok(())
    }

    fn close_connection(&mut self) -> AccessorResult<()> {
        self.session = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn version(&self) -> AccessorResult<i32> {
        self.with_transaction(|conn| Ok(schema::signature(conn)?.1))
    }

    fn required_version(&self) -> i32 {
        schema::SCHEMA_VERSION
    }

    fn get(&self, kind: DataKind) -> AccessorResult<TableData> {
        match kind {
            DataKind::ObservationWells => self.with_transaction(wells::get),
            DataKind::SondeInstallations => self.with_transaction(installations::get),
            DataKind::SondeModels => self.with_transaction(stores::get_sonde_models),
            DataKind::DataOverview => self.with_transaction(timeseries::get_overview),
            other => {
                let spec = table_spec(other, "get")?;
                self.with_transaction(|conn| stores::get_table(conn, spec))
            }
        }
    }

    fn set(&self, kind: DataKind, id: RecordId, values: AttributeMap) -> AccessorResult<()> {
        if kind == DataKind::DataOverview {
            return Err(AccessorError::Unimplemented {
                operation: "set",
                kind,
            });
        }
        match kind {
            DataKind::ObservationWells => {
                self.with_transaction(|conn| wells::set(conn, &id, &values))
            }
            DataKind::SondeInstallations => {
                self.with_transaction(|conn| installations::set(conn, &id, &values))
            }
            other => {
                let spec = table_spec(other, "set")?;
                self.with_transaction(|conn| stores::set_in_table(conn, spec, &id, &values))
            }
        }
    }

    fn add(
        &self,
        kind: DataKind,
        values: Vec<AttributeMap>,
        ids: Option<Vec<RecordId>>,
    ) -> AccessorResult<Vec<RecordId>> {
        if kind == DataKind::DataOverview {
            return Err(AccessorError::Unimplemented {
                operation: "add",
                kind,
            });
        }
        if let Some(ids) = &ids {
            if ids.len() != values.len() {
                return Err(AccessorError::InvalidInput(format!(
                    "got {} identifiers for {} value sets",
                    ids.len(),
                    values.len()
                )));
            }
        }

        match kind {
            DataKind::ObservationWells => self.with_transaction(|conn| {
                let ids = ids.unwrap_or_else(|| random_ids(values.len()));
                wells::add(conn, &values, &ids)?;
                Ok(ids)
            }),
            DataKind::SondeInstallations => self.with_transaction(|conn| {
                let ids = ids.unwrap_or_else(|| random_ids(values.len()));
                installations::add(conn, &values, &ids)?;
                Ok(ids)
            }),
            other => {
                let spec = table_spec(other, "add")?;
                self.with_transaction(|conn| {
                    let ids = match ids {
                        Some(ids) => ids,
                        None => spec.generate_ids(conn, values.len())?,
                    };
                    stores::add_to_table(conn, spec, &values, &ids)?;
                    Ok(ids)
                })
            }
        }
    }

    fn delete(&self, kind: DataKind, ids: &[RecordId]) -> AccessorResult<()> {
        if kind == DataKind::DataOverview {
            return Err(AccessorError::Unimplemented {
                operation: "delete",
                kind,
            });
        }
        match kind {
            DataKind::ObservationWells => {
                self.with_transaction(|conn| wells::delete(conn, ids))
            }
            DataKind::SondeInstallations => {
                self.with_transaction(|conn| installations::delete(conn, ids))
            }
            other => {
                let spec = table_spec(other, "delete")?;
                self.with_transaction(|conn| stores::delete_from_table(conn, spec, ids))
            }
        }
    }

    fn get_timeseries_for_obs_well(
        &self,
        well_uuid: Uuid,
        data_types: Option<&[DataType]>,
    ) -> AccessorResult<ReadingsFrame> {
        self.with_transaction(|conn| timeseries::get_for_well(conn, well_uuid, data_types))
    }

    fn add_timeseries_data(
        &self,
        frame: &ReadingsFrame,
        well_uuid: Uuid,
        install_uuid: Option<Uuid>,
    ) -> AccessorResult<()> {
        self.with_transaction(|conn| timeseries::add(conn, frame, well_uuid, install_uuid))
    }

    fn delete_timeseries_data(&self, dels: &TimeSeriesDels) -> AccessorResult<()> {
        self.with_transaction(|conn| timeseries::delete(conn, dels))
    }

    fn save_timeseries_data_edits(&self, edits: &TimeSeriesEdits) -> AccessorResult<()> {
        self.with_transaction(|conn| timeseries::save_edits(conn, edits))
    }
}
