//! The transactional accessor contract every persistence backend
//! implements.
//!
//! All mutating operations run inside one backend transaction and commit
//! on success; backends serialize concurrent callers so that at most one
//! logical operation is in flight at a time. Batch operations are
//! all-or-nothing unless the backend exposes explicit deferred-commit
//! chaining.

use crate::data_types::DataType;
use crate::error::{AccessorError, AccessorResult};
use crate::model::DataKind;
use crate::readings::{ReadingsFrame, TimeSeriesDels, TimeSeriesEdits};
use crate::value::{AttributeMap, RecordId, TableData};
use uuid::Uuid;

/// Generic CRUD dispatch plus the specialized timeseries operations.
///
/// Backends implement the entity kinds they support; an unsupported
/// kind/operation pair must fail with [`AccessorError::Unimplemented`]
/// rather than silently no-oping.
pub trait DatabaseAccessor: Send {
    // ---- Connection lifecycle

    /// Open (and validate) the connection to the database.
    fn connect(&mut self) -> AccessorResult<()>;

    /// Close the currently active connection.
    fn close_connection(&mut self) -> AccessorResult<()>;

    /// Whether a connection is currently active.
    fn is_connected(&self) -> bool;

    /// The schema version of the connected database.
    fn version(&self) -> AccessorResult<i32>;

    /// The schema version this backend requires.
    fn required_version(&self) -> i32;

    // ---- Generic entity dispatch

    /// Return all entities of `kind`, ordered and keyed by identifier.
    fn get(&self, kind: DataKind) -> AccessorResult<TableData>;

    /// Apply a partial attribute update to the entity identified by `id`.
    /// Attributes absent from `values` are left untouched; a missing `id`
    /// fails with [`AccessorError::NotFound`].
    fn set(&self, kind: DataKind, id: RecordId, values: AttributeMap) -> AccessorResult<()>;

    /// Create new entities and return their identifiers, in input order.
    /// When `ids` is given it must match `values` in length; identifiers
    /// are generated otherwise.
    fn add(
        &self,
        kind: DataKind,
        values: Vec<AttributeMap>,
        ids: Option<Vec<RecordId>>,
    ) -> AccessorResult<Vec<RecordId>>;

    /// Remove the entities with the given identifiers. Deleting an
    /// identifier that does not exist is not an error.
    fn delete(&self, kind: DataKind, ids: &[RecordId]) -> AccessorResult<()>;

    /// Single-entity convenience over [`DatabaseAccessor::add`]: one
    /// attribute map in, one identifier out.
    fn add_one(&self, kind: DataKind, values: AttributeMap) -> AccessorResult<RecordId> {
        self.add(kind, vec![values], None)?
            .into_iter()
            .next()
            .ok_or_else(|| AccessorError::Backend("add returned no identifier".to_string()))
    }

    /// Create blank entities at the given identifiers.
    fn add_blank(&self, kind: DataKind, ids: Vec<RecordId>) -> AccessorResult<Vec<RecordId>> {
        let values = vec![AttributeMap::new(); ids.len()];
        self.add(kind, values, Some(ids))
    }

    /// Single-entity convenience over [`DatabaseAccessor::delete`].
    fn delete_one(&self, kind: DataKind, id: RecordId) -> AccessorResult<()> {
        self.delete(kind, &[id])
    }

    // ---- Timeseries

    /// Return all readings stored for the given well, restricted to
    /// `data_types` when given, as a frame ordered by datetime with the
    /// observation id and sonde provenance attached per row.
    fn get_timeseries_for_obs_well(
        &self,
        well_uuid: Uuid,
        data_types: Option<&[DataType]>,
    ) -> AccessorResult<ReadingsFrame>;

    /// Merge a batch of readings into the store for the given well and,
    /// optionally, sonde installation. Existing observation groupings for
    /// the same well/datetime/installation are reused; values whose
    /// (datetime, observation, data type) key is already occupied are
    /// skipped, never overwritten.
    fn add_timeseries_data(
        &self,
        frame: &ReadingsFrame,
        well_uuid: Uuid,
        install_uuid: Option<Uuid>,
    ) -> AccessorResult<()>;

    /// Remove exactly the stored values addressed by `dels`, removing any
    /// observation grouping left without values.
    fn delete_timeseries_data(&self, dels: &TimeSeriesDels) -> AccessorResult<()>;

    /// Overwrite stored values in place. Contrasting with add, this path
    /// replaces occupied keys; a key with no stored value is created.
    fn save_timeseries_data_edits(&self, edits: &TimeSeriesEdits) -> AccessorResult<()>;
}
