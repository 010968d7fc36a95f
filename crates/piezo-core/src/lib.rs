//! Core vocabulary for the piezo groundwater-monitoring data layer.
//!
//! This crate defines everything a persistence backend must speak,
//! independent of how the data is actually stored:
//!
//! - **DatabaseAccessor**: the transactional CRUD + timeseries contract
//!   every backend implements (see [`accessor`]).
//! - **Conceptual data model**: the fixed set of entity kinds and their
//!   external attribute vocabulary (see [`model`]).
//! - **Readings frame**: the tabular structure that carries timeseries
//!   readings between backends and callers (see [`readings`]).
//! - **Collaborator interfaces**: secret storage and the GUI-facing
//!   connection manager (see [`secrets`] and [`manager`]).
//!
//! Concrete backends live in sibling crates (`piezo-sqlite` for the
//! embedded single-file backend).

pub mod accessor;
pub mod data_types;
pub mod error;
pub mod manager;
pub mod model;
pub mod readings;
pub mod secrets;
pub mod value;

pub use accessor::DatabaseAccessor;
pub use data_types::DataType;
pub use error::{AccessorError, AccessorResult};
pub use model::{DataKind, KeyType};
pub use readings::{
    ReadingKey, ReadingRow, ReadingsFrame, TimeSeriesEdit, TimeSeriesDels, TimeSeriesEdits,
    DATETIME_STORAGE_FORMAT,
};
pub use value::{AttrValue, AttributeMap, RecordId, TableData, TableRow};
