//! The tabular structures that carry timeseries readings between the
//! accessor and its callers.
//!
//! A [`ReadingsFrame`] is the readings contract: rows keyed by datetime,
//! one column per [`DataType`], plus the observation grouping id and sonde
//! provenance columns on read. Deletions and edits address individual
//! stored values by the (datetime, observation id, data type) triple.

use crate::data_types::DataType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The single fixed textual format used to store datetime values.
///
/// Reads that encounter any deviation from this pattern must fail loudly
/// rather than silently truncating precision.
pub const DATETIME_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One row of a readings frame: every value observed at one datetime for
/// one observation grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRow {
    pub datetime: NaiveDateTime,
    /// Observation grouping id; populated on read, absent on frames built
    /// by callers for insertion.
    pub obs_id: Option<i64>,
    /// One value per data type present at this datetime.
    pub values: BTreeMap<DataType, f64>,
    /// Serial number of the sonde responsible for the readings, when known.
    pub sonde_serial: Option<String>,
    /// Depth at which that sonde was installed, when known.
    pub install_depth: Option<f64>,
}

impl ReadingRow {
    fn new(datetime: NaiveDateTime, obs_id: Option<i64>) -> Self {
        Self {
            datetime,
            obs_id,
            values: BTreeMap::new(),
            sonde_serial: None,
            install_depth: None,
        }
    }
}

/// A type-normalized table of readings, ordered by datetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingsFrame {
    data_types: Vec<DataType>,
    rows: BTreeMap<(NaiveDateTime, Option<i64>), ReadingRow>,
}

impl ReadingsFrame {
    /// Create an empty frame declaring the given data-type columns.
    pub fn new(data_types: &[DataType]) -> Self {
        Self {
            data_types: data_types.to_vec(),
            rows: BTreeMap::new(),
        }
    }

    /// The data-type columns declared for this frame.
    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    /// Insert one value on a caller-built frame (no observation id yet).
    /// Values at the same datetime merge into a single row; the data-type
    /// column is added to the frame if it was not declared.
    pub fn insert(&mut self, datetime: NaiveDateTime, data_type: DataType, value: f64) {
        self.insert_keyed(datetime, None, data_type, value);
    }

    /// Insert one stored value under its observation grouping. Used by
    /// backends when reconstructing a per-well frame.
    pub fn insert_observed(
        &mut self,
        datetime: NaiveDateTime,
        obs_id: i64,
        data_type: DataType,
        value: f64,
    ) {
        self.insert_keyed(datetime, Some(obs_id), data_type, value);
    }

    fn insert_keyed(
        &mut self,
        datetime: NaiveDateTime,
        obs_id: Option<i64>,
        data_type: DataType,
        value: f64,
    ) {
        if !self.data_types.contains(&data_type) {
            self.data_types.push(data_type);
        }
        self.rows
            .entry((datetime, obs_id))
            .or_insert_with(|| ReadingRow::new(datetime, obs_id))
            .values
            .insert(data_type, value);
    }

    /// Attach sonde provenance to every row of the given observation.
    pub fn set_provenance(
        &mut self,
        obs_id: i64,
        sonde_serial: Option<&str>,
        install_depth: Option<f64>,
    ) {
        for row in self.rows.values_mut() {
            if row.obs_id == Some(obs_id) {
                row.sonde_serial = sonde_serial.map(str::to_string);
                row.install_depth = install_depth;
            }
        }
    }

    /// The distinct observation grouping ids present in the frame.
    pub fn observation_ids(&self) -> BTreeSet<i64> {
        self.rows.values().filter_map(|row| row.obs_id).collect()
    }

    /// Rows in datetime order.
    pub fn rows(&self) -> impl Iterator<Item = &ReadingRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of stored values for one data type.
    pub fn count_for(&self, data_type: DataType) -> usize {
        self.rows
            .values()
            .filter(|row| row.values.contains_key(&data_type))
            .count()
    }
}

/// Addresses one stored value: the triple that uniquely identifies it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingKey {
    pub datetime: NaiveDateTime,
    pub observation_id: i64,
    pub data_type: DataType,
}

/// A batch of stored values to remove.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDels(Vec<ReadingKey>);

impl TimeSeriesDels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ReadingKey) {
        self.0.push(key);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadingKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One value correction: the stored value at `key` becomes `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesEdit {
    pub key: ReadingKey,
    pub value: f64,
}

/// A batch of value corrections keyed by the same triple as deletions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesEdits(Vec<TimeSeriesEdit>);

impl TimeSeriesEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ReadingKey, value: f64) {
        self.0.push(TimeSeriesEdit { key, value });
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeriesEdit> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
