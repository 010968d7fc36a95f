//! Generic attribute values and tables exchanged with the accessor.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A stable identifier keying one entity in the database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum RecordId {
    /// 128-bit random identifier.
    Uuid(Uuid),
    /// Auto-incremented integer identifier.
    Int(i64),
}

impl RecordId {
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            RecordId::Uuid(value) => Some(*value),
            RecordId::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecordId::Int(value) => Some(*value),
            RecordId::Uuid(_) => None,
        }
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        RecordId::Uuid(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Uuid(value) => write!(f, "{value}"),
            RecordId::Int(value) => write!(f, "{value}"),
        }
    }
}

/// One attribute value, typed just enough to round-trip through a backend
/// without losing datetime precision or identifier semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            AttrValue::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            AttrValue::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(value) => Some(*value),
            AttrValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            AttrValue::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            AttrValue::Uuid(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<NaiveDateTime> for AttrValue {
    fn from(value: NaiveDateTime) -> Self {
        AttrValue::DateTime(value)
    }
}

impl From<Uuid> for AttrValue {
    fn from(value: Uuid) -> Self {
        AttrValue::Uuid(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttrValue::Null, Into::into)
    }
}

/// A partial or full set of attribute values for one entity, keyed by the
/// external attribute name of the conceptual model.
pub type AttributeMap = BTreeMap<String, AttrValue>;

/// One row of a [`TableData`]: the entity identifier plus its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: RecordId,
    pub values: AttributeMap,
}

impl TableRow {
    pub fn new(id: RecordId, values: AttributeMap) -> Self {
        Self { id, values }
    }

    pub fn value(&self, attr: &str) -> Option<&AttrValue> {
        self.values.get(attr).filter(|value| !value.is_null())
    }
}

/// An ordered collection of entity rows returned by the generic `get`
/// dispatch, keyed by the entity identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    rows: Vec<TableRow>,
}

impl TableData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter()
    }

    pub fn get(&self, id: &RecordId) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.id == *id)
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.rows.iter().map(|row| row.id)
    }
}
