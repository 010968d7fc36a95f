//! Monitored data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical property monitored by the sondes installed in the wells.
///
/// The set is fixed: every reading stored in a database is a numeric value
/// of exactly one of these types at one datetime for one observation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum DataType {
    /// Water level, in metres below the measuring point.
    WaterLevel,
    /// Water temperature, in degrees Celsius.
    WaterTemp,
    /// Water electrical conductivity, in µS/cm.
    WaterEC,
}

impl DataType {
    /// All data types, in display order.
    pub const ALL: [DataType; 3] = [DataType::WaterLevel, DataType::WaterTemp, DataType::WaterEC];

    /// Human readable name used in the GUI and on graphs.
    pub fn label(self) -> &'static str {
        match self {
            DataType::WaterLevel => "Water level",
            DataType::WaterTemp => "Water temperature",
            DataType::WaterEC => "Water electrical conductivity",
        }
    }

    /// Units in which values of this type are stored.
    pub fn units(self) -> &'static str {
        match self {
            DataType::WaterLevel => "m",
            DataType::WaterTemp => "\u{00b0}C",
            DataType::WaterEC => "\u{00b5}S/cm",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
