//! Per-entity storage, translating the external attribute vocabulary to
//! the storage schema.
//!
//! Simple entities go through generic helpers driven by a static
//! per-table column spec. Composite entities (observation wells spanning
//! three tables, sonde installations owning a hidden process row) and the
//! timeseries engine get hand-written stores in the submodules.

pub mod installations;
pub mod timeseries;
pub mod wells;

use crate::error::{SqliteError, SqliteResult};
use chrono::NaiveDateTime;
use piezo_core::model::{DataKind, KeyType};
use piezo_core::readings::DATETIME_STORAGE_FORMAT;
use piezo_core::value::{AttrValue, AttributeMap, RecordId, TableData, TableRow};
use rusqlite::types::Value;
use rusqlite::Connection;
use uuid::Uuid;

/// Storage type of one column, driving the attribute conversion on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    DateTime,
    Uuid,
}

/// One attribute of the external vocabulary mapped to a storage column.
pub struct Column {
    pub attr: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

/// Static description of a simple, single-table entity kind.
pub struct TableSpec {
    pub table: &'static str,
    pub key_column: &'static str,
    pub key: KeyType,
    pub columns: &'static [Column],
    /// Tables that must not reference a row for it to be deletable,
    /// checked explicitly so the failure names the constraint.
    pub delete_guards: &'static [(&'static str, &'static str)],
}

macro_rules! columns {
    ($(($attr:literal, $column:literal, $kind:ident)),* $(,)?) => {
        &[$(Column { attr: $attr, column: $column, kind: ColumnKind::$kind }),*]
    };
}

const REPERE: TableSpec = TableSpec {
    table: "repere",
    key_column: "repere_uuid",
    key: KeyType::Uuid,
    columns: columns![
        ("well_uuid", "well_uuid", Uuid),
        ("top_casing_alt", "top_casing_alt", Float),
        ("casing_length", "casing_length", Float),
        ("start_date", "start_date", DateTime),
        ("end_date", "end_date", DateTime),
        ("is_alt_geodesic", "is_alt_geodesic", Bool),
        ("notes", "repere_note", Text),
    ],
    delete_guards: &[],
};

const SONDE_MODELS: TableSpec = TableSpec {
    table: "sonde_model",
    key_column: "sonde_model_id",
    key: KeyType::Int,
    columns: columns![
        ("sonde_brand", "sonde_brand", Text),
        ("sonde_model", "sonde_model", Text),
    ],
    delete_guards: &[("sonde", "sonde_model_id")],
};

const SONDES: TableSpec = TableSpec {
    table: "sonde",
    key_column: "sonde_uuid",
    key: KeyType::Uuid,
    columns: columns![
        ("sonde_serial_no", "sonde_serial_no", Text),
        ("sonde_model_id", "sonde_model_id", Int),
        ("date_reception", "date_reception", DateTime),
        ("date_withdrawal", "date_withdrawal", DateTime),
        ("in_repair", "in_repair", Bool),
        ("out_of_order", "out_of_order", Bool),
        ("lost", "lost", Bool),
        ("off_network", "off_network", Bool),
        ("sonde_notes", "sonde_notes", Text),
    ],
    delete_guards: &[("sonde_installation", "sonde_uuid")],
};

const MANUAL_MEASUREMENTS: TableSpec = TableSpec {
    table: "manual_measurement",
    key_column: "measurement_uuid",
    key: KeyType::Uuid,
    columns: columns![
        ("well_uuid", "well_uuid", Uuid),
        ("datetime", "datetime", DateTime),
        ("value", "value", Float),
        ("notes", "notes", Text),
    ],
    delete_guards: &[],
};

const MEASUREMENT_UNITS: TableSpec = TableSpec {
    table: "measurement_units",
    key_column: "meas_units_id",
    key: KeyType::Int,
    columns: columns![
        ("meas_units_abb", "meas_units_abb", Text),
        ("meas_units_name", "meas_units_name", Text),
        ("meas_units_desc", "meas_units_desc", Text),
    ],
    delete_guards: &[("hg_param_values", "meas_units_id")],
};

const HG_PARAMS: TableSpec = TableSpec {
    table: "hg_params",
    key_column: "hg_param_id",
    key: KeyType::Int,
    columns: columns![
        ("hg_param_code", "hg_param_code", Text),
        ("hg_param_name", "hg_param_name", Text),
        ("cas_registry_number", "cas_registry_number", Text),
    ],
    delete_guards: &[("hg_param_values", "hg_param_id")],
};

const HG_SURVEYS: TableSpec = TableSpec {
    table: "hg_surveys",
    key_column: "hg_survey_id",
    key: KeyType::Int,
    columns: columns![
        ("well_uuid", "well_uuid", Uuid),
        ("hg_survey_datetime", "hg_survey_datetime", DateTime),
        ("hg_survey_depth", "hg_survey_depth", Float),
        ("hg_survey_operator", "hg_survey_operator", Text),
        ("sample_filtered", "sample_filtered", Bool),
        ("survey_note", "survey_note", Text),
    ],
    delete_guards: &[("hg_param_values", "hg_survey_id")],
};

const HG_PARAM_VALUES: TableSpec = TableSpec {
    table: "hg_param_values",
    key_column: "hg_param_value_id",
    key: KeyType::Int,
    columns: columns![
        ("hg_survey_id", "hg_survey_id", Int),
        ("hg_param_id", "hg_param_id", Int),
        ("hg_param_value", "hg_param_value", Text),
        ("lim_detection", "lim_detection", Float),
        ("meas_units_id", "meas_units_id", Int),
        ("lab_sample_id", "lab_sample_id", Text),
        ("lab_report_date", "lab_report_date", DateTime),
        ("method", "method", Text),
        ("notes", "notes", Text),
    ],
    delete_guards: &[],
};

/// The spec for a simple entity kind; composite kinds return `None` and
/// are handled by their dedicated stores.
pub fn spec_for(kind: DataKind) -> Option<&'static TableSpec> {
    match kind {
        DataKind::RepereData => Some(&REPERE),
        DataKind::SondeModels => Some(&SONDE_MODELS),
        DataKind::SondesData => Some(&SONDES),
        DataKind::ManualMeasurements => Some(&MANUAL_MEASUREMENTS),
        DataKind::MeasurementUnits => Some(&MEASUREMENT_UNITS),
        DataKind::HgParams => Some(&HG_PARAMS),
        DataKind::HgSurveys => Some(&HG_SURVEYS),
        DataKind::ObservationWells
        | DataKind::SondeInstallations
        | DataKind::DataOverview => None,
        DataKind::HgParamValues => Some(&HG_PARAM_VALUES),
    }
}

// ---- Datetime and value conversions

pub(crate) fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format(DATETIME_STORAGE_FORMAT).to_string()
}

/// Strict parse of a stored datetime; any deviation fails loudly instead
/// of truncating precision.
pub(crate) fn parse_datetime(text: &str) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_STORAGE_FORMAT)
        .map_err(|_| SqliteError::Datetime(text.to_string()))
}

pub(crate) fn parse_uuid(text: &str) -> SqliteResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| SqliteError::Query(format!("stored identifier '{text}' is not a uuid")))
}

/// Convert an attribute value to its storage representation.
pub(crate) fn attr_to_sql(value: &AttrValue) -> Value {
    match value {
        AttrValue::Null => Value::Null,
        AttrValue::Bool(b) => Value::Integer(i64::from(*b)),
        AttrValue::Int(i) => Value::Integer(*i),
        AttrValue::Float(f) => Value::Real(*f),
        AttrValue::Text(t) => Value::Text(t.clone()),
        AttrValue::DateTime(dt) => Value::Text(format_datetime(*dt)),
        AttrValue::Uuid(u) => Value::Text(u.to_string()),
    }
}

/// Interpret a storage value according to the column's declared kind.
pub(crate) fn sql_to_attr(value: Value, kind: ColumnKind) -> SqliteResult<AttrValue> {
    match (kind, value) {
        (_, Value::Null) => Ok(AttrValue::Null),
        (ColumnKind::Int, Value::Integer(i)) => Ok(AttrValue::Int(i)),
        (ColumnKind::Bool, Value::Integer(i)) => Ok(AttrValue::Bool(i != 0)),
        (ColumnKind::Float, Value::Real(f)) => Ok(AttrValue::Float(f)),
        (ColumnKind::Float, Value::Integer(i)) => Ok(AttrValue::Float(i as f64)),
        (ColumnKind::Text, Value::Text(t)) => Ok(AttrValue::Text(t)),
        (ColumnKind::DateTime, Value::Text(t)) => {
            Ok(AttrValue::DateTime(parse_datetime(&t)?))
        }
        (ColumnKind::Uuid, Value::Text(t)) => Ok(AttrValue::Uuid(parse_uuid(&t)?)),
        (kind, other) => Err(SqliteError::Query(format!(
            "unexpected storage type {other:?} for a {kind:?} column"
        ))),
    }
}

pub(crate) fn key_to_sql(id: &RecordId) -> Value {
    match id {
        RecordId::Uuid(u) => Value::Text(u.to_string()),
        RecordId::Int(i) => Value::Integer(*i),
    }
}

pub(crate) fn sql_to_key(value: Value, key: KeyType) -> SqliteResult<RecordId> {
    match (key, value) {
        (KeyType::Uuid, Value::Text(t)) => Ok(RecordId::Uuid(parse_uuid(&t)?)),
        (KeyType::Int, Value::Integer(i)) => Ok(RecordId::Int(i)),
        (key, other) => Err(SqliteError::Query(format!(
            "unexpected storage type {other:?} for a {key:?} key"
        ))),
    }
}

fn placeholders(n: usize) -> String {
    let mut text = String::new();
    for i in 0..n {
        if i > 0 {
            text.push_str(", ");
        }
        text.push('?');
    }
    text
}

// ---- Generic CRUD over a TableSpec

impl TableSpec {
    fn column(&self, attr: &str) -> SqliteResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.attr == attr)
            .ok_or_else(|| {
                SqliteError::InvalidInput(format!(
                    "unknown attribute '{attr}' for table '{}'",
                    self.table
                ))
            })
    }

    fn exists(&self, conn: &Connection, id: &RecordId) -> SqliteResult<bool> {
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                self.table, self.key_column
            ),
            [key_to_sql(id)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Generate fresh identifiers: random uuids, or max+1 integers local
    /// to this table.
    pub fn generate_ids(&self, conn: &Connection, n: usize) -> SqliteResult<Vec<RecordId>> {
        match self.key {
            KeyType::Uuid => Ok((0..n).map(|_| RecordId::Uuid(Uuid::new_v4())).collect()),
            KeyType::Int => {
                let max: i64 = conn.query_row(
                    &format!(
                        "SELECT COALESCE(MAX({}), 0) FROM {}",
                        self.key_column, self.table
                    ),
                    [],
                    |row| row.get(0),
                )?;
                Ok((1..=n as i64).map(|i| RecordId::Int(max + i)).collect())
            }
        }
    }
}

/// Read a full table, ordered by insertion.
pub fn get_table(conn: &Connection, spec: &TableSpec) -> SqliteResult<TableData> {
    let column_list: Vec<&str> = spec.columns.iter().map(|c| c.column).collect();
    let sql = format!(
        "SELECT {}, {} FROM {} ORDER BY rowid",
        spec.key_column,
        column_list.join(", "),
        spec.table
    );

    let mut stmt = conn.prepare(&sql)?;
    let raw_rows: Vec<Vec<Value>> = stmt
        .query_map([], |row| {
            let mut raw = Vec::with_capacity(spec.columns.len() + 1);
            for i in 0..=spec.columns.len() {
                raw.push(row.get::<_, Value>(i)?);
            }
            Ok(raw)
        })?
        .collect::<Result<_, _>>()?;

    let mut table = TableData::new();
    for mut raw in raw_rows {
        let mut values = AttributeMap::new();
        for column in spec.columns.iter().rev() {
            let value = raw.pop().expect("raw row matches column count");
            values.insert(column.attr.to_string(), sql_to_attr(value, column.kind)?);
        }
        let id = sql_to_key(raw.pop().expect("key column present"), spec.key)?;
        table.push(TableRow::new(id, values));
    }
    Ok(table)
}

/// Apply a partial attribute update to one row.
pub fn set_in_table(
    conn: &Connection,
    spec: &TableSpec,
    id: &RecordId,
    values: &AttributeMap,
) -> SqliteResult<()> {
    if !spec.exists(conn, id)? {
        return Err(SqliteError::NotFound(format!(
            "no {} entry with id {id}",
            spec.table
        )));
    }
    if values.is_empty() {
        return Ok(());
    }

    let mut assignments = Vec::with_capacity(values.len());
    let mut params: Vec<Value> = Vec::with_capacity(values.len() + 1);
    for (attr, value) in values {
        let column = spec.column(attr)?;
        assignments.push(format!("{} = ?{}", column.column, params.len() + 1));
        params.push(attr_to_sql(value));
    }
    params.push(key_to_sql(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        spec.table,
        assignments.join(", "),
        spec.key_column,
        params.len()
    );
    conn.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(())
}

/// Insert new rows at the given identifiers.
pub fn add_to_table(
    conn: &Connection,
    spec: &TableSpec,
    values: &[AttributeMap],
    ids: &[RecordId],
) -> SqliteResult<()> {
    for (id, row_values) in ids.iter().zip(values) {
        let mut columns = vec![spec.key_column.to_string()];
        let mut params: Vec<Value> = vec![key_to_sql(id)];
        for (attr, value) in row_values {
            let column = spec.column(attr)?;
            columns.push(column.column.to_string());
            params.push(attr_to_sql(value));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            spec.table,
            columns.join(", "),
            placeholders(params.len())
        );
        conn.execute(&sql, rusqlite::params_from_iter(params))?;
    }
    Ok(())
}

/// Remove rows by identifier. Unknown identifiers are ignored; rows still
/// referenced by a guarded table make the whole batch fail.
pub fn delete_from_table(
    conn: &Connection,
    spec: &TableSpec,
    ids: &[RecordId],
) -> SqliteResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let params: Vec<Value> = ids.iter().map(key_to_sql).collect();

    for (guard_table, guard_column) in spec.delete_guards {
        let referenced: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} IN ({})",
                guard_table,
                guard_column,
                placeholders(params.len())
            ),
            rusqlite::params_from_iter(params.clone()),
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(SqliteError::ForeignKey {
                table: guard_table.to_string(),
                column: guard_column.to_string(),
            });
        }
    }

    conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} IN ({})",
            spec.table,
            spec.key_column,
            placeholders(params.len())
        ),
        rusqlite::params_from_iter(params),
    )?;
    Ok(())
}

/// Sonde model library read: exposes the composed `sonde_brand_model`
/// attribute alongside the stored brand and model.
pub fn get_sonde_models(conn: &Connection) -> SqliteResult<TableData> {
    let stored = get_table(conn, &SONDE_MODELS)?;
    let mut table = TableData::new();
    for row in stored.iter() {
        let mut values = row.values.clone();
        let brand = values.get("sonde_brand").and_then(AttrValue::as_str);
        let model = values.get("sonde_model").and_then(AttrValue::as_str);
        let composed = [brand, model]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        values.insert(
            "sonde_brand_model".to_string(),
            AttrValue::Text(composed.trim().to_string()),
        );
        table.push(TableRow::new(row.id, values));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn every_simple_kind_has_a_spec() {
        for kind in [
            DataKind::RepereData,
            DataKind::SondeModels,
            DataKind::SondesData,
            DataKind::ManualMeasurements,
            DataKind::MeasurementUnits,
            DataKind::HgParams,
            DataKind::HgSurveys,
            DataKind::HgParamValues,
        ] {
            let spec = spec_for(kind).expect("spec must exist");
            assert_eq!(spec.key, kind.key_type());
        }
        assert!(spec_for(DataKind::ObservationWells).is_none());
        assert!(spec_for(DataKind::SondeInstallations).is_none());
    }

    #[test]
    fn datetime_round_trips_through_storage_text() {
        let datetime = NaiveDate::from_ymd_opt(2016, 4, 1)
            .unwrap()
            .and_hms_micro_opt(7, 15, 0, 250000)
            .unwrap();
        let text = format_datetime(datetime);
        assert_eq!(parse_datetime(&text).unwrap(), datetime);
    }

    #[test]
    fn malformed_datetime_fails_loudly() {
        assert!(matches!(
            parse_datetime("2016-04-01"),
            Err(SqliteError::Datetime(_))
        ));
        assert!(matches!(
            parse_datetime("01/04/2016 07:15:00.000000"),
            Err(SqliteError::Datetime(_))
        ));
    }

    #[test]
    fn sql_conversion_respects_column_kind() {
        assert_eq!(
            sql_to_attr(Value::Integer(1), ColumnKind::Bool).unwrap(),
            AttrValue::Bool(true)
        );
        assert_eq!(
            sql_to_attr(Value::Integer(4), ColumnKind::Float).unwrap(),
            AttrValue::Float(4.0)
        );
        assert!(sql_to_attr(Value::Real(0.5), ColumnKind::Text).is_err());
        assert!(sql_to_attr(Value::Null, ColumnKind::DateTime).unwrap().is_null());
    }
}
