//! Observation well storage.
//!
//! A well spans three tables: `well` (identity and notes), `location`
//! (coordinates and municipality) and `well_metadata` (aquifer context and
//! station flags). The store routes each external attribute to the right
//! table and joins the three back together on read.

use crate::error::{SqliteError, SqliteResult};
use crate::stores::{attr_to_sql, sql_to_attr, ColumnKind};
use piezo_core::value::{AttributeMap, RecordId, TableData, TableRow};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Tables whose rows must not reference a well for it to be deletable.
const DELETE_GUARDS: &[(&str, &str)] = &[
    ("observation", "well_uuid"),
    ("process", "well_uuid"),
    ("repere", "well_uuid"),
    ("manual_measurement", "well_uuid"),
    ("hg_surveys", "well_uuid"),
];

const METADATA_ATTRS: &[(&str, ColumnKind)] = &[
    ("common_name", ColumnKind::Text),
    ("aquifer_type", ColumnKind::Text),
    ("confinement", ColumnKind::Text),
    ("aquifer_code", ColumnKind::Int),
    ("in_recharge_zone", ColumnKind::Int),
    ("is_influenced", ColumnKind::Int),
    ("is_station_active", ColumnKind::Bool),
];

const LOCATION_ATTRS: &[(&str, ColumnKind)] = &[
    ("latitude", ColumnKind::Float),
    ("longitude", ColumnKind::Float),
    ("elevation", ColumnKind::Float),
    ("municipality", ColumnKind::Text),
];

pub fn get(conn: &Connection) -> SqliteResult<TableData> {
    let mut stmt = conn.prepare(
        "SELECT w.well_uuid, w.obs_well_id, w.obs_well_notes, \
                l.latitude, l.longitude, l.elevation, l.municipality, \
                m.common_name, m.aquifer_type, m.confinement, m.aquifer_code, \
                m.in_recharge_zone, m.is_influenced, m.is_station_active \
         FROM well w \
         JOIN location l ON l.loc_id = w.loc_id \
         JOIN well_metadata m ON m.well_uuid = w.well_uuid \
         ORDER BY w.obs_well_id",
    )?;
    let raw_rows: Vec<Vec<Value>> = stmt
        .query_map([], |row| {
            (0..14).map(|i| row.get::<_, Value>(i)).collect()
        })?
        .collect::<Result<_, _>>()?;

    let attrs: &[(&str, ColumnKind)] = &[
        ("obs_well_id", ColumnKind::Text),
        ("obs_well_notes", ColumnKind::Text),
        ("latitude", ColumnKind::Float),
        ("longitude", ColumnKind::Float),
        ("elevation", ColumnKind::Float),
        ("municipality", ColumnKind::Text),
        ("common_name", ColumnKind::Text),
        ("aquifer_type", ColumnKind::Text),
        ("confinement", ColumnKind::Text),
        ("aquifer_code", ColumnKind::Int),
        ("in_recharge_zone", ColumnKind::Int),
        ("is_influenced", ColumnKind::Int),
        ("is_station_active", ColumnKind::Bool),
    ];

    let mut table = TableData::new();
    for raw in raw_rows {
        let mut iter = raw.into_iter();
        let id = super::sql_to_key(
            iter.next().expect("well_uuid column present"),
            piezo_core::model::KeyType::Uuid,
        )?;
        let mut values = AttributeMap::new();
        for ((attr, kind), value) in attrs.iter().zip(iter) {
            values.insert((*attr).to_string(), sql_to_attr(value, *kind)?);
        }
        table.push(TableRow::new(id, values));
    }
    Ok(table)
}

pub fn add(
    conn: &Connection,
    values: &[AttributeMap],
    ids: &[RecordId],
) -> SqliteResult<()> {
    for (id, row_values) in ids.iter().zip(values) {
        let well_uuid = expect_uuid(id)?;
        conn.execute("INSERT INTO location DEFAULT VALUES", [])?;
        let loc_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO well (well_uuid, loc_id) VALUES (?1, ?2)",
            params![well_uuid.to_string(), loc_id],
        )?;
        conn.execute(
            "INSERT INTO well_metadata (well_uuid) VALUES (?1)",
            [well_uuid.to_string()],
        )?;
        set(conn, id, row_values)?;
    }
    Ok(())
}

/// Partial update, routing each attribute to its owning table.
pub fn set(conn: &Connection, id: &RecordId, values: &AttributeMap) -> SqliteResult<()> {
    let well_uuid = expect_uuid(id)?;
    let loc_id: Option<i64> = conn
        .query_row(
            "SELECT loc_id FROM well WHERE well_uuid = ?1",
            [well_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(loc_id) = loc_id else {
        return Err(SqliteError::NotFound(format!(
            "no observation well with id {well_uuid}"
        )));
    };

    for (attr, value) in values {
        let sql_value = attr_to_sql(value);
        match attr.as_str() {
            "obs_well_id" | "obs_well_notes" => {
                conn.execute(
                    &format!("UPDATE well SET {attr} = ?1 WHERE well_uuid = ?2"),
                    params![sql_value, well_uuid.to_string()],
                )?;
            }
            _ if LOCATION_ATTRS.iter().any(|(name, _)| name == attr) => {
                conn.execute(
                    &format!("UPDATE location SET {attr} = ?1 WHERE loc_id = ?2"),
                    params![sql_value, loc_id],
                )?;
            }
            _ if METADATA_ATTRS.iter().any(|(name, _)| name == attr) => {
                conn.execute(
                    &format!("UPDATE well_metadata SET {attr} = ?1 WHERE well_uuid = ?2"),
                    params![sql_value, well_uuid.to_string()],
                )?;
            }
            other => {
                return Err(SqliteError::InvalidInput(format!(
                    "unknown attribute '{other}' for observation wells"
                )));
            }
        }
    }
    Ok(())
}

/// Delete wells and their orphaned location rows. Wells still referenced
/// by observations, processes, reperes, measurements or surveys make the
/// whole batch fail.
pub fn delete(conn: &Connection, ids: &[RecordId]) -> SqliteResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let uuids: Vec<String> = ids
        .iter()
        .map(|id| expect_uuid(id).map(|u| u.to_string()))
        .collect::<SqliteResult<_>>()?;
    let marks = super::placeholders(uuids.len());

    for (table, column) in DELETE_GUARDS {
        let referenced: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} IN ({marks})"),
            rusqlite::params_from_iter(uuids.iter()),
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(SqliteError::ForeignKey {
                table: (*table).to_string(),
                column: (*column).to_string(),
            });
        }
    }

    let loc_ids: Vec<i64> = {
        let mut stmt = conn.prepare(&format!(
            "SELECT loc_id FROM well WHERE well_uuid IN ({marks})"
        ))?;
        let mapped = stmt.query_map(rusqlite::params_from_iter(uuids.iter()), |row| row.get(0))?;
        mapped.collect::<Result<_, _>>()?
    };

    for table in ["data_overview", "well_metadata", "well"] {
        conn.execute(
            &format!("DELETE FROM {table} WHERE well_uuid IN ({marks})"),
            rusqlite::params_from_iter(uuids.iter()),
        )?;
    }
    if !loc_ids.is_empty() {
        conn.execute(
            &format!(
                "DELETE FROM location WHERE loc_id IN ({})",
                super::placeholders(loc_ids.len())
            ),
            rusqlite::params_from_iter(loc_ids.iter()),
        )?;
    }
    Ok(())
}

pub(crate) fn expect_uuid(id: &RecordId) -> SqliteResult<Uuid> {
    id.as_uuid().ok_or_else(|| {
        SqliteError::InvalidInput(format!("expected a uuid identifier, got {id}"))
    })
}
