//! Sonde installation storage.
//!
//! Each installation owns a hidden `process` row; observations reference
//! the process, which is how readings are traced back to the sonde that
//! produced them. The store creates and removes the process together with
//! the installation and exposes the process's well uuid as the external
//! `well_uuid` attribute.

use crate::error::{SqliteError, SqliteResult};
use crate::stores::wells::expect_uuid;
use crate::stores::{attr_to_sql, sql_to_attr, ColumnKind};
use piezo_core::value::{AttributeMap, RecordId, TableData, TableRow};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

const INSTALL_ATTRS: &[(&str, ColumnKind)] = &[
    ("sonde_uuid", ColumnKind::Uuid),
    ("start_date", ColumnKind::DateTime),
    ("end_date", ColumnKind::DateTime),
    ("install_depth", ColumnKind::Float),
    ("operator", ColumnKind::Text),
];

pub fn get(conn: &Connection) -> SqliteResult<TableData> {
    let mut stmt = conn.prepare(
        "SELECT si.install_uuid, si.sonde_uuid, si.start_date, si.end_date, \
                si.install_depth, si.operator, si.install_note, p.well_uuid \
         FROM sonde_installation si \
         LEFT JOIN process p ON p.process_id = si.process_id \
         ORDER BY si.rowid",
    )?;
    let raw_rows: Vec<Vec<Value>> = stmt
        .query_map([], |row| (0..8).map(|i| row.get::<_, Value>(i)).collect())?
        .collect::<Result<_, _>>()?;

    let attrs: &[(&str, ColumnKind)] = &[
        ("sonde_uuid", ColumnKind::Uuid),
        ("start_date", ColumnKind::DateTime),
        ("end_date", ColumnKind::DateTime),
        ("install_depth", ColumnKind::Float),
        ("operator", ColumnKind::Text),
        ("notes", ColumnKind::Text),
        ("well_uuid", ColumnKind::Uuid),
    ];

    let mut table = TableData::new();
    for raw in raw_rows {
        let mut iter = raw.into_iter();
        let id = super::sql_to_key(
            iter.next().expect("install_uuid column present"),
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
        let install_uuid = expect_uuid(id)?;
        conn.execute(
            "INSERT INTO process (process_type) VALUES ('sonde installation')",
            [],
        )?;
        let process_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO sonde_installation (install_uuid, process_id) VALUES (?1, ?2)",
            params![install_uuid.to_string(), process_id],
        )?;
        set(conn, id, row_values)?;
    }
    Ok(())
}

/// Partial update; `well_uuid` routes to the owning process row.
pub fn set(conn: &Connection, id: &RecordId, values: &AttributeMap) -> SqliteResult<()> {
    let install_uuid = expect_uuid(id)?;
    let process_id: Option<i64> = conn
        .query_row(
            "SELECT process_id FROM sonde_installation WHERE install_uuid = ?1",
            [install_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(process_id) = process_id else {
        return Err(SqliteError::NotFound(format!(
            "no sonde installation with id {install_uuid}"
        )));
    };

    for (attr, value) in values {
        let sql_value = attr_to_sql(value);
        match attr.as_str() {
            "well_uuid" => {
                conn.execute(
                    "UPDATE process SET well_uuid = ?1 WHERE process_id = ?2",
                    params![sql_value, process_id],
                )?;
            }
            "notes" => {
                conn.execute(
                    "UPDATE sonde_installation SET install_note = ?1 WHERE install_uuid = ?2",
                    params![sql_value, install_uuid.to_string()],
                )?;
            }
            _ if INSTALL_ATTRS.iter().any(|(name, _)| name == attr) => {
                conn.execute(
                    &format!(
                        "UPDATE sonde_installation SET {attr} = ?1 WHERE install_uuid = ?2"
                    ),
                    params![sql_value, install_uuid.to_string()],
                )?;
            }
            other => {
                return Err(SqliteError::InvalidInput(format!(
                    "unknown attribute '{other}' for sonde installations"
                )));
            }
        }
    }
    Ok(())
}

/// Remove installations and their processes; observations that referenced
/// a removed process lose the provenance link but keep their readings.
pub fn delete(conn: &Connection, ids: &[RecordId]) -> SqliteResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let uuids: Vec<String> = ids
        .iter()
        .map(|id| expect_uuid(id).map(|u| u.to_string()))
        .collect::<SqliteResult<_>>()?;
    let marks = super::placeholders(uuids.len());

    let process_ids: Vec<i64> = {
        let mut stmt = conn.prepare(&format!(
            "SELECT process_id FROM sonde_installation \
             WHERE install_uuid IN ({marks}) AND process_id IS NOT NULL"
        ))?;
        let mapped = stmt.query_map(rusqlite::params_from_iter(uuids.iter()), |row| row.get(0))?;
        mapped.collect::<Result<_, _>>()?
    };

    conn.execute(
        &format!("DELETE FROM sonde_installation WHERE install_uuid IN ({marks})"),
        rusqlite::params_from_iter(uuids.iter()),
    )?;

    if !process_ids.is_empty() {
        let process_marks = super::placeholders(process_ids.len());
        conn.execute(
            &format!(
                "UPDATE observation SET process_id = NULL \
                 WHERE process_id IN ({process_marks})"
            ),
            rusqlite::params_from_iter(process_ids.iter()),
        )?;
        conn.execute(
            &format!("DELETE FROM process WHERE process_id IN ({process_marks})"),
            rusqlite::params_from_iter(process_ids.iter()),
        )?;
    }
    Ok(())
}
