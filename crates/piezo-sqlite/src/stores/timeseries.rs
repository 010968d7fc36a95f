//! The timeseries merge/delete/edit engine.
//!
//! Readings are stored one row per (datetime, observation, property).
//! Observation rows group the readings of one well/datetime/installation
//! context; the engine creates and garbage-collects them as values come
//! and go, and keeps the per-well data overview cache current after every
//! mutation.
//!
//! Add and edit deliberately disagree on occupied keys: add skips them
//! (bulk re-imports stay idempotent), edit overwrites them (corrections
//! must land).

use crate::error::{SqliteError, SqliteResult};
use crate::stores::{format_datetime, parse_datetime, parse_uuid};
use piezo_core::data_types::DataType;
use piezo_core::readings::{ReadingsFrame, TimeSeriesDels, TimeSeriesEdits};
use piezo_core::value::{AttrValue, AttributeMap, RecordId, TableData, TableRow};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Stored property ids of the observed-property library.
pub(crate) fn property_id(data_type: DataType) -> i64 {
    match data_type {
        DataType::WaterTemp => 1,
        DataType::WaterLevel => 2,
        DataType::WaterEC => 3,
    }
}

/// Merge a reading batch into the store for one well.
///
/// Observation rows for an already-seen (well, datetime, installation)
/// combination are reused; values whose (datetime, observation, property)
/// key is already occupied are skipped. The membership test runs against
/// the full persisted key set of the well, loaded in one query, so large
/// imports stay sub-quadratic.
pub fn add(
    conn: &Connection,
    frame: &ReadingsFrame,
    well_uuid: uuid::Uuid,
    install_uuid: Option<uuid::Uuid>,
) -> SqliteResult<()> {
    if frame.is_empty() {
        return Ok(());
    }
    require_well(conn, well_uuid)?;

    let process_id: Option<i64> = match install_uuid {
        Some(install_uuid) => Some(
            conn.query_row(
                "SELECT process_id FROM sonde_installation WHERE install_uuid = ?1",
                [install_uuid.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                SqliteError::NotFound(format!(
                    "no sonde installation with id {install_uuid}"
                ))
            })?,
        ),
        None => None,
    };

    // Existing observations for this well/installation context, keyed by
    // datetime.
    let mut observations: HashMap<String, i64> = {
        let mut stmt = conn.prepare(
            "SELECT obs_datetime, observation_id FROM observation \
             WHERE well_uuid = ?1 AND process_id IS ?2",
        )?;
        let mapped = stmt.query_map(
            params![well_uuid.to_string(), process_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        mapped.collect::<Result<_, _>>()?
    };

    // Already persisted value keys for the whole well, in one query.
    let occupied: HashSet<(String, i64, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT r.datetime, r.observation_id, r.property_id \
             FROM reading r \
             JOIN observation o ON o.observation_id = r.observation_id \
             WHERE o.well_uuid = ?1",
        )?;
        let mapped = stmt.query_map([well_uuid.to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        mapped.collect::<Result<_, _>>()?
    };

    let mut new_observation = conn.prepare(
        "INSERT INTO observation (well_uuid, process_id, obs_datetime) \
         VALUES (?1, ?2, ?3)",
    )?;
    let mut insert_reading = conn.prepare(
        "INSERT INTO reading (datetime, observation_id, property_id, value) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for row in frame.rows() {
        let datetime = format_datetime(row.datetime);
        let observation_id = match observations.get(&datetime) {
            Some(id) => *id,
            None => {
                new_observation.execute(params![
                    well_uuid.to_string(),
                    process_id,
                    datetime
                ])?;
                let id = conn.last_insert_rowid();
                observations.insert(datetime.clone(), id);
                id
            }
        };
        for (data_type, value) in &row.values {
            let key = (datetime.clone(), observation_id, property_id(*data_type));
            if occupied.contains(&key) {
                skipped += 1;
                continue;
            }
            insert_reading.execute(params![
                datetime,
                observation_id,
                property_id(*data_type),
                value
            ])?;
            inserted += 1;
        }
    }
    debug!(well = %well_uuid, inserted, skipped, "timeseries batch merged");

    refresh_overview(conn, well_uuid)?;
    Ok(())
}

/// Remove exactly the addressed values, garbage-collecting observations
/// left without any value. Keys that address nothing are ignored.
pub fn delete(conn: &Connection, dels: &TimeSeriesDels) -> SqliteResult<()> {
    let mut by_observation: BTreeMap<i64, Vec<(String, i64)>> = BTreeMap::new();
    for key in dels.iter() {
        by_observation
            .entry(key.observation_id)
            .or_default()
            .push((format_datetime(key.datetime), property_id(key.data_type)));
    }

    let mut affected_wells = BTreeSet::new();
    for (observation_id, keys) in by_observation {
        let Some(well_uuid) = observation_well(conn, observation_id)? else {
            continue;
        };
        affected_wells.insert(well_uuid);

        let mut delete_reading = conn.prepare(
            "DELETE FROM reading WHERE datetime = ?1 \
             AND observation_id = ?2 AND property_id = ?3",
        )?;
        for (datetime, property) in keys {
            delete_reading.execute(params![datetime, observation_id, property])?;
        }

        let remaining: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reading WHERE observation_id = ?1",
            [observation_id],
            |row| row.get(0),
        )?;
        if remaining == 0 {
            debug!(observation_id, "removing observation left without values");
            conn.execute(
                "DELETE FROM observation WHERE observation_id = ?1",
                [observation_id],
            )?;
        }
    }

    for well_uuid in affected_wells {
        refresh_overview(conn, well_uuid)?;
    }
    Ok(())
}

/// Overwrite values in place by their (datetime, observation, property)
/// key. A key with no stored value is created under its observation.
pub fn save_edits(conn: &Connection, edits: &TimeSeriesEdits) -> SqliteResult<()> {
    let mut update_reading = conn.prepare(
        "UPDATE reading SET value = ?4 WHERE datetime = ?1 \
         AND observation_id = ?2 AND property_id = ?3",
    )?;
    let mut insert_reading = conn.prepare(
        "INSERT INTO reading (datetime, observation_id, property_id, value) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    let mut affected_wells = BTreeSet::new();
    for edit in edits.iter() {
        let well_uuid = observation_well(conn, edit.key.observation_id)?.ok_or_else(|| {
            SqliteError::NotFound(format!(
                "no observation with id {}",
                edit.key.observation_id
            ))
        })?;
        affected_wells.insert(well_uuid);

        let datetime = format_datetime(edit.key.datetime);
        let property = property_id(edit.key.data_type);
        let updated = update_reading.execute(params![
            datetime,
            edit.key.observation_id,
            property,
            edit.value
        ])?;
        if updated == 0 {
            insert_reading.execute(params![
                datetime,
                edit.key.observation_id,
                property,
                edit.value
            ])?;
        }
    }

    for well_uuid in affected_wells {
        refresh_overview(conn, well_uuid)?;
    }
    Ok(())
}

/// Rebuild the per-well readings frame: one column per requested data
/// type, rows keyed by (datetime, observation), sonde provenance attached
/// per observation.
pub fn get_for_well(
    conn: &Connection,
    well_uuid: uuid::Uuid,
    data_types: Option<&[DataType]>,
) -> SqliteResult<ReadingsFrame> {
    let data_types = data_types.unwrap_or(&DataType::ALL);
    let mut frame = ReadingsFrame::new(data_types);

    let mut stmt = conn.prepare(
        "SELECT r.datetime, r.observation_id, r.value \
         FROM reading r \
         JOIN observation o ON o.observation_id = r.observation_id \
         WHERE o.well_uuid = ?1 AND r.property_id = ?2",
    )?;
    for data_type in data_types {
        let raw_rows: Vec<(String, i64, Option<f64>)> = {
            let mapped = stmt.query_map(
                params![well_uuid.to_string(), property_id(*data_type)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            mapped.collect::<Result<_, _>>()?
        };
        for (datetime, observation_id, value) in raw_rows {
            let Some(value) = value else { continue };
            frame.insert_observed(parse_datetime(&datetime)?, observation_id, *data_type, value);
        }
    }

    for observation_id in frame.observation_ids() {
        let provenance: Option<(Option<String>, Option<f64>)> = conn
            .query_row(
                "SELECT s.sonde_serial_no, si.install_depth \
                 FROM observation o \
                 JOIN sonde_installation si ON si.process_id = o.process_id \
                 LEFT JOIN sonde s ON s.sonde_uuid = si.sonde_uuid \
                 WHERE o.observation_id = ?1",
                [observation_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((sonde_serial, install_depth)) = provenance {
            frame.set_provenance(observation_id, sonde_serial.as_deref(), install_depth);
        }
    }
    Ok(frame)
}

/// Read the cached per-well monitoring overview.
pub fn get_overview(conn: &Connection) -> SqliteResult<TableData> {
    let mut stmt = conn.prepare(
        "SELECT well_uuid, first_date, last_date, mean_water_level \
         FROM data_overview ORDER BY well_uuid",
    )?;
    let raw_rows: Vec<(String, String, String, f64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<_, _>>()?;

    let mut table = TableData::new();
    for (well_uuid, first_date, last_date, mean_water_level) in raw_rows {
        let mut values = AttributeMap::new();
        values.insert(
            "first_date".to_string(),
            AttrValue::DateTime(parse_datetime(&first_date)?),
        );
        values.insert(
            "last_date".to_string(),
            AttrValue::DateTime(parse_datetime(&last_date)?),
        );
        values.insert(
            "mean_water_level".to_string(),
            AttrValue::Float((mean_water_level * 1000.0).round() / 1000.0),
        );
        table.push(TableRow::new(RecordId::Uuid(parse_uuid(&well_uuid)?), values));
    }
    Ok(table)
}

/// Recompute the overview entry of one well from its water level
/// readings. Wells with no water level data lose their entry.
pub fn refresh_overview(conn: &Connection, well_uuid: uuid::Uuid) -> SqliteResult<()> {
    let summary: (Option<String>, Option<String>, Option<f64>) = conn.query_row(
        "SELECT MIN(r.datetime), MAX(r.datetime), AVG(r.value) \
         FROM reading r \
         JOIN observation o ON o.observation_id = r.observation_id \
         WHERE o.well_uuid = ?1 AND r.property_id = ?2",
        params![well_uuid.to_string(), property_id(DataType::WaterLevel)],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    match summary {
        (Some(first_date), Some(last_date), mean_water_level) => {
            conn.execute(
                "INSERT INTO data_overview \
                     (well_uuid, first_date, last_date, mean_water_level) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (well_uuid) DO UPDATE SET \
                     first_date = excluded.first_date, \
                     last_date = excluded.last_date, \
                     mean_water_level = excluded.mean_water_level",
                params![well_uuid.to_string(), first_date, last_date, mean_water_level],
            )?;
        }
        _ => {
            conn.execute(
                "DELETE FROM data_overview WHERE well_uuid = ?1",
                [well_uuid.to_string()],
            )?;
        }
    }
    Ok(())
}

fn require_well(conn: &Connection, well_uuid: uuid::Uuid) -> SqliteResult<()> {
    let known: i64 = conn.query_row(
        "SELECT COUNT(*) FROM well WHERE well_uuid = ?1",
        [well_uuid.to_string()],
        |row| row.get(0),
    )?;
    if known == 0 {
        return Err(SqliteError::NotFound(format!(
            "no observation well with id {well_uuid}"
        )));
    }
    Ok(())
}

fn observation_well(
    conn: &Connection,
    observation_id: i64,
) -> SqliteResult<Option<uuid::Uuid>> {
    let uuid_text: Option<String> = conn
        .query_row(
            "SELECT well_uuid FROM observation WHERE observation_id = ?1",
            [observation_id],
            |row| row.get(0),
        )
        .optional()?;
    uuid_text.map(|text| parse_uuid(&text)).transpose()
}
