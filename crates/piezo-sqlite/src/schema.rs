//! Schema lifecycle: creation, versioning and forward migrations.
//!
//! The database file carries an application id (`PRAGMA application_id`)
//! and a schema version (`PRAGMA user_version`). Migrations are an ordered
//! list of versioned steps; each step is idempotent and runs in its own
//! exclusive transaction, so a failed step leaves the file at the previous
//! version.

use crate::error::{SqliteError, SqliteResult};
use crate::session::SqliteSession;
use rusqlite::Connection;
use tracing::{debug, info};

/// Signature tagging a file as one of ours ("PIEZ").
pub const APPLICATION_ID: i32 = 0x5049_455A;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i32 = 3;

/// One forward migration step.
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    apply: fn(&Connection) -> SqliteResult<()>,
}

impl Migration {
    /// Apply this single step. Steps are idempotent and testable against
    /// a fixture database at the prior version.
    pub fn run(&self, conn: &Connection) -> SqliteResult<()> {
        (self.apply)(conn)
    }
}

/// All migration steps, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "base monitoring schema",
        apply: apply_v1,
    },
    Migration {
        version: 2,
        name: "hydrogeochemistry tables",
        apply: apply_v2,
    },
    Migration {
        version: 3,
        name: "tri-state well metadata and data overview cache",
        apply: apply_v3,
    },
];

/// Read the application id and schema version of the connected file.
pub fn signature(conn: &Connection) -> SqliteResult<(i32, i32)> {
    let app_id: i32 = conn.query_row("PRAGMA application_id", [], |row| row.get(0))?;
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok((app_id, version))
}

/// Create (or complete) the schema on a fresh database and seed the
/// observed-property and sonde-model libraries.
pub fn create_database(session: &SqliteSession, path: &str) -> SqliteResult<()> {
    session.with_transaction(|conn| {
        let (app_id, _) = signature(conn)?;
        if app_id != 0 && app_id != APPLICATION_ID {
            return Err(SqliteError::NotADatabase {
                path: path.to_string(),
                found: app_id,
                expected: APPLICATION_ID,
            });
        }

        for migration in MIGRATIONS {
            debug!(version = migration.version, name = migration.name, "applying");
            migration.run(conn)?;
        }
        seed_observed_properties(conn)?;
        seed_sonde_models(conn)?;

        conn.pragma_update(None, "application_id", APPLICATION_ID)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        info!(path, version = SCHEMA_VERSION, "database created");
        Ok(())
    })
}

/// Bring a database at `from_version` forward to [`SCHEMA_VERSION`], one
/// step per transaction. Steps at or below `from_version` are skipped, so
/// re-running the path on an already-current file is a no-op.
pub fn upgrade_database(session: &SqliteSession, from_version: i32) -> SqliteResult<()> {
    for migration in MIGRATIONS.iter().filter(|m| m.version > from_version) {
        info!(
            from = migration.version - 1,
            to = migration.version,
            name = migration.name,
            "upgrading database schema"
        );
        session.with_transaction(|conn| {
            migration.run(conn).map_err(|error| match error {
                SqliteError::Rusqlite(source) => SqliteError::Migration {
                    from: migration.version - 1,
                    to: migration.version,
                    source,
                },
                other => other,
            })?;
            conn.pragma_update(None, "user_version", migration.version)?;
            Ok(())
        })?;
    }
    Ok(())
}

// ---- Migration steps

fn apply_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(SCHEMA_V1)?;
    Ok(())
}

fn apply_v2(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(SCHEMA_V2)?;
    Ok(())
}

/// v3 converts `in_recharge_zone`/`is_influenced` from free-text yes/no
/// spellings to integer tri-state (0 = no, 1 = yes, 2 = undetermined) and
/// adds the per-well data overview cache.
fn apply_v3(conn: &Connection) -> SqliteResult<()> {
    let column_type: String = conn.query_row(
        "SELECT type FROM pragma_table_info('well_metadata') \
         WHERE name = 'in_recharge_zone'",
        [],
        |row| row.get(0),
    )?;

    if column_type.eq_ignore_ascii_case("TEXT") {
        let rows: Vec<(String, Option<String>, Option<String>)> = {
            let mut stmt = conn.prepare(
                "SELECT well_uuid, in_recharge_zone, is_influenced FROM well_metadata",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            mapped.collect::<Result<_, _>>()?
        };

        conn.execute_batch(
            "ALTER TABLE well_metadata DROP COLUMN in_recharge_zone;\
             ALTER TABLE well_metadata ADD COLUMN in_recharge_zone INTEGER;\
             ALTER TABLE well_metadata DROP COLUMN is_influenced;\
             ALTER TABLE well_metadata ADD COLUMN is_influenced INTEGER;",
        )?;

        let mut stmt = conn.prepare(
            "UPDATE well_metadata SET in_recharge_zone = ?2, is_influenced = ?3 \
             WHERE well_uuid = ?1",
        )?;
        for (well_uuid, recharge, influenced) in rows {
            stmt.execute(rusqlite::params![
                well_uuid,
                tri_state(recharge.as_deref()),
                tri_state(influenced.as_deref()),
            ])?;
        }
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS data_overview (
             well_uuid TEXT PRIMARY KEY NOT NULL REFERENCES well (well_uuid),
             first_date TEXT,
             last_date TEXT,
             mean_water_level REAL
         );",
    )?;
    Ok(())
}

/// Map the historical yes/no spellings to the integer tri-state.
fn tri_state(text: Option<&str>) -> Option<i64> {
    match text?.to_lowercase().as_str() {
        "no" | "non" => Some(0),
        "yes" | "oui" => Some(1),
        "nd" | "na" => Some(2),
        _ => None,
    }
}

// ---- Seed libraries

fn seed_observed_properties(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "INSERT OR IGNORE INTO observed_property \
             (property_id, property_name, property_units) \
         VALUES \
             (1, 'water temperature', '\u{00b0}C'), \
             (2, 'water level', 'm'), \
             (3, 'water electrical conductivity', '\u{00b5}S/cm');",
    )?;
    Ok(())
}

fn seed_sonde_models(conn: &Connection) -> SqliteResult<()> {
    const MODELS: &[(&str, &str)] = &[
        ("Solinst", "LT M10 Gold"),
        ("Solinst", "Barologger M1.5 Gold"),
        ("Solinst", "LT M20 Gold"),
        ("Solinst", "LT M10"),
        ("Solinst", "Barologger M1.5"),
        ("Solinst", "LTC"),
        ("Solinst", "LT M20"),
        ("Solinst", "LTC F30/M10"),
        ("Solinst", "LTC F100/M30"),
        ("Solinst", "LTC M200 Edge"),
        ("Solinst", "LTC M20 Edge"),
        ("Solinst", "LTC M30 Edge"),
        ("Solinst", "LTC M100 Edge"),
        ("Solinst", "LTC M10 Edge"),
        ("Solinst", "LT M10 Edge"),
        ("Solinst", "LT M20 Edge"),
        ("Solinst", "LT M100 Edge"),
        ("Solinst", "L M5"),
        ("Solinst", "LT M5"),
        ("Solinst", "LT M100"),
        ("Solinst", "L M10"),
        ("Solinst", "LT M30"),
        ("Solinst", "LTC Jr"),
    ];

    let already_seeded: i64 =
        conn.query_row("SELECT COUNT(*) FROM sonde_model", [], |row| row.get(0))?;
    if already_seeded > 0 {
        return Ok(());
    }

    let mut stmt =
        conn.prepare("INSERT INTO sonde_model (sonde_brand, sonde_model) VALUES (?1, ?2)")?;
    for (brand, model) in MODELS {
        stmt.execute([brand, model])?;
    }
    Ok(())
}

/// Version 1: the base monitoring schema. `in_recharge_zone` and
/// `is_influenced` were free text until version 3.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS location (
    loc_id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL,
    longitude REAL,
    elevation REAL,
    municipality TEXT
);

CREATE TABLE IF NOT EXISTS well (
    well_uuid TEXT PRIMARY KEY NOT NULL,
    obs_well_id TEXT,
    loc_id INTEGER REFERENCES location (loc_id),
    obs_well_notes TEXT
);

CREATE TABLE IF NOT EXISTS well_metadata (
    well_uuid TEXT PRIMARY KEY NOT NULL REFERENCES well (well_uuid),
    common_name TEXT,
    aquifer_type TEXT,
    confinement TEXT,
    aquifer_code INTEGER,
    in_recharge_zone TEXT,
    is_influenced TEXT,
    is_station_active INTEGER
);

CREATE TABLE IF NOT EXISTS repere (
    repere_uuid TEXT PRIMARY KEY NOT NULL,
    well_uuid TEXT NOT NULL REFERENCES well (well_uuid),
    top_casing_alt REAL,
    casing_length REAL,
    start_date TEXT,
    end_date TEXT,
    is_alt_geodesic INTEGER,
    repere_note TEXT
);

CREATE TABLE IF NOT EXISTS sonde_model (
    sonde_model_id INTEGER PRIMARY KEY AUTOINCREMENT,
    sonde_brand TEXT,
    sonde_model TEXT
);

CREATE TABLE IF NOT EXISTS sonde (
    sonde_uuid TEXT PRIMARY KEY NOT NULL,
    sonde_serial_no TEXT,
    sonde_model_id INTEGER REFERENCES sonde_model (sonde_model_id),
    date_reception TEXT,
    date_withdrawal TEXT,
    in_repair INTEGER,
    out_of_order INTEGER,
    lost INTEGER,
    off_network INTEGER,
    sonde_notes TEXT
);

CREATE TABLE IF NOT EXISTS process (
    process_id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_type TEXT,
    well_uuid TEXT REFERENCES well (well_uuid)
);

CREATE TABLE IF NOT EXISTS sonde_installation (
    install_uuid TEXT PRIMARY KEY NOT NULL,
    sonde_uuid TEXT REFERENCES sonde (sonde_uuid),
    process_id INTEGER REFERENCES process (process_id),
    start_date TEXT,
    end_date TEXT,
    install_depth REAL,
    operator TEXT,
    install_note TEXT
);

CREATE TABLE IF NOT EXISTS observation (
    observation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    well_uuid TEXT NOT NULL REFERENCES well (well_uuid),
    process_id INTEGER REFERENCES process (process_id),
    obs_datetime TEXT
);

CREATE INDEX IF NOT EXISTS idx_observation_well ON observation (well_uuid);

CREATE TABLE IF NOT EXISTS observed_property (
    property_id INTEGER PRIMARY KEY,
    property_name TEXT,
    property_units TEXT
);

CREATE TABLE IF NOT EXISTS reading (
    datetime TEXT NOT NULL,
    observation_id INTEGER NOT NULL REFERENCES observation (observation_id),
    property_id INTEGER NOT NULL REFERENCES observed_property (property_id),
    value REAL,
    PRIMARY KEY (datetime, observation_id, property_id)
);

CREATE INDEX IF NOT EXISTS idx_reading_observation ON reading (observation_id);

CREATE TABLE IF NOT EXISTS manual_measurement (
    measurement_uuid TEXT PRIMARY KEY NOT NULL,
    well_uuid TEXT NOT NULL REFERENCES well (well_uuid),
    datetime TEXT,
    value REAL,
    notes TEXT
);
"#;

/// Version 2: laboratory/hydrogeochemistry cross-section.
const SCHEMA_V2: &str = r#"
CREATE TABLE IF NOT EXISTS measurement_units (
    meas_units_id INTEGER PRIMARY KEY AUTOINCREMENT,
    meas_units_abb TEXT,
    meas_units_name TEXT,
    meas_units_desc TEXT
);

CREATE TABLE IF NOT EXISTS hg_params (
    hg_param_id INTEGER PRIMARY KEY AUTOINCREMENT,
    hg_param_code TEXT,
    hg_param_name TEXT,
    cas_registry_number TEXT
);

CREATE TABLE IF NOT EXISTS hg_surveys (
    hg_survey_id INTEGER PRIMARY KEY AUTOINCREMENT,
    well_uuid TEXT NOT NULL REFERENCES well (well_uuid),
    hg_survey_datetime TEXT,
    hg_survey_depth REAL,
    hg_survey_operator TEXT,
    sample_filtered INTEGER,
    survey_note TEXT,
    UNIQUE (well_uuid, hg_survey_datetime)
);

CREATE TABLE IF NOT EXISTS hg_param_values (
    hg_param_value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    hg_survey_id INTEGER NOT NULL REFERENCES hg_surveys (hg_survey_id),
    hg_param_id INTEGER NOT NULL REFERENCES hg_params (hg_param_id),
    hg_param_value TEXT,
    lim_detection REAL,
    meas_units_id INTEGER REFERENCES measurement_units (meas_units_id),
    lab_sample_id TEXT,
    lab_report_date TEXT,
    method TEXT,
    notes TEXT
);
"#;
