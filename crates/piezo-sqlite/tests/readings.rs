//! Timeseries merge, deletion, edition and the data overview cache.

use chrono::{Days, NaiveDate, NaiveDateTime};
use piezo_core::{
    AccessorError, AttrValue, AttributeMap, DataKind, DataType, DatabaseAccessor,
    ReadingKey, ReadingsFrame, RecordId, TimeSeriesDels, TimeSeriesEdits,
};
use piezo_sqlite::SqliteAccessor;
use uuid::Uuid;

fn accessor() -> SqliteAccessor {
    SqliteAccessor::in_memory().expect("in-memory database")
}

fn attrs(pairs: &[(&str, AttrValue)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn add_well(accessor: &SqliteAccessor, code: &str) -> Uuid {
    accessor
        .add_one(
            DataKind::ObservationWells,
            attrs(&[("obs_well_id", AttrValue::from(code))]),
        )
        .unwrap()
        .as_uuid()
        .unwrap()
}

fn datetime(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Observation grouping rows currently stored, counted directly so the
/// garbage collection is checked against the table rather than through
/// the readings join.
fn observation_rows(accessor: &SqliteAccessor) -> i64 {
    accessor
        .session()
        .unwrap()
        .with_transaction(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM observation", [], |row| row.get(0))?)
        })
        .unwrap()
}

/// Every stored value of a read-back frame, addressed for deletion.
fn keys_of(frame: &ReadingsFrame) -> TimeSeriesDels {
    let mut dels = TimeSeriesDels::new();
    for row in frame.rows() {
        let observation_id = row.obs_id.expect("stored rows carry an observation id");
        for data_type in row.values.keys() {
            dels.push(ReadingKey {
                datetime: row.datetime,
                observation_id,
                data_type: *data_type,
            });
        }
    }
    dels
}

#[test]
fn readings_round_trip() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "03037041");

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel, DataType::WaterTemp]);
    frame.insert(datetime(2018, 9, 27, 7), DataType::WaterLevel, 1.43);
    frame.insert(datetime(2018, 9, 27, 7), DataType::WaterTemp, 7.8);
    frame.insert(datetime(2018, 9, 27, 8), DataType::WaterLevel, 1.42);

    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.count_for(DataType::WaterLevel), 2);
    assert_eq!(stored.count_for(DataType::WaterTemp), 1);
    assert_eq!(stored.count_for(DataType::WaterEC), 0);

    let rows: Vec<_> = stored.rows().collect();
    assert_eq!(rows[0].datetime, datetime(2018, 9, 27, 7));
    assert_eq!(rows[0].values[&DataType::WaterLevel], 1.43);
    assert_eq!(rows[0].values[&DataType::WaterTemp], 7.8);
    assert!(rows[0].obs_id.is_some());
    // One observation grouping per distinct datetime.
    assert_eq!(stored.observation_ids().len(), 2);
}

#[test]
fn readings_filter_by_data_type() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "02257001");

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel, DataType::WaterEC]);
    frame.insert(datetime(2015, 4, 1, 0), DataType::WaterLevel, 3.1);
    frame.insert(datetime(2015, 4, 1, 0), DataType::WaterEC, 480.0);
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    let levels_only = accessor
        .get_timeseries_for_obs_well(well_uuid, Some(&[DataType::WaterLevel]))
        .unwrap();
    assert_eq!(levels_only.count_for(DataType::WaterLevel), 1);
    assert_eq!(levels_only.count_for(DataType::WaterEC), 0);
}

#[test]
fn well_without_readings_yields_an_empty_frame() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "01160002");

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, Some(&[DataType::WaterLevel, DataType::WaterEC]))
        .unwrap();
    assert!(stored.is_empty());
    // The requested columns are declared even with no rows behind them.
    assert_eq!(stored.data_types(), &[DataType::WaterLevel, DataType::WaterEC]);
}

#[test]
fn add_to_unknown_well_fails() {
    let accessor = accessor();
    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel]);
    frame.insert(datetime(2015, 1, 1, 0), DataType::WaterLevel, 1.0);

    let err = accessor
        .add_timeseries_data(&frame, Uuid::new_v4(), None)
        .unwrap_err();
    assert!(matches!(err, AccessorError::NotFound(_)));
}

#[test]
fn add_with_unknown_installation_fails() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "02000001");
    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel]);
    frame.insert(datetime(2015, 1, 1, 0), DataType::WaterLevel, 1.0);

    let err = accessor
        .add_timeseries_data(&frame, well_uuid, Some(Uuid::new_v4()))
        .unwrap_err();
    assert!(matches!(err, AccessorError::NotFound(_)));
}

#[test]
fn duplicate_add_is_skipped() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "03090001");

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel]);
    frame.insert(datetime(2019, 6, 1, 12), DataType::WaterLevel, 2.0);
    frame.insert(datetime(2019, 6, 2, 12), DataType::WaterLevel, 2.1);
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    // The exact same batch again: nothing changes, nothing errors.
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();
    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.count_for(DataType::WaterLevel), 2);
    let values: Vec<f64> = stored
        .rows()
        .map(|row| row.values[&DataType::WaterLevel])
        .collect();
    assert_eq!(values, vec![2.0, 2.1]);

    // A partially overlapping batch only lands its new keys; the occupied
    // one keeps its first value.
    let mut overlap = ReadingsFrame::new(&[DataType::WaterLevel, DataType::WaterTemp]);
    overlap.insert(datetime(2019, 6, 2, 12), DataType::WaterLevel, 99.0);
    overlap.insert(datetime(2019, 6, 2, 12), DataType::WaterTemp, 8.5);
    overlap.insert(datetime(2019, 6, 3, 12), DataType::WaterLevel, 2.2);
    accessor
        .add_timeseries_data(&overlap, well_uuid, None)
        .unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.count_for(DataType::WaterLevel), 3);
    assert_eq!(stored.count_for(DataType::WaterTemp), 1);
    let day2 = stored
        .rows()
        .find(|row| row.datetime == datetime(2019, 6, 2, 12))
        .unwrap();
    assert_eq!(day2.values[&DataType::WaterLevel], 2.1);
    assert_eq!(day2.values[&DataType::WaterTemp], 8.5);
}

#[test]
fn installation_provenance_is_attached_on_read() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "01370002");
    let sonde_uuid = accessor
        .add_one(
            DataKind::SondesData,
            attrs(&[
                ("sonde_serial_no", AttrValue::from("1060549")),
                ("sonde_model_id", AttrValue::Int(6)),
            ]),
        )
        .unwrap()
        .as_uuid()
        .unwrap();
    let install_uuid = accessor
        .add_one(
            DataKind::SondeInstallations,
            attrs(&[
                ("well_uuid", AttrValue::Uuid(well_uuid)),
                ("sonde_uuid", AttrValue::Uuid(sonde_uuid)),
                ("start_date", AttrValue::from(datetime(2017, 5, 1, 0))),
                ("install_depth", AttrValue::from(9.25)),
            ]),
        )
        .unwrap()
        .as_uuid()
        .unwrap();

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel]);
    frame.insert(datetime(2017, 5, 2, 0), DataType::WaterLevel, 4.2);
    accessor
        .add_timeseries_data(&frame, well_uuid, Some(install_uuid))
        .unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    let row = stored.rows().next().unwrap();
    assert_eq!(row.sonde_serial.as_deref(), Some("1060549"));
    assert_eq!(row.install_depth, Some(9.25));

    // A batch without installation context forms a separate observation
    // grouping on the same well, with no provenance.
    let mut loose = ReadingsFrame::new(&[DataType::WaterLevel]);
    loose.insert(datetime(2017, 5, 2, 0), DataType::WaterLevel, 4.3);
    accessor.add_timeseries_data(&loose, well_uuid, None).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.observation_ids().len(), 2);
    let bare = stored.rows().find(|row| row.sonde_serial.is_none()).unwrap();
    assert_eq!(bare.values[&DataType::WaterLevel], 4.3);
}

#[test]
fn edits_overwrite_and_insert_missing_keys() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "03040009");

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel]);
    frame.insert(datetime(2020, 2, 10, 6), DataType::WaterLevel, 5.0);
    frame.insert(datetime(2020, 2, 11, 6), DataType::WaterLevel, 5.2);
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    // Each datetime groups under its own observation.
    let observation_id = stored
        .rows()
        .find(|row| row.datetime == datetime(2020, 2, 10, 6))
        .and_then(|row| row.obs_id)
        .unwrap();

    let mut edits = TimeSeriesEdits::new();
    // Correction of an existing value.
    edits.push(
        ReadingKey {
            datetime: datetime(2020, 2, 10, 6),
            observation_id,
            data_type: DataType::WaterLevel,
        },
        4.8,
    );
    // A key with no stored value lands as a new reading.
    edits.push(
        ReadingKey {
            datetime: datetime(2020, 2, 10, 6),
            observation_id,
            data_type: DataType::WaterTemp,
        },
        6.1,
    );
    accessor.save_timeseries_data_edits(&edits).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    let day10 = stored
        .rows()
        .find(|row| row.datetime == datetime(2020, 2, 10, 6))
        .unwrap();
    assert_eq!(day10.values[&DataType::WaterLevel], 4.8);
    assert_eq!(day10.values[&DataType::WaterTemp], 6.1);
    assert_eq!(stored.count_for(DataType::WaterLevel), 2);
}

#[test]
fn edit_on_unknown_observation_fails() {
    let accessor = accessor();
    let mut edits = TimeSeriesEdits::new();
    edits.push(
        ReadingKey {
            datetime: datetime(2020, 1, 1, 0),
            observation_id: 424242,
            data_type: DataType::WaterLevel,
        },
        1.0,
    );
    let err = accessor.save_timeseries_data_edits(&edits).unwrap_err();
    assert!(matches!(err, AccessorError::NotFound(_)));
}

#[test]
fn delete_collects_empty_observations() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "05210001");

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel, DataType::WaterTemp]);
    frame.insert(datetime(2016, 7, 1, 0), DataType::WaterLevel, 2.4);
    frame.insert(datetime(2016, 7, 1, 0), DataType::WaterTemp, 9.0);
    frame.insert(datetime(2016, 7, 2, 0), DataType::WaterLevel, 2.5);
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    let observation_id = stored
        .rows()
        .find(|row| row.datetime == datetime(2016, 7, 1, 0))
        .and_then(|row| row.obs_id)
        .unwrap();

    // Removing one of two values at a datetime keeps the rest.
    let mut dels = TimeSeriesDels::new();
    dels.push(ReadingKey {
        datetime: datetime(2016, 7, 1, 0),
        observation_id,
        data_type: DataType::WaterTemp,
    });
    // Keys addressing nothing are ignored.
    dels.push(ReadingKey {
        datetime: datetime(2016, 7, 1, 0),
        observation_id: 999_999,
        data_type: DataType::WaterLevel,
    });
    accessor.delete_timeseries_data(&dels).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.count_for(DataType::WaterTemp), 0);
    assert_eq!(stored.count_for(DataType::WaterLevel), 2);
    assert_eq!(observation_rows(&accessor), 2);

    // Removing every remaining value also removes the grouping rows.
    accessor.delete_timeseries_data(&keys_of(&stored)).unwrap();
    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert!(stored.is_empty());
    assert_eq!(observation_rows(&accessor), 0);
    assert!(accessor.get(DataKind::DataOverview).unwrap().is_empty());
}

#[test]
fn overview_tracks_water_level_mutations() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "03097082");

    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel, DataType::WaterTemp]);
    frame.insert(datetime(2014, 3, 1, 0), DataType::WaterLevel, 1.0);
    frame.insert(datetime(2014, 3, 5, 0), DataType::WaterLevel, 2.0);
    // Temperature never contributes to the overview.
    frame.insert(datetime(2014, 2, 1, 0), DataType::WaterTemp, 4.0);
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    let overview = accessor.get(DataKind::DataOverview).unwrap();
    assert_eq!(overview.len(), 1);
    let row = overview.get(&RecordId::Uuid(well_uuid)).unwrap();
    assert_eq!(
        row.value("first_date"),
        Some(&AttrValue::DateTime(datetime(2014, 3, 1, 0)))
    );
    assert_eq!(
        row.value("last_date"),
        Some(&AttrValue::DateTime(datetime(2014, 3, 5, 0)))
    );
    assert_eq!(row.value("mean_water_level"), Some(&AttrValue::Float(1.5)));

    // An edit shifts the mean.
    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, Some(&[DataType::WaterLevel]))
        .unwrap();
    let observation_id = stored
        .rows()
        .find(|row| row.datetime == datetime(2014, 3, 5, 0))
        .and_then(|row| row.obs_id)
        .unwrap();
    let mut edits = TimeSeriesEdits::new();
    edits.push(
        ReadingKey {
            datetime: datetime(2014, 3, 5, 0),
            observation_id,
            data_type: DataType::WaterLevel,
        },
        4.0,
    );
    accessor.save_timeseries_data_edits(&edits).unwrap();

    let overview = accessor.get(DataKind::DataOverview).unwrap();
    let row = overview.get(&RecordId::Uuid(well_uuid)).unwrap();
    assert_eq!(row.value("mean_water_level"), Some(&AttrValue::Float(2.5)));

    // Deleting every water level drops the entry even though temperature
    // readings remain.
    accessor.delete_timeseries_data(&keys_of(&stored)).unwrap();
    assert!(accessor.get(DataKind::DataOverview).unwrap().is_empty());
    let remaining = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(remaining.count_for(DataType::WaterTemp), 1);
    // Only the temperature grouping survives the collection.
    assert_eq!(observation_rows(&accessor), 1);
}

/// Sixty years of daily readings: the volume the merge and deletion paths
/// are sized for.
#[test]
fn sixty_years_of_daily_readings() {
    let accessor = accessor();
    let well_uuid = add_well(&accessor, "02340006");

    let first = datetime(1960, 1, 1, 12);
    let last = datetime(2020, 1, 1, 12);
    let mut frame = ReadingsFrame::new(&[DataType::WaterLevel, DataType::WaterTemp]);
    let mut day = first;
    let mut i = 0u64;
    while day <= last {
        frame.insert(day, DataType::WaterLevel, 10.0 + (i % 100) as f64 / 100.0);
        frame.insert(day, DataType::WaterTemp, 5.0 + (i % 10) as f64);
        day = day.checked_add_days(Days::new(1)).unwrap();
        i += 1;
    }
    assert_eq!(frame.len(), 21_916);

    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();

    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.len(), 21_916);
    assert_eq!(stored.count_for(DataType::WaterLevel), 21_916);
    assert_eq!(stored.count_for(DataType::WaterTemp), 21_916);

    let overview = accessor.get(DataKind::DataOverview).unwrap();
    let row = overview.get(&RecordId::Uuid(well_uuid)).unwrap();
    assert_eq!(row.value("first_date"), Some(&AttrValue::DateTime(first)));
    assert_eq!(row.value("last_date"), Some(&AttrValue::DateTime(last)));

    // Re-adding the whole batch is a no-op thanks to the duplicate skip.
    accessor.add_timeseries_data(&frame, well_uuid, None).unwrap();
    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert_eq!(stored.len(), 21_916);

    assert_eq!(observation_rows(&accessor), 21_916);

    // Full deletion leaves the well spotless: no readings, no grouping
    // rows, no overview entry.
    accessor.delete_timeseries_data(&keys_of(&stored)).unwrap();
    let stored = accessor
        .get_timeseries_for_obs_well(well_uuid, None)
        .unwrap();
    assert!(stored.is_empty());
    assert_eq!(observation_rows(&accessor), 0);
    assert!(accessor.get(DataKind::DataOverview).unwrap().is_empty());
}
