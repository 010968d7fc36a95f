//! The conceptual data model.
//!
//! Every backend must honor the same fixed set of entity kinds. Each kind
//! maps to one logical table of rows keyed by a stable identifier; the
//! attribute vocabulary listed per kind below is the contract callers rely
//! on when building [`AttributeMap`](crate::value::AttributeMap)s.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of identifier used to key an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// 128-bit random identifiers, durable across database files.
    Uuid,
    /// Small auto-incremented integers, local to one database file.
    Int,
}

/// The entity kinds manipulated through the generic accessor dispatch.
///
/// This replaces string-named dynamic dispatch with an enumerated
/// operation type: a backend implements the kinds it supports with an
/// exhaustive match and fails loudly on the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// Observation wells: `obs_well_id`, `common_name`, `municipality`,
    /// `latitude`, `longitude`, `elevation`, `aquifer_type`, `confinement`,
    /// `aquifer_code`, `in_recharge_zone`, `is_influenced`,
    /// `is_station_active`, `obs_well_notes`.
    ObservationWells,
    /// Vertical references: `well_uuid`, `top_casing_alt`, `casing_length`,
    /// `start_date`, `end_date`, `is_alt_geodesic`, `notes`.
    RepereData,
    /// Sonde brand/model library: `sonde_brand`, `sonde_model`; reads also
    /// expose the composed `sonde_brand_model`.
    SondeModels,
    /// Sonde inventory: `sonde_serial_no`, `sonde_model_id`,
    /// `date_reception`, `date_withdrawal`, `in_repair`, `out_of_order`,
    /// `lost`, `off_network`, `sonde_notes`.
    SondesData,
    /// Sonde installations: `well_uuid`, `sonde_uuid`, `start_date`,
    /// `end_date`, `install_depth`, `operator`, `notes`.
    SondeInstallations,
    /// Manual water-level measurements: `well_uuid`, `datetime`, `value`,
    /// `notes`.
    ManualMeasurements,
    /// Measurement unit library: `meas_units_abb`, `meas_units_name`,
    /// `meas_units_desc`.
    MeasurementUnits,
    /// Hydrogeochemical parameter library: `hg_param_code`, `hg_param_name`,
    /// `cas_registry_number`.
    HgParams,
    /// Hydrogeochemical sampling events: `well_uuid`, `hg_survey_datetime`,
    /// `hg_survey_depth`, `hg_survey_operator`, `sample_filtered`,
    /// `survey_note`.
    HgSurveys,
    /// Laboratory results attached to a survey: `hg_survey_id`,
    /// `hg_param_id`, `hg_param_value`, `lim_detection`, `meas_units_id`,
    /// `lab_sample_id`, `lab_report_date`, `method`, `notes`.
    HgParamValues,
    /// Cached per-well monitoring summary: `first_date`, `last_date`,
    /// `mean_water_level`. Read-only; maintained by the timeseries engine.
    DataOverview,
}

impl DataKind {
    /// The stable name of the backend operation family for this kind,
    /// used in error messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::ObservationWells => "observation_wells_data",
            DataKind::RepereData => "repere_data",
            DataKind::SondeModels => "sonde_models_lib",
            DataKind::SondesData => "sondes_data",
            DataKind::SondeInstallations => "sonde_installations",
            DataKind::ManualMeasurements => "manual_measurements",
            DataKind::MeasurementUnits => "measurement_units",
            DataKind::HgParams => "hg_params",
            DataKind::HgSurveys => "hg_surveys",
            DataKind::HgParamValues => "hg_param_values",
            DataKind::DataOverview => "observation_wells_data_overview",
        }
    }

    /// The identifier type used to key entities of this kind.
    pub fn key_type(self) -> KeyType {
        match self {
            DataKind::ObservationWells
            | DataKind::RepereData
            | DataKind::SondesData
            | DataKind::SondeInstallations
            | DataKind::ManualMeasurements
            | DataKind::DataOverview => KeyType::Uuid,
            DataKind::SondeModels
            | DataKind::MeasurementUnits
            | DataKind::HgParams
            | DataKind::HgSurveys
            | DataKind::HgParamValues => KeyType::Int,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
