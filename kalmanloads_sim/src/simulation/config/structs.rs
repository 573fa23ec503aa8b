// kalmanloads_sim/src/simulation/config/structs.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use kalmanloads_core::prelude::{Channel, FilterConfig, MeasurementOptions, SigmaOverrides};
use serde::{Deserialize, Serialize};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # RunConfig
/// Everything needed for one offline estimation run, as parsed from a
/// `run.toml` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct RunConfig {
    pub files: FilesConfig,

    #[serde(default)] // Use defaults if the [filter] section is missing
    pub filter: FilterConfig,

    #[serde(default)]
    pub measurements: MeasurementsConfig,

    #[serde(default)]
    pub sigmas: SigmaOverrides,

    /// Channel → file column overrides on top of the default channel map.
    #[serde(default)]
    pub channels: BTreeMap<Channel, String>,

    /// Write the results file at the end of the run.
    #[serde(default = "default_true")]
    pub export: bool,
}

fn default_true() -> bool {
    true
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesConfig {
    /// Turbine model TOML file.
    pub model: PathBuf,
    /// Delimited measurement file.
    pub measurements: PathBuf,
    /// Common prefix of the aerodynamic table files.
    pub aero_tables_base: PathBuf,
    #[serde(default)]
    pub aero_tables_suffix: String,
    /// Results file. Defaults to `<measurements stem>_kf.csv` next to the
    /// measurement file.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MeasurementsConfig {
    /// Keep every n-th row after trimming.
    pub under_sampling: usize,
    /// Inclusive time window `[t0, t1]` [s].
    pub time_range: Option<[f64; 2]>,
    pub filter_acceleration: bool,
    pub filter_window: usize,
    pub noise_r_factor: f64,
    /// Seed for the measurement noise. Absent means 0.
    pub seed: Option<u64>,
}

impl Default for MeasurementsConfig {
    fn default() -> Self {
        let options = MeasurementOptions::default();
        Self {
            under_sampling: 1,
            time_range: None,
            filter_acceleration: options.filter_acceleration,
            filter_window: options.filter_window,
            noise_r_factor: options.noise_r_factor,
            seed: None,
        }
    }
}

impl MeasurementsConfig {
    pub fn options(&self) -> MeasurementOptions {
        MeasurementOptions {
            noise_r_factor: self.noise_r_factor,
            filter_acceleration: self.filter_acceleration,
            filter_window: self.filter_window,
        }
    }
}
