// kalmanloads_sim/src/simulation/config/mod.rs

//! Loading and validation of the run configuration.

pub mod structs;

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

use crate::error::{Result, SimError};
pub use structs::{FilesConfig, MeasurementsConfig, RunConfig};

/// Prefix of environment variables overriding configuration values,
/// e.g. `KALMANLOADS_MEASUREMENTS__SEED=7`.
pub const ENV_PREFIX: &str = "KALMANLOADS_";

impl RunConfig {
    /// Loads `path`, applies environment overrides and resolves relative
    /// file paths against the directory of the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SimError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "configuration file not found"),
            ));
        }
        log::info!("Loading run configuration from: {}", path.display());
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::finish(figment.extract()?, base)
    }

    /// Parses a configuration held in memory; relative paths are resolved
    /// against `base`.
    pub fn from_toml_str(toml: &str, base: &Path) -> Result<Self> {
        let config = Figment::new().merge(Toml::string(toml)).extract()?;
        Self::finish(config, base)
    }

    fn finish(mut config: Self, base: &Path) -> Result<Self> {
        config.validate()?;
        let files = &mut config.files;
        for path in [
            &mut files.model,
            &mut files.measurements,
            &mut files.aero_tables_base,
        ] {
            *path = resolve(base, path);
        }
        if let Some(output) = files.output.as_mut() {
            *output = resolve(base, output);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let m = &self.measurements;
        if m.under_sampling == 0 {
            return Err(SimError::InvalidOption {
                name: "measurements.under_sampling",
                reason: "must be at least 1".into(),
            });
        }
        if m.filter_window == 0 {
            return Err(SimError::InvalidOption {
                name: "measurements.filter_window",
                reason: "must be at least 1".into(),
            });
        }
        if let Some([t0, t1]) = m.time_range {
            if !(t0 <= t1) {
                return Err(SimError::InvalidOption {
                    name: "measurements.time_range",
                    reason: format!("start {t0} is after end {t1}"),
                });
            }
        }
        Ok(())
    }

    /// Seed of the measurement-noise generator.
    pub fn seed(&self) -> u64 {
        self.measurements.seed.unwrap_or(0)
    }

    /// Where results are written.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.files.output {
            return output.clone();
        }
        let measurements = &self.files.measurements;
        let stem = measurements
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".into());
        measurements.with_file_name(format!("{stem}_kf.csv"))
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
