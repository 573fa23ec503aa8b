// kalmanloads_sim/src/simulation/io/model.rs

use std::fs;
use std::path::Path;

use kalmanloads_core::prelude::TurbineModel;

use crate::error::{Result, SimError};

/// Reads and validates a turbine model TOML file.
pub fn load_turbine_model(path: &Path) -> Result<TurbineModel> {
    let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let model = parse_turbine_model(path, &text)?;
    log::info!(
        "Turbine model `{}`: {} DOF, gear ratio {}, rotor radius {} m",
        path.display(),
        model.n_dof(),
        model.gear_ratio,
        model.rotor.radius
    );
    Ok(model)
}

pub fn parse_turbine_model(path: &Path, text: &str) -> Result<TurbineModel> {
    let model: TurbineModel = toml::from_str(text).map_err(|source| SimError::Model {
        path: path.to_path_buf(),
        source,
    })?;
    model.validate()?;
    Ok(model)
}
