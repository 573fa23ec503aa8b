// kalmanloads_sim/src/simulation/io/aero_tables.rs

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use kalmanloads_core::prelude::AeroTables;
use nalgebra::DMatrix;

use crate::error::{Result, SimError};
use crate::simulation::io::delimited::parse_matrix;

/// `{base}_{kind}{suffix}.csv`
pub fn table_path(base: &Path, kind: &str, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!("_{kind}{suffix}.csv"));
    PathBuf::from(name)
}

/// Loads the tip-speed ratio and pitch grids with the CP and CT surfaces
/// (rows = tip-speed ratio, columns = pitch).
pub fn load_files(base: &Path, suffix: &str) -> Result<AeroTables> {
    let lambda = read_vector(&table_path(base, "Lambda", suffix))?;
    let pitch = read_vector(&table_path(base, "Pitch", suffix))?;
    let cp = read_surface(&table_path(base, "CP", suffix), lambda.len(), pitch.len())?;
    let ct = read_surface(&table_path(base, "CT", suffix), lambda.len(), pitch.len())?;
    log::info!(
        "Aerodynamic tables `{}`: {} tip-speed ratios x {} pitch angles",
        base.display(),
        lambda.len(),
        pitch.len()
    );
    Ok(AeroTables {
        lambda,
        pitch,
        cp,
        ct,
    })
}

/// A grid stored either as one row or as one column.
fn read_vector(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let rows = parse_matrix(path, &text)?;
    if rows.len() > 1 && rows[0].len() > 1 {
        return Err(SimError::parse(
            path,
            1,
            format!("expected a single row or column, found {}x{}", rows.len(), rows[0].len()),
        ));
    }
    Ok(rows.into_iter().flatten().collect())
}

fn read_surface(path: &Path, n_lambda: usize, n_pitch: usize) -> Result<DMatrix<f64>> {
    let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let rows = parse_matrix(path, &text)?;
    if rows.len() != n_lambda || rows[0].len() != n_pitch {
        return Err(SimError::parse(
            path,
            1,
            format!(
                "surface is {}x{}, expected {n_lambda}x{n_pitch} (lambda x pitch)",
                rows.len(),
                rows[0].len()
            ),
        ));
    }
    Ok(DMatrix::from_fn(n_lambda, n_pitch, |i, j| rows[i][j]))
}
