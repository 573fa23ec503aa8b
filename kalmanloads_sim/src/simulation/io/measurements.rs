// kalmanloads_sim/src/simulation/io/measurements.rs

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use kalmanloads_core::prelude::TimeSeriesTable;

use crate::error::{Result, SimError};
use crate::simulation::io::delimited::{content_lines, parse_value, split_fields};

const RPM_TO_RAD_S: f64 = 2.0 * PI / 60.0;
const DEG_TO_RAD: f64 = PI / 180.0;

/// Load-time options of a measurement file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Inclusive time window `[t0, t1]` [s].
    pub time_range: Option<[f64; 2]>,
    /// Keep every n-th row after trimming.
    pub under_sampling: usize,
    /// Gearbox ratio, used to move generator torque to the rotor side.
    pub gear_ratio: f64,
}

/// Drops a `_[unit]` suffix: `RotSpeed_[rpm]` -> `RotSpeed`.
pub fn clean_column_name(name: &str) -> &str {
    name.split("_[").next().unwrap_or(name).trim()
}

fn is_units_row(fields: &[&str]) -> bool {
    !fields.is_empty()
        && fields.iter().all(|f| {
            (f.starts_with('(') && f.ends_with(')')) || (f.starts_with('[') && f.ends_with(']'))
        })
}

/// Parses a delimited time series with a header row into a table keyed by
/// the cleaned column names. No units are converted.
pub fn parse_measurements(path: &Path, text: &str) -> Result<TimeSeriesTable> {
    let mut lines = content_lines(text).peekable();
    let Some((_, header)) = lines.next() else {
        return Err(SimError::EmptyFile {
            path: path.to_path_buf(),
        });
    };
    let names: Vec<&str> = split_fields(header)
        .into_iter()
        .map(clean_column_name)
        .collect();
    if lines
        .peek()
        .is_some_and(|(_, next)| is_units_row(&split_fields(next)))
    {
        lines.next();
    }

    let time_col = names
        .iter()
        .position(|n| n.eq_ignore_ascii_case("time"))
        .ok_or_else(|| SimError::MissingColumn {
            path: path.to_path_buf(),
            column: "Time".into(),
        })?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (line, record) in lines {
        let fields = split_fields(record);
        if fields.len() != names.len() {
            return Err(SimError::parse(
                path,
                line,
                format!("expected {} fields, found {}", names.len(), fields.len()),
            ));
        }
        for (column, field) in columns.iter_mut().zip(fields) {
            column.push(parse_value(path, line, field)?);
        }
    }
    if columns[time_col].is_empty() {
        return Err(SimError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let mut named: Vec<(&str, Vec<f64>)> = names.iter().copied().zip(columns).collect();
    let (_, time) = named.remove(time_col);
    let mut table = TimeSeriesTable::new(time);
    for (name, values) in named {
        table.insert(name, values)?;
    }
    Ok(table)
}

/// Keeps the rows with `t0 <= t <= t1`.
pub fn trim_time_range(table: &mut TimeSeriesTable, t0: f64, t1: f64) {
    table.retain_rows(|_, t| t >= t0 && t <= t1);
}

/// Keeps every `factor`-th row, starting with the first.
pub fn under_sample(table: &mut TimeSeriesTable, factor: usize) {
    if factor > 1 {
        table.retain_rows(|i, _| i % factor == 0);
    }
}

/// Converts recorded units to SI where a known column is present:
/// rotor and generator speed rpm → rad/s, azimuth deg → rad, generator
/// torque kNm → Nm on the rotor side, rotor torque kNm → Nm and rotor
/// thrust kN → N. Pitch stays in degrees.
pub fn convert_units(table: &mut TimeSeriesTable, gear_ratio: f64) {
    let conversions = [
        ("RotSpeed", RPM_TO_RAD_S),
        ("GenSpeed", RPM_TO_RAD_S),
        ("Azimuth", DEG_TO_RAD),
        ("GenTq", 1000.0 * gear_ratio),
        ("RotTorq", 1000.0),
        ("RotThrust", 1000.0),
    ];
    for (name, factor) in conversions {
        if table.scale(name, factor) {
            log::debug!("Converted column {name} (x{factor})");
        }
    }
}

/// Reads a measurement file, applies the time window and under-sampling,
/// then converts units.
pub fn read_measurements(path: &Path, options: &LoadOptions) -> Result<TimeSeriesTable> {
    let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let mut table = parse_measurements(path, &text)?;
    let n_read = table.nt();

    if let Some([t0, t1]) = options.time_range {
        trim_time_range(&mut table, t0, t1);
        log::info!("Time range [{t0}, {t1}] s: {} of {n_read} samples kept", table.nt());
    }
    if options.under_sampling > 1 {
        under_sample(&mut table, options.under_sampling);
        log::info!(
            "Under-sampling by {}: {} samples",
            options.under_sampling,
            table.nt()
        );
    }
    if table.nt() == 0 {
        return Err(SimError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    convert_units(&mut table, options.gear_ratio);
    log::info!(
        "Measurements `{}`: {} channels, {} samples",
        path.display(),
        table.names().count(),
        table.nt()
    );
    Ok(table)
}
