// kalmanloads_sim/src/simulation/io/delimited.rs

use std::path::Path;

use crate::error::{Result, SimError};

/// Splits a record on the first delimiter found among `,`, `;` and tab,
/// falling back to runs of whitespace.
pub fn split_fields(line: &str) -> Vec<&str> {
    let delimiter = [',', ';', '\t'].into_iter().find(|d| line.contains(*d));
    match delimiter {
        Some(d) => line.split(d).map(str::trim).collect(),
        None => line.split_whitespace().collect(),
    }
}

/// Non-empty, non-comment lines with their 1-based line numbers.
pub fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

pub fn parse_value(path: &Path, line: usize, field: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|_| SimError::parse(path, line, format!("`{field}` is not a number")))
}

/// Parses a whole record of numbers.
pub fn parse_row(path: &Path, line: usize, record: &str) -> Result<Vec<f64>> {
    split_fields(record)
        .into_iter()
        .map(|field| parse_value(path, line, field))
        .collect()
}

/// Reads a file of numeric records, all of the same width.
pub fn parse_matrix(path: &Path, text: &str) -> Result<Vec<Vec<f64>>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line, record) in content_lines(text) {
        let row = parse_row(path, line, record)?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(SimError::parse(
                    path,
                    line,
                    format!("expected {} values, found {}", first.len(), row.len()),
                ));
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(SimError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}
