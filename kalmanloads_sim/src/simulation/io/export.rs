// kalmanloads_sim/src/simulation/io/export.rs

use std::fs;
use std::path::Path;

use crate::error::{Result, SimError};
use crate::simulation::io::delimited::{content_lines, parse_row, split_fields};

/// Named, equally long columns of a results file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Every column must have the length of the first one.
    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if let Some(first) = self.columns.first() {
            if values.len() != first.len() {
                return Err(SimError::InvalidOption {
                    name: "results column",
                    reason: format!(
                        "`{name}` has {} rows, expected {}",
                        values.len(),
                        first.len()
                    ),
                });
            }
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }
}

/// Writes `table` as comma-separated text (no padding) with a single
/// `# `-prefixed header.
///
/// Values use Rust's shortest round-trip scientific notation, so
/// [`read_results`] reproduces every value exactly.
pub fn write_results(path: &Path, table: &ResultsTable) -> Result<()> {
    let mut lines = Vec::with_capacity(table.n_rows() + 1);
    lines.push(format!("# {}", table.names.join(",")));
    for row in 0..table.n_rows() {
        let values: Vec<String> = table
            .columns
            .iter()
            .map(|column| format!("{:e}", column[row]))
            .collect();
        lines.push(values.join(","));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| SimError::io(dir, e))?;
    }
    fs::write(path, out).map_err(|e| SimError::io(path, e))?;
    log::info!(
        "Results written to `{}` ({} columns, {} rows)",
        path.display(),
        table.names.len(),
        table.n_rows()
    );
    Ok(())
}

/// Reads a file produced by [`write_results`].
pub fn read_results(path: &Path) -> Result<ResultsTable> {
    let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let header = text
        .lines()
        .next()
        .and_then(|l| l.strip_prefix('#'))
        .ok_or_else(|| SimError::parse(path, 1, "missing `#` header line"))?;

    let mut table = ResultsTable::new();
    let names: Vec<String> = split_fields(header.trim())
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    // The header is a comment line, so only data records remain.
    for (line, record) in content_lines(&text) {
        let row = parse_row(path, line, record)?;
        if row.len() != names.len() {
            return Err(SimError::parse(
                path,
                line,
                format!("expected {} values, found {}", names.len(), row.len()),
            ));
        }
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }
    for (name, values) in names.into_iter().zip(columns) {
        table.push(name, values)?;
    }
    Ok(table)
}
