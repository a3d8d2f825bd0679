//! CSV input loading.
//!
//! - Prices: one value per line.
//! - Targets: one row per timestep, one comma-separated column per strategy.
//!
//! Both files may start with a header line; a first line that does not
//! parse as numbers is treated as one and skipped.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use multiweight_core::{InputError, Matrix};

/// Errors from the CSV loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Open { path: PathBuf, source: csv::Error },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: '{value}' is not a number")]
    Parse { line: u64, value: String },

    #[error("{0}")]
    Input(#[from] InputError),
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Open {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    Ok(reader(file))
}

/// Parse every record into a row of numbers, skipping a leading header.
fn parse_rows<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<Vec<f64>>, LoadError> {
    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record.position().map_or(i as u64 + 1, |p| p.line());
        let parsed: Result<Vec<f64>, _> = record.iter().map(str::parse::<f64>).collect();
        match parsed {
            Ok(row) => rows.push(row),
            Err(_) if i == 0 => continue,
            Err(_) => {
                let value = record
                    .iter()
                    .find(|f| f.parse::<f64>().is_err())
                    .unwrap_or_default()
                    .to_string();
                return Err(LoadError::Parse { line, value });
            }
        }
    }
    Ok(rows)
}

pub fn read_prices<R: Read>(rdr: R) -> Result<Vec<f64>, LoadError> {
    prices_from_rows(&parse_rows(reader(rdr))?)
}

pub fn read_targets<R: Read>(rdr: R) -> Result<Matrix, LoadError> {
    let rows = parse_rows(reader(rdr))?;
    Ok(Matrix::from_rows(&rows)?)
}

pub fn load_prices(path: &Path) -> Result<Vec<f64>, LoadError> {
    prices_from_rows(&parse_rows(open(path)?)?)
}

pub fn load_targets(path: &Path) -> Result<Matrix, LoadError> {
    let rows = parse_rows(open(path)?)?;
    Ok(Matrix::from_rows(&rows)?)
}

fn prices_from_rows(rows: &[Vec<f64>]) -> Result<Vec<f64>, LoadError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [price] => Ok(*price),
            _ => Err(InputError::RaggedRow {
                row: i,
                expected: 1,
                actual: row.len(),
            }
            .into()),
        })
        .collect()
}
