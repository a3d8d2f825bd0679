//! Artifact export: matrix CSVs and a JSON manifest.
//!
//! Matrices are written without a header, one timestep per line and one
//! strategy per column, so they load straight back through `loader`.
//! The manifest carries a `schema_version`; unknown versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use multiweight_core::{EquivalenceReport, Matrix, SimulationResult};

use crate::config::RunConfig;
use crate::runner::{PhaseTimings, RunOutcome, SCHEMA_VERSION};

// ─── CSV export ─────────────────────────────────────────────────────

/// Rows separated by newlines, columns by commas. Full `f64` precision.
pub fn export_matrix_csv(matrix: &Matrix) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(vec![]);
    for row in matrix.iter_rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One price per line.
pub fn export_prices_csv(prices: &[f64]) -> Result<String> {
    export_matrix_csv(&Matrix::column_vector(prices))
}

// ─── Manifest ───────────────────────────────────────────────────────

/// Everything needed to identify and reproduce a run, minus the matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub created_at: String,
    pub timesteps: usize,
    pub strategies: usize,
    pub workers: usize,
    pub partition: String,
    pub config: RunConfig,
    pub timings: PhaseTimings,
    pub equivalence: Option<EquivalenceReport>,
    pub final_value_mean: f64,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Manifest {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let finals = outcome.result.final_values();
        let final_value_mean = if finals.is_empty() {
            0.0
        } else {
            finals.iter().sum::<f64>() / finals.len() as f64
        };
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: outcome.run_id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            timesteps: outcome.result.timesteps(),
            strategies: outcome.result.strategies(),
            workers: outcome.workers,
            partition: outcome.partition.to_string(),
            config: outcome.config.clone(),
            timings: outcome.timings,
            equivalence: outcome.equivalence,
            final_value_mean,
        }
    }
}

pub fn export_manifest(manifest: &Manifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize manifest to JSON")
}

pub fn import_manifest(json: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_str(json).context("failed to deserialize manifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write_matrices(result: &SimulationResult, dir: &Path) -> Result<()> {
    for (name, matrix) in [
        ("cash.csv", &result.cash),
        ("position.csv", &result.position),
        ("value.csv", &result.value),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, export_matrix_csv(matrix)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Save the artifact set for a run.
///
/// Creates `{run_id[..12]}_{timestamp}/` under `output_dir` containing:
/// - `manifest.json`
/// - `cash.csv`, `position.csv`, `value.csv` when `dump_csv` is set
///
/// Returns the path to the created directory.
pub fn save_artifacts(outcome: &RunOutcome, output_dir: &Path, dump_csv: bool) -> Result<PathBuf> {
    let prefix: String = outcome.run_id.chars().take(12).collect();
    let dirname = format!(
        "{}_{}",
        prefix,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let manifest = export_manifest(&Manifest::from_outcome(outcome))?;
    std::fs::write(run_dir.join("manifest.json"), manifest)?;

    if dump_csv {
        write_matrices(&outcome.result, &run_dir)?;
    }
    Ok(run_dir)
}

/// Write `prices.csv` and `targets.csv` into `output_dir`.
pub fn save_inputs(prices: &[f64], targets: &Matrix, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let prices_path = output_dir.join("prices.csv");
    let targets_path = output_dir.join("targets.csv");
    std::fs::write(&prices_path, export_prices_csv(prices)?)?;
    std::fs::write(&targets_path, export_matrix_csv(targets)?)?;
    Ok((prices_path, targets_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_csv_layout() {
        let m = Matrix::from_rows(&[[1.0, 2.5], [-1.0, 0.0]]).unwrap();
        assert_eq!(export_matrix_csv(&m).unwrap(), "1,2.5\n-1,0\n");
    }

    #[test]
    fn matrix_csv_keeps_full_precision() {
        let m = Matrix::column_vector(&[0.1 + 0.2]);
        let text = export_matrix_csv(&m).unwrap();
        assert_eq!(text.trim().parse::<f64>().unwrap(), 0.1 + 0.2);
    }

    #[test]
    fn empty_matrix_is_empty_csv() {
        assert_eq!(export_matrix_csv(&Matrix::zeros(0, 3)).unwrap(), "");
    }

    #[test]
    fn future_schema_rejected() {
        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            run_id: "abc".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
            timesteps: 3,
            strategies: 2,
            workers: 1,
            partition: "serial".into(),
            config: RunConfig::default(),
            timings: PhaseTimings::default(),
            equivalence: None,
            final_value_mean: 0.0,
        };
        let json = export_manifest(&manifest).unwrap();
        assert_eq!(import_manifest(&json).unwrap().run_id, "abc");

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
        let err = import_manifest(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }
}
