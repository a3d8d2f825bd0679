//! Multiweight Runner: run orchestration on top of `multiweight-core`.
//!
//! This crate provides:
//! - TOML run configuration with content-addressed run ids
//! - Seeded synthetic prices and targets
//! - CSV loading of prices and target matrices
//! - Artifact export (matrix CSVs + JSON manifest)
//! - Serial vs scheduled timing and equivalence comparison

pub mod config;
pub mod export;
pub mod loader;
pub mod runner;
pub mod synthetic;

pub use config::{ConfigError, DataSource, RunConfig, RunId};
pub use export::{export_matrix_csv, save_artifacts, save_inputs, Manifest};
pub use loader::{load_prices, load_targets, LoadError};
pub use runner::{
    compare_schedules, load_inputs, run, run_with_data, PhaseTimings, RunError, RunOutcome,
    ScheduleComparison, SCHEMA_VERSION,
};
pub use synthetic::{generate, SyntheticData, SyntheticSpec};
