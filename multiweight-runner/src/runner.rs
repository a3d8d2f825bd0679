//! Run orchestration: config, data, executor and verification.
//!
//! Two entry points:
//! - `run()`: resolves inputs from a `RunConfig` (synthetic or CSV), then runs. Used by CLI.
//! - `compare_schedules()`: serial vs scheduled on identical input, with wall-clock timings.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use multiweight_core::{
    compare, first_divergence, simulate, EquivalenceReport, Matrix, ParallelExecutor, Partition,
    SimError, SimulationConfig, SimulationResult, DEFAULT_EPSILON,
};

use crate::config::{ConfigError, DataSource, RunConfig, RunId};
use crate::loader::{load_prices, load_targets, LoadError};
use crate::synthetic::{generate, SyntheticSpec};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimError),
}

impl From<multiweight_core::ConfigError> for RunError {
    fn from(e: multiweight_core::ConfigError) -> Self {
        Self::Simulation(e.into())
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Wall-clock time per phase, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Input generation or CSV loading.
    pub load_secs: f64,
    /// Scheduled simulation.
    pub simulate_secs: f64,
    /// Serial reference run, when verification is enabled.
    pub verify_secs: Option<f64>,
}

/// Everything a single run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub config: RunConfig,
    pub workers: usize,
    pub partition: Partition,
    pub result: SimulationResult,
    pub timings: PhaseTimings,
    /// Present when `[execution] verify` is set.
    pub equivalence: Option<EquivalenceReport>,
}

/// Serial vs scheduled on the same input.
#[derive(Debug, Clone)]
pub struct ScheduleComparison {
    pub serial: Duration,
    pub parallel: Duration,
    /// `serial / parallel`.
    pub speedup: f64,
    pub report: EquivalenceReport,
    /// First `(timestep, strategy)` outside `DEFAULT_EPSILON`, if any.
    pub divergence: Option<(usize, usize)>,
}

impl ScheduleComparison {
    pub fn is_equivalent(&self) -> bool {
        self.divergence.is_none()
    }
}

/// Resolve the configured price series and target matrix.
pub fn load_inputs(config: &RunConfig) -> Result<(Vec<f64>, Matrix), RunError> {
    match config.data.source {
        DataSource::Synthetic => {
            let data = generate(&SyntheticSpec::from(&config.data));
            Ok((data.prices, data.targets))
        }
        DataSource::Csv => {
            let prices_path = config
                .data
                .prices_path
                .as_deref()
                .ok_or(ConfigError::MissingPath("prices_path"))?;
            let targets_path = config
                .data
                .targets_path
                .as_deref()
                .ok_or(ConfigError::MissingPath("targets_path"))?;
            Ok((load_prices(prices_path)?, load_targets(targets_path)?))
        }
    }
}

/// Run from a `RunConfig`: load inputs, simulate, optionally cross-check.
pub fn run(config: &RunConfig) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let start = Instant::now();
    let (prices, targets) = load_inputs(config)?;
    let load_secs = start.elapsed().as_secs_f64();
    info!(
        timesteps = prices.len(),
        strategies = targets.cols(),
        source = ?config.data.source,
        secs = load_secs,
        "inputs ready"
    );

    let mut outcome = run_with_data(config, &prices, &targets)?;
    outcome.timings.load_secs = load_secs;
    Ok(outcome)
}

/// Run on pre-loaded inputs. Does no I/O.
pub fn run_with_data(
    config: &RunConfig,
    prices: &[f64],
    targets: &Matrix,
) -> Result<RunOutcome, RunError> {
    let sim_config = config.simulation_config()?;
    let executor = config.executor()?;
    let run_id = config.run_id();

    let start = Instant::now();
    let result = executor.run(prices, targets, &sim_config)?;
    let simulate_secs = start.elapsed().as_secs_f64();
    let short_id = &run_id[..run_id.len().min(12)];
    info!(
        run_id = short_id,
        workers = executor.workers(),
        partition = %executor.partition(),
        mode = %sim_config.sizing.mode(),
        secs = simulate_secs,
        "simulation complete"
    );

    let (equivalence, verify_secs) = if config.execution.verify {
        let start = Instant::now();
        let reference = simulate(prices, targets, &sim_config)?;
        let secs = start.elapsed().as_secs_f64();
        let report = compare(&reference, &result)?;
        log_report(&report, &reference, &result);
        (Some(report), Some(secs))
    } else {
        (None, None)
    };

    Ok(RunOutcome {
        run_id,
        config: config.clone(),
        workers: executor.workers(),
        partition: executor.partition(),
        result,
        timings: PhaseTimings {
            load_secs: 0.0,
            simulate_secs,
            verify_secs,
        },
        equivalence,
    })
}

/// Time the serial engine against a scheduled executor on identical input.
pub fn compare_schedules(
    prices: &[f64],
    targets: &Matrix,
    config: &SimulationConfig,
    partition: Partition,
    workers: usize,
) -> Result<ScheduleComparison, RunError> {
    let executor = ParallelExecutor::new(workers, partition)?;

    let start = Instant::now();
    let serial_result = simulate(prices, targets, config)?;
    let serial = start.elapsed();

    let start = Instant::now();
    let parallel_result = executor.run(prices, targets, config)?;
    let parallel = start.elapsed();

    let report = compare(&serial_result, &parallel_result)?;
    log_report(&report, &serial_result, &parallel_result);
    let speedup = serial.as_secs_f64() / parallel.as_secs_f64().max(f64::MIN_POSITIVE);
    info!(
        serial_ms = serial.as_secs_f64() * 1e3,
        parallel_ms = parallel.as_secs_f64() * 1e3,
        speedup,
        "schedule comparison"
    );

    Ok(ScheduleComparison {
        serial,
        parallel,
        speedup,
        report,
        divergence: first_divergence(&serial_result, &parallel_result, DEFAULT_EPSILON),
    })
}

fn log_report(report: &EquivalenceReport, reference: &SimulationResult, other: &SimulationResult) {
    if report.is_within(DEFAULT_EPSILON) {
        info!(
            cash = report.cash,
            position = report.position,
            value = report.value,
            "serial and scheduled results agree"
        );
    } else {
        warn!(
            cash = report.cash,
            position = report.position,
            value = report.value,
            first = ?first_divergence(reference, other, DEFAULT_EPSILON),
            "serial and scheduled results diverge"
        );
    }
}
