//! Error taxonomy for the simulation engine.
//!
//! Two families, both detected before the recurrence starts:
//! - `InputError`: bad price series, target matrix or initial cash
//! - `ConfigError`: bad trade-sizing or scheduling configuration
//!
//! Once a run has passed validation every timestep succeeds; there is no
//! per-cell error path.

use thiserror::Error;

/// Top-level engine error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
}

/// Problems with the data handed to a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("price series is empty")]
    EmptyPrices,
    #[error("price at timestep {index} must be positive and finite, got {price}")]
    NonPositivePrice { index: usize, price: f64 },
    #[error("target matrix has {rows} rows but the price series has {prices} timesteps")]
    DimensionMismatch { prices: usize, rows: usize },
    #[error("target matrix row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("matrix buffer holds {actual} values, expected {rows}x{cols}")]
    BufferSize {
        rows: usize,
        cols: usize,
        actual: usize,
    },
    #[error("target at ({row}, {col}) is not finite")]
    NonFiniteTarget { row: usize, col: usize },
    #[error("initial cash must be positive and finite, got {0}")]
    NonPositiveInitialCash(f64),
    #[error("result shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// Problems with a configuration, caught when it is constructed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown trade mode '{0}' (valid: fixed, cash_all, portfolio_pct, fixed_cash)")]
    UnknownTradeMode(String),
    #[error("max_allocation_pct must be in (0, 1], got {0}")]
    AllocationOutOfRange(f64),
    #[error("fixed_cash_amount must be positive and finite, got {0}")]
    NonPositiveFixedCash(f64),
    #[error("position_size must be positive and finite, got {0}")]
    NonPositivePositionSize(f64),
    #[error("unknown partition '{0}' (valid: serial, per_column, blocks, unrolled, static)")]
    UnknownPartition(String),
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("block size must be at least 1")]
    ZeroBlockSize,
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
