//! Column-parallel scheduling of the recurrence.
//!
//! Time is strictly sequential: row t reads row t-1 of the same column.
//! Strategies are independent, so within one timestep the row is split into
//! disjoint column blocks and each block is advanced on the worker pool.
//! The parallel section for row t returns only after every block has been
//! written, which is the barrier before row t+1.
//!
//! Blocks are carved out of the output rows with `par_chunks_mut`, so every
//! cell has exactly one writer and no locking or atomics are needed.
//! Partitioning never changes the arithmetic performed per cell; any
//! partition produces bit-identical output.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SimulationConfig;
use crate::engine::{
    advance_block, advance_block_unrolled, run_recurrence, validate_inputs, RowView,
    SimulationResult,
};
use crate::error::{ConfigError, Result};
use crate::matrix::{position_changes, Matrix};
use crate::sizing::{RuleFn, SizingRule};

/// Default block width for `Blocks` / `Unrolled` partitions.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// How the columns of one timestep are split across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partition {
    /// Whole row on the calling thread.
    Serial,
    /// One column per task; rayon coalesces adjacent columns as it splits.
    PerColumn,
    /// Contiguous blocks of `size` columns.
    Blocks { size: usize },
    /// Contiguous blocks of `size` columns, inner loop unrolled by four.
    Unrolled { size: usize },
    /// One contiguous block per worker, fixed before the loop starts.
    Static,
}

impl Default for Partition {
    fn default() -> Self {
        Self::Static
    }
}

impl Partition {
    /// Build from a name and block size as found in configuration files.
    pub fn from_parts(name: &str, block_size: usize) -> std::result::Result<Self, ConfigError> {
        let partition = match name {
            "serial" => Self::Serial,
            "per_column" => Self::PerColumn,
            "blocks" => Self::Blocks { size: block_size },
            "unrolled" => Self::Unrolled { size: block_size },
            "static" => Self::Static,
            other => return Err(ConfigError::UnknownPartition(other.to_string())),
        };
        partition.validate()?;
        Ok(partition)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::PerColumn => "per_column",
            Self::Blocks { .. } => "blocks",
            Self::Unrolled { .. } => "unrolled",
            Self::Static => "static",
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self {
            Self::Blocks { size: 0 } | Self::Unrolled { size: 0 } => Err(ConfigError::ZeroBlockSize),
            _ => Ok(()),
        }
    }

    /// Columns per task for a row of `cols` columns on `workers` threads.
    pub fn block_size(&self, cols: usize, workers: usize) -> usize {
        let size = match *self {
            Self::Serial => cols,
            Self::PerColumn => 1,
            Self::Blocks { size } | Self::Unrolled { size } => size,
            Self::Static => cols.div_ceil(workers.max(1)),
        };
        size.max(1)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks { size } | Self::Unrolled { size } => {
                write!(f, "{}({size})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for Partition {
    type Err = ConfigError;

    /// Accepts a bare name (`blocks` uses the default block size) or
    /// `name:size`, e.g. `unrolled:128`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, size)) => {
                let size = size
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ConfigError::UnknownPartition(s.to_string()))?;
                Self::from_parts(name.trim(), size)
            }
            None => Self::from_parts(s.trim(), DEFAULT_BLOCK_SIZE),
        }
    }
}

/// Runs simulations on a private worker pool with a fixed partition.
///
/// The pool is owned by the executor rather than taken from rayon's global
/// pool, so the worker count is exactly what the caller asked for.
pub struct ParallelExecutor {
    pool: Option<ThreadPool>,
    workers: usize,
    partition: Partition,
}

impl fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("workers", &self.workers)
            .field("partition", &self.partition)
            .finish()
    }
}

impl ParallelExecutor {
    pub fn new(workers: usize, partition: Partition) -> std::result::Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        partition.validate()?;
        let pool = if partition == Partition::Serial {
            None
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("multiweight-worker-{i}"))
                .build()
                .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;
            Some(pool)
        };
        Ok(Self {
            pool,
            workers,
            partition,
        })
    }

    /// Single-threaded executor; output is the reference for equivalence checks.
    pub fn serial() -> Self {
        Self {
            pool: None,
            workers: 1,
            partition: Partition::Serial,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Validate, allocate, and run all timesteps.
    pub fn run(
        &self,
        prices: &[f64],
        targets: &Matrix,
        config: &SimulationConfig,
    ) -> Result<SimulationResult> {
        validate_inputs(prices, targets, config)?;
        let block = self.partition.block_size(targets.cols(), self.workers);
        debug!(
            timesteps = prices.len(),
            strategies = targets.cols(),
            workers = self.workers,
            partition = %self.partition,
            block,
            mode = %config.sizing.mode(),
            "running scheduled simulation"
        );
        let changes = position_changes(targets);
        let mut result =
            SimulationResult::allocate(prices.len(), targets.cols(), config.initial_cash);
        config.sizing.with_rule(ScheduledPass {
            executor: self,
            block,
            prices,
            changes: &changes,
            result: &mut result,
        });
        Ok(result)
    }
}

struct ScheduledPass<'a> {
    executor: &'a ParallelExecutor,
    block: usize,
    prices: &'a [f64],
    changes: &'a Matrix,
    result: &'a mut SimulationResult,
}

impl RuleFn for ScheduledPass<'_> {
    type Output = ();

    fn call<R: SizingRule>(self, rule: R) {
        let block = self.block;
        let unrolled = matches!(self.executor.partition, Partition::Unrolled { .. });
        let Some(pool) = self.executor.pool.as_ref() else {
            run_recurrence(self.prices, self.changes, self.result, |row| {
                advance_block(row, &rule)
            });
            return;
        };
        run_recurrence(self.prices, self.changes, self.result, |row| {
            pool.install(|| advance_row_parallel(row, block, unrolled, &rule))
        });
    }
}

/// Split one row into column blocks and advance them in parallel.
///
/// Returns once every block is written.
fn advance_row_parallel<R: SizingRule>(row: RowView<'_>, block: usize, unrolled: bool, rule: &R) {
    let RowView {
        price,
        changes,
        prev_cash,
        prev_held,
        cash,
        held,
        value,
    } = row;
    cash.par_chunks_mut(block)
        .zip(held.par_chunks_mut(block))
        .zip(value.par_chunks_mut(block))
        .zip(prev_cash.par_chunks(block))
        .zip(prev_held.par_chunks(block))
        .zip(changes.par_chunks(block))
        .for_each(|(((((cash, held), value), prev_cash), prev_held), changes)| {
            let view = RowView {
                price,
                changes,
                prev_cash,
                prev_held,
                cash,
                held,
                value,
            };
            if unrolled {
                advance_block_unrolled(view, rule);
            } else {
                advance_block(view, rule);
            }
        });
}
