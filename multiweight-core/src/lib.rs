//! Multiweight Core: trade sizing, cash/position recurrence, column-parallel scheduling.
//!
//! This crate contains the simulation engine:
//! - Dense row-major matrices and the position-change (row difference) utility
//! - Four trade-sizing modes behind a single clamping rule
//! - The per-column state recurrence producing cash, position and value
//! - A worker-pool schedule that splits each timestep by column
//! - An equivalence check between two schedules

pub mod config;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod matrix;
pub mod parallel;
pub mod sizing;

pub use config::{SimulationConfig, DEFAULT_INITIAL_CASH};
pub use engine::{simulate, validate_inputs, ColumnState, SimulationResult};
pub use equivalence::{compare, first_divergence, EquivalenceReport, DEFAULT_EPSILON};
pub use error::{ConfigError, InputError, SimError};
pub use matrix::{position_changes, Matrix};
pub use parallel::{ParallelExecutor, Partition, DEFAULT_BLOCK_SIZE};
pub use sizing::{TradeMode, TradeSizing};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed across worker threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Matrix>();
        require_sync::<Matrix>();
        require_send::<SimulationConfig>();
        require_sync::<SimulationConfig>();
        require_send::<SimulationResult>();
        require_sync::<SimulationResult>();
        require_send::<ParallelExecutor>();
        require_sync::<ParallelExecutor>();
        require_send::<EquivalenceReport>();
        require_sync::<EquivalenceReport>();
        require_send::<SimError>();
        require_sync::<SimError>();
    }

    /// The sizing rules are shared by reference across workers inside one
    /// timestep; the trait bound enforces that they can be.
    #[test]
    fn sizing_rules_are_shareable() {
        fn shareable<R: sizing::SizingRule>(_: R) {}
        shareable(sizing::FixedQuantity { position_size: 1.0 });
        shareable(sizing::CashAll);
        shareable(sizing::PortfolioPct {
            max_allocation_pct: 0.5,
        });
        shareable(sizing::FixedCash {
            fixed_cash_amount: 1.0,
        });
    }
}
