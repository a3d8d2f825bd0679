//! Per-run simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{InputError, SimError};
use crate::sizing::TradeSizing;

/// Default starting cash for every strategy column.
pub const DEFAULT_INITIAL_CASH: f64 = 1_000_000.0;

/// Immutable configuration for one run: starting cash plus the sizing mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    #[serde(flatten)]
    pub sizing: TradeSizing,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            sizing: TradeSizing::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new(initial_cash: f64, sizing: TradeSizing) -> Self {
        Self {
            initial_cash,
            sizing,
        }
    }

    /// Non-positive cash is an input problem; bad sizing parameters are a
    /// configuration problem.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(InputError::NonPositiveInitialCash(self.initial_cash).into());
        }
        self.sizing.validate()?;
        Ok(())
    }
}
