//! Cross-schedule consistency check.
//!
//! Compares two result sets cell by cell and reports the largest absolute
//! difference per output matrix. A difference above epsilon means two
//! schedules disagreed, which is an implementation bug; callers surface it
//! as a test failure or a warning, never as a runtime error path.

use serde::{Deserialize, Serialize};

use crate::engine::SimulationResult;
use crate::error::{InputError, Result};
use crate::matrix::Matrix;

/// Tolerance for `f64` outputs. Identical per-cell arithmetic gives 0.0;
/// anything visible at this scale is algorithmic divergence.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Maximum absolute per-cell difference for each output matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceReport {
    pub cash: f64,
    pub position: f64,
    pub value: f64,
}

impl EquivalenceReport {
    pub fn max_abs_diff(&self) -> f64 {
        self.cash.max(self.position).max(self.value)
    }

    pub fn is_within(&self, epsilon: f64) -> bool {
        self.cash <= epsilon && self.position <= epsilon && self.value <= epsilon
    }
}

/// Compare two runs over the same input.
pub fn compare(a: &SimulationResult, b: &SimulationResult) -> Result<EquivalenceReport> {
    Ok(EquivalenceReport {
        cash: max_abs_diff(&a.cash, &b.cash)?,
        position: max_abs_diff(&a.position, &b.position)?,
        value: max_abs_diff(&a.value, &b.value)?,
    })
}

/// Largest `|a - b|` over all cells. NaN in either input counts as infinite.
pub fn max_abs_diff(a: &Matrix, b: &Matrix) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(InputError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        }
        .into());
    }
    Ok(a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| {
            let d = (x - y).abs();
            if d.is_nan() {
                f64::INFINITY
            } else {
                d
            }
        })
        .fold(0.0, f64::max))
}

/// First `(timestep, strategy)` whose cash, position or value differ by more
/// than `epsilon`, scanning timestep by timestep.
pub fn first_divergence(
    a: &SimulationResult,
    b: &SimulationResult,
    epsilon: f64,
) -> Option<(usize, usize)> {
    if a.cash.shape() != b.cash.shape() {
        return Some((0, 0));
    }
    let (rows, cols) = a.cash.shape();
    (0..rows)
        .flat_map(|t| (0..cols).map(move |w| (t, w)))
        .find(|&(t, w)| {
            [
                (&a.cash, &b.cash),
                (&a.position, &b.position),
                (&a.value, &b.value),
            ]
            .iter()
            .any(|(x, y)| match (x.get(t, w), y.get(t, w)) {
                (Some(x), Some(y)) => !((x - y).abs() <= epsilon),
                _ => true,
            })
        })
}
