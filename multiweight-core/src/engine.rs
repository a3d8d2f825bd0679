//! Cash / position / value recurrence.
//!
//! Each strategy column is an independent state machine over `{cash, held}`:
//!
//! 1. Inherit row t-1
//! 2. Target change > 0: buy the clamped sizing quantity at price(t)
//! 3. Target change < 0: liquidate the entire previous holding at price(t)
//! 4. Target change == 0: hold
//! 5. value = cash + held * price(t)
//!
//! Row 0 is initialized directly to `(initial_cash, 0, initial_cash)`.
//! Row t reads only row t-1 of the same column, so columns never interact.
//! The schedule in `parallel` relies on that.

use tracing::debug;

use crate::config::SimulationConfig;
use crate::error::{InputError, Result};
use crate::matrix::{position_changes, Matrix};
use crate::sizing::{buy_quantity, RuleFn, SizingRule};

/// Snapshot of one strategy column at one timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnState {
    pub cash: f64,
    pub held: f64,
}

impl ColumnState {
    pub fn initial(cash: f64) -> Self {
        Self { cash, held: 0.0 }
    }

    #[inline]
    pub fn value(&self, price: f64) -> f64 {
        self.cash + self.held * price
    }

    /// Pure transition from row t-1 to row t.
    ///
    /// Any decrease in target liquidates the full previous holding,
    /// regardless of how large the decrease is.
    #[inline]
    pub fn step<R: SizingRule>(self, price: f64, change: f64, rule: &R) -> Self {
        if change > 0.0 {
            let quantity = buy_quantity(rule, self.cash, self.held, price);
            Self {
                cash: self.cash - quantity * price,
                held: self.held + quantity,
            }
        } else if change < 0.0 {
            Self {
                cash: self.cash + self.held * price,
                held: 0.0,
            }
        } else {
            self
        }
    }
}

/// The three T x W output matrices of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub cash: Matrix,
    pub position: Matrix,
    pub value: Matrix,
}

impl SimulationResult {
    /// Allocate output matrices with row 0 set to `(initial_cash, 0, initial_cash)`.
    pub fn allocate(timesteps: usize, strategies: usize, initial_cash: f64) -> Self {
        let mut cash = Matrix::zeros(timesteps, strategies);
        let position = Matrix::zeros(timesteps, strategies);
        let mut value = Matrix::zeros(timesteps, strategies);
        if timesteps > 0 {
            cash.row_mut(0).fill(initial_cash);
            value.row_mut(0).fill(initial_cash);
        }
        Self {
            cash,
            position,
            value,
        }
    }

    pub fn timesteps(&self) -> usize {
        self.cash.rows()
    }

    pub fn strategies(&self) -> usize {
        self.cash.cols()
    }

    pub fn state(&self, t: usize, w: usize) -> ColumnState {
        ColumnState {
            cash: self.cash[(t, w)],
            held: self.position[(t, w)],
        }
    }

    /// Portfolio value of every strategy at the last timestep.
    pub fn final_values(&self) -> &[f64] {
        match self.timesteps() {
            0 => &[],
            t => self.value.row(t - 1),
        }
    }
}

/// Reject anything that would make the recurrence undefined.
///
/// Runs before any output is allocated; a failing run produces nothing.
pub fn validate_inputs(prices: &[f64], targets: &Matrix, config: &SimulationConfig) -> Result<()> {
    config.validate()?;
    if prices.is_empty() {
        return Err(InputError::EmptyPrices.into());
    }
    if let Some((index, &price)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
        return Err(InputError::NonPositivePrice { index, price }.into());
    }
    if targets.rows() != prices.len() {
        return Err(InputError::DimensionMismatch {
            prices: prices.len(),
            rows: targets.rows(),
        }
        .into());
    }
    if let Some(i) = targets.as_slice().iter().position(|v| !v.is_finite()) {
        let cols = targets.cols();
        return Err(InputError::NonFiniteTarget {
            row: i / cols,
            col: i % cols,
        }
        .into());
    }
    Ok(())
}

/// Run the whole simulation on the calling thread.
pub fn simulate(
    prices: &[f64],
    targets: &Matrix,
    config: &SimulationConfig,
) -> Result<SimulationResult> {
    validate_inputs(prices, targets, config)?;
    debug!(
        timesteps = prices.len(),
        strategies = targets.cols(),
        mode = %config.sizing.mode(),
        "running serial simulation"
    );
    let changes = position_changes(targets);
    let mut result = SimulationResult::allocate(prices.len(), targets.cols(), config.initial_cash);
    config.sizing.with_rule(SerialPass {
        prices,
        changes: &changes,
        result: &mut result,
    });
    Ok(result)
}

struct SerialPass<'a> {
    prices: &'a [f64],
    changes: &'a Matrix,
    result: &'a mut SimulationResult,
}

impl RuleFn for SerialPass<'_> {
    type Output = ();

    fn call<R: SizingRule>(self, rule: R) {
        run_recurrence(self.prices, self.changes, self.result, |row| {
            advance_block(row, &rule)
        });
    }
}

/// Borrowed view of one timestep: row t-1 inputs and row t outputs for a
/// contiguous range of columns.
pub(crate) struct RowView<'a> {
    pub price: f64,
    pub changes: &'a [f64],
    pub prev_cash: &'a [f64],
    pub prev_held: &'a [f64],
    pub cash: &'a mut [f64],
    pub held: &'a mut [f64],
    pub value: &'a mut [f64],
}

impl RowView<'_> {
    #[inline(always)]
    fn cell<R: SizingRule>(&mut self, w: usize, rule: &R) {
        let prev = ColumnState {
            cash: self.prev_cash[w],
            held: self.prev_held[w],
        };
        let next = prev.step(self.price, self.changes[w], rule);
        self.cash[w] = next.cash;
        self.held[w] = next.held;
        self.value[w] = next.value(self.price);
    }
}

/// Walk timesteps 1..T in order, handing each row to `advance`.
///
/// `advance` must finish writing row t before it returns; the next call
/// reads it as row t-1.
pub(crate) fn run_recurrence<F>(
    prices: &[f64],
    changes: &Matrix,
    result: &mut SimulationResult,
    mut advance: F,
) where
    F: FnMut(RowView<'_>),
{
    for t in 1..prices.len() {
        let (prev_cash, cash) = result.cash.split_rows_mut(t);
        let (prev_held, held) = result.position.split_rows_mut(t);
        let value = result.value.row_mut(t);
        advance(RowView {
            price: prices[t],
            changes: changes.row(t),
            prev_cash,
            prev_held,
            cash,
            held,
            value,
        });
    }
}

#[inline]
pub(crate) fn advance_block<R: SizingRule>(mut row: RowView<'_>, rule: &R) {
    for w in 0..row.cash.len() {
        row.cell(w, rule);
    }
}

/// Same as `advance_block`, four columns per iteration.
#[inline]
pub(crate) fn advance_block_unrolled<R: SizingRule>(mut row: RowView<'_>, rule: &R) {
    let n = row.cash.len();
    let mut w = 0;
    while w + 4 <= n {
        row.cell(w, rule);
        row.cell(w + 1, rule);
        row.cell(w + 2, rule);
        row.cell(w + 3, rule);
        w += 4;
    }
    while w < n {
        row.cell(w, rule);
        w += 1;
    }
}
