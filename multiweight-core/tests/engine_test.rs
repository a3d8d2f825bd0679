//! Integration tests for the recurrence.
//!
//! Tests:
//! 1. Worked scenarios for each sizing mode
//! 2. Value identity: value == cash + held * price at every cell
//! 3. Hold / liquidation / affordability behaviour across rows
//! 4. Validation happens before any output exists

use multiweight_core::{
    position_changes, simulate, InputError, Matrix, ParallelExecutor, Partition, SimError,
    SimulationConfig, TradeSizing,
};

fn single_column(targets: &[f64]) -> Matrix {
    Matrix::column_vector(targets)
}

// ── 1. Worked scenarios ──────────────────────────────────────────────

#[test]
fn fixed_mode_buys_then_liquidates() {
    let config = SimulationConfig::new(100.0, TradeSizing::fixed(5.0).unwrap());
    let result = simulate(&[10.0, 12.0, 8.0], &single_column(&[0.0, 1.0, 0.0]), &config).unwrap();

    assert_eq!(result.cash.column(0).collect::<Vec<_>>(), vec![100.0, 40.0, 80.0]);
    assert_eq!(result.position.column(0).collect::<Vec<_>>(), vec![0.0, 5.0, 0.0]);
    assert_eq!(result.value.column(0).collect::<Vec<_>>(), vec![100.0, 100.0, 80.0]);
}

#[test]
fn portfolio_pct_caps_first_buy() {
    let config = SimulationConfig::new(1000.0, TradeSizing::portfolio_pct(0.5).unwrap());
    let result = simulate(&[100.0, 100.0], &single_column(&[0.0, 1.0]), &config).unwrap();

    assert_eq!(result.cash[(1, 0)], 500.0);
    assert_eq!(result.position[(1, 0)], 5.0);
    assert_eq!(result.value[(1, 0)], 1000.0);
}

#[test]
fn cash_all_with_insufficient_cash_buys_nothing() {
    let config = SimulationConfig::new(5.0, TradeSizing::CashAll);
    let result = simulate(&[10.0, 10.0], &single_column(&[0.0, 1.0]), &config).unwrap();

    assert_eq!(result.cash[(1, 0)], 5.0);
    assert_eq!(result.position[(1, 0)], 0.0);
    assert_eq!(result.value[(1, 0)], 5.0);
}

#[test]
fn zero_price_fails_before_producing_output() {
    let config = SimulationConfig::default();
    let targets = single_column(&[0.0, 1.0, 0.0]);
    let err = simulate(&[10.0, 0.0, 8.0], &targets, &config).unwrap_err();
    assert_eq!(
        err,
        SimError::InvalidInput(InputError::NonPositivePrice {
            index: 1,
            price: 0.0
        })
    );

    let executor = ParallelExecutor::new(2, Partition::Static).unwrap();
    assert!(matches!(
        executor.run(&[10.0, 0.0, 8.0], &targets, &config),
        Err(SimError::InvalidInput(_))
    ));
}

#[test]
fn fixed_cash_sizes_from_budget() {
    let config = SimulationConfig::new(10_000.0, TradeSizing::fixed_cash(250.0).unwrap());
    let result = simulate(&[50.0, 40.0], &single_column(&[0.0, 1.0]), &config).unwrap();

    // floor(250 / 40) = 6 lots
    assert_eq!(result.position[(1, 0)], 6.0);
    assert_eq!(result.cash[(1, 0)], 10_000.0 - 240.0);
}

// ── 2. Value identity ────────────────────────────────────────────────

#[test]
fn value_is_cash_plus_marked_position_everywhere() {
    let prices = [20.0, 21.5, 19.0, 22.0, 23.5, 18.0, 25.0];
    let targets = Matrix::from_rows(&[
        [0.0, 1.0, -1.0],
        [1.0, 1.0, 0.0],
        [1.0, 0.0, 1.0],
        [2.0, 1.0, 1.0],
        [0.0, 1.0, 2.0],
        [1.0, -1.0, 0.0],
        [1.0, 0.0, 1.0],
    ])
    .unwrap();
    let config = SimulationConfig::new(1_000.0, TradeSizing::portfolio_pct(0.3).unwrap());
    let result = simulate(&prices, &targets, &config).unwrap();

    for (t, &price) in prices.iter().enumerate() {
        for w in 0..targets.cols() {
            let state = result.state(t, w);
            assert_eq!(result.value[(t, w)], state.cash + state.held * price);
            assert!(state.cash >= 0.0);
            assert!(state.held >= 0.0);
        }
    }
}

// ── 3. Row-to-row behaviour ──────────────────────────────────────────

#[test]
fn unchanged_target_carries_state_forward() {
    let config = SimulationConfig::new(100.0, TradeSizing::fixed(2.0).unwrap());
    let result = simulate(
        &[10.0, 10.0, 50.0, 1.0],
        &single_column(&[0.0, 1.0, 1.0, 1.0]),
        &config,
    )
    .unwrap();

    assert_eq!(result.cash.column(0).collect::<Vec<_>>(), vec![100.0, 80.0, 80.0, 80.0]);
    assert_eq!(result.position.column(0).collect::<Vec<_>>(), vec![0.0, 2.0, 2.0, 2.0]);
    // Value still marks to the current price
    assert_eq!(result.value[(2, 0)], 180.0);
    assert_eq!(result.value[(3, 0)], 82.0);
}

#[test]
fn partial_decrease_liquidates_whole_holding() {
    let config = SimulationConfig::new(1_000.0, TradeSizing::fixed(3.0).unwrap());
    let result = simulate(
        &[10.0, 10.0, 10.0, 15.0],
        &single_column(&[0.0, 1.0, 2.0, 1.5]),
        &config,
    )
    .unwrap();

    assert_eq!(result.position[(2, 0)], 6.0);
    assert_eq!(result.position[(3, 0)], 0.0);
    assert_eq!(result.cash[(3, 0)], 1_000.0 - 60.0 + 90.0);
}

#[test]
fn selling_flat_column_is_a_no_op() {
    let config = SimulationConfig::new(100.0, TradeSizing::CashAll);
    let result = simulate(&[10.0, 10.0], &single_column(&[1.0, -1.0]), &config).unwrap();
    assert_eq!(result.state(1, 0).cash, 100.0);
    assert_eq!(result.state(1, 0).held, 0.0);
}

#[test]
fn repeated_buys_stop_when_cash_runs_out() {
    let config = SimulationConfig::new(100.0, TradeSizing::fixed(4.0).unwrap());
    let result = simulate(
        &[10.0, 10.0, 10.0, 10.0],
        &single_column(&[0.0, 1.0, 2.0, 3.0]),
        &config,
    )
    .unwrap();

    assert_eq!(result.position.column(0).collect::<Vec<_>>(), vec![0.0, 4.0, 8.0, 10.0]);
    assert_eq!(result.cash[(3, 0)], 0.0);
}

#[test]
fn columns_are_independent() {
    let prices = [10.0, 11.0, 9.0, 12.0];
    let both = Matrix::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
    let config = SimulationConfig::new(500.0, TradeSizing::CashAll);

    let joint = simulate(&prices, &both, &config).unwrap();
    for w in 0..2 {
        let alone = simulate(
            &prices,
            &Matrix::column_vector(&both.column(w).collect::<Vec<_>>()),
            &config,
        )
        .unwrap();
        assert_eq!(
            joint.value.column(w).collect::<Vec<_>>(),
            alone.value.column(0).collect::<Vec<_>>()
        );
    }
}

#[test]
fn position_changes_first_row_is_the_target() {
    let targets = Matrix::from_rows(&[[1.0, -1.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
    let changes = position_changes(&targets);
    assert_eq!(changes.row(0), &[1.0, -1.0]);
    assert_eq!(changes.row(1), &[0.0, 1.0]);
    assert_eq!(changes.row(2), &[-1.0, 1.0]);
}

// ── 4. Validation ────────────────────────────────────────────────────

#[test]
fn mismatched_rows_rejected() {
    let err = simulate(
        &[1.0, 2.0, 3.0],
        &Matrix::zeros(2, 4),
        &SimulationConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        SimError::InvalidInput(InputError::DimensionMismatch { prices: 3, rows: 2 })
    ));
}

#[test]
fn invalid_sizing_rejected_as_configuration() {
    let config = SimulationConfig::new(
        100.0,
        TradeSizing::PortfolioPct {
            max_allocation_pct: 0.0,
        },
    );
    let err = simulate(&[1.0, 2.0], &Matrix::zeros(2, 1), &config).unwrap_err();
    assert!(matches!(err, SimError::InvalidConfiguration(_)));
}
