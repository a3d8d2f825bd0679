//! End-to-end runner tests: config → data → simulate → artifacts.
//!
//! Tests:
//! 1. Artifact bundle layout and CSV round-trip through the loader
//! 2. CSV-sourced runs reproduce synthetic runs on the same data
//! 3. Config files on disk
//! 4. Scheduled runs agree with serial across trade modes

use std::path::Path;

use multiweight_core::{Partition, SimulationConfig, TradeMode, TradeSizing};
use multiweight_runner::export::import_manifest;
use multiweight_runner::{
    compare_schedules, generate, load_prices, load_targets, run, save_artifacts, save_inputs,
    DataSource, RunConfig, RunError, SyntheticSpec,
};

fn small_config(dir: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.data.timesteps = 40;
    config.data.strategies = 6;
    config.execution.workers = 2;
    config.output.dir = dir.to_path_buf();
    config
}

// ── 1. Artifacts ─────────────────────────────────────────────────────

#[test]
fn artifacts_contain_manifest_and_matrices() {
    let tmp = tempfile::tempdir().unwrap();
    let config = small_config(tmp.path());
    let outcome = run(&config).unwrap();

    let run_dir = save_artifacts(&outcome, &config.output.dir, true).unwrap();
    assert!(run_dir.starts_with(tmp.path()));
    let dirname = run_dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(dirname.starts_with(&outcome.run_id[..12]));

    let manifest =
        import_manifest(&std::fs::read_to_string(run_dir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest.run_id, outcome.run_id);
    assert_eq!(manifest.timesteps, 40);
    assert_eq!(manifest.strategies, 6);
    assert_eq!(manifest.config, config);
    assert_eq!(manifest.equivalence.unwrap().max_abs_diff(), 0.0);

    // Matrices load back bit-for-bit
    let cash = load_targets(&run_dir.join("cash.csv")).unwrap();
    let value = load_targets(&run_dir.join("value.csv")).unwrap();
    let position = load_targets(&run_dir.join("position.csv")).unwrap();
    assert_eq!(cash, outcome.result.cash);
    assert_eq!(position, outcome.result.position);
    assert_eq!(value, outcome.result.value);
}

#[test]
fn dump_csv_off_writes_manifest_only() {
    let tmp = tempfile::tempdir().unwrap();
    let outcome = run(&small_config(tmp.path())).unwrap();
    let run_dir = save_artifacts(&outcome, tmp.path(), false).unwrap();
    assert!(run_dir.join("manifest.json").exists());
    assert!(!run_dir.join("cash.csv").exists());
}

// ── 2. CSV-sourced runs ──────────────────────────────────────────────

#[test]
fn csv_run_matches_synthetic_run() {
    let tmp = tempfile::tempdir().unwrap();
    let synthetic = small_config(tmp.path());
    let data = generate(&SyntheticSpec::from(&synthetic.data));
    let (prices_path, targets_path) = save_inputs(&data.prices, &data.targets, tmp.path()).unwrap();

    assert_eq!(load_prices(&prices_path).unwrap(), data.prices);
    assert_eq!(load_targets(&targets_path).unwrap(), data.targets);

    let mut from_csv = synthetic.clone();
    from_csv.data.source = DataSource::Csv;
    from_csv.data.prices_path = Some(prices_path);
    from_csv.data.targets_path = Some(targets_path);

    let a = run(&synthetic).unwrap();
    let b = run(&from_csv).unwrap();
    assert_eq!(a.result, b.result);
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn csv_with_zero_price_is_rejected_before_simulating() {
    let tmp = tempfile::tempdir().unwrap();
    let prices = tmp.path().join("prices.csv");
    let targets = tmp.path().join("targets.csv");
    std::fs::write(&prices, "price\n10\n0\n8\n").unwrap();
    std::fs::write(&targets, "0\n1\n0\n").unwrap();

    let mut config = small_config(tmp.path());
    config.data.source = DataSource::Csv;
    config.data.prices_path = Some(prices);
    config.data.targets_path = Some(targets);

    assert!(matches!(run(&config), Err(RunError::Simulation(_))));
}

#[test]
fn missing_csv_file_is_data_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = small_config(tmp.path());
    config.data.source = DataSource::Csv;
    config.data.prices_path = Some(tmp.path().join("nope.csv"));
    config.data.targets_path = Some(tmp.path().join("nope.csv"));
    assert!(matches!(run(&config), Err(RunError::Data(_))));
}

// ── 3. Config files ──────────────────────────────────────────────────

#[test]
fn config_file_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("run.toml");
    std::fs::write(
        &path,
        r#"
[simulation]
initial_cash = 100.0
trade_mode = "fixed"
position_size = 5.0

[execution]
workers = 2
partition = "per_column"

[data]
timesteps = 20
strategies = 3
seed = 7
"#,
    )
    .unwrap();

    let config = RunConfig::from_file(&path).unwrap();
    assert_eq!(config.simulation_config().unwrap().sizing.mode(), TradeMode::Fixed);
    assert_eq!(config.partition().unwrap(), Partition::PerColumn);

    let outcome = run(&config).unwrap();
    assert_eq!(outcome.result.cash.shape(), (20, 3));
    assert!(outcome.result.cash.as_slice().iter().all(|&c| c >= 0.0));
}

#[test]
fn missing_config_file_reports_path() {
    let err = RunConfig::from_file(Path::new("/no/such/run.toml")).unwrap_err();
    assert!(err.to_string().contains("/no/such/run.toml"));
}

// ── 4. Serial / scheduled agreement ──────────────────────────────────

#[test]
fn every_mode_and_partition_agrees_with_serial() {
    let data = generate(&SyntheticSpec {
        timesteps: 200,
        strategies: 50,
        seed: 9,
        ..SyntheticSpec::default()
    });
    for sizing in [
        TradeSizing::Fixed {
            position_size: 100.0,
        },
        TradeSizing::CashAll,
        TradeSizing::PortfolioPct {
            max_allocation_pct: 0.5,
        },
        TradeSizing::FixedCash {
            fixed_cash_amount: 100_000.0,
        },
    ] {
        let config = SimulationConfig::new(1_000_000.0, sizing);
        for partition in [
            Partition::PerColumn,
            Partition::Blocks { size: 7 },
            Partition::Unrolled { size: 16 },
            Partition::Static,
        ] {
            let cmp = compare_schedules(&data.prices, &data.targets, &config, partition, 3).unwrap();
            assert!(
                cmp.is_equivalent(),
                "{partition} diverged for {:?}: {:?}",
                sizing.mode(),
                cmp.report
            );
        }
    }
}
