//! Multiweight CLI: run, verify, and data generation commands.
//!
//! Commands:
//! - `run`: execute a simulation from a TOML config file and save artifacts
//! - `verify`: time serial vs scheduled execution on synthetic data and check they agree
//! - `generate`: write synthetic `prices.csv` / `targets.csv` for later `run`s

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use multiweight_core::{Partition, SimulationConfig, TradeSizing, DEFAULT_INITIAL_CASH};
use multiweight_runner::{
    compare_schedules, generate, run, save_artifacts, save_inputs, RunConfig, RunOutcome,
    SyntheticSpec,
};

#[derive(Parser)]
#[command(
    name = "multiweight",
    about = "Multiweight: column-parallel multi-strategy trade simulation"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a simulation from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override `[output] dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override `[execution] workers`.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Compare serial and scheduled execution on synthetic data.
    Verify {
        #[arg(long, default_value_t = 1000)]
        timesteps: usize,

        #[arg(long, default_value_t = 100)]
        strategies: usize,

        /// Worker threads for the scheduled run.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// serial | per_column | blocks[:N] | unrolled[:N] | static
        #[arg(long, default_value = "static")]
        partition: String,

        /// fixed | cash_all | portfolio_pct | fixed_cash
        #[arg(long, default_value = "portfolio_pct")]
        trade_mode: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Write synthetic prices.csv and targets.csv.
    Generate {
        #[arg(long, default_value_t = 1000)]
        timesteps: usize,

        #[arg(long, default_value_t = 100)]
        strategies: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Directory to write into. Created if missing.
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            workers,
        } => run_cmd(config, output_dir, workers),
        Commands::Verify {
            timesteps,
            strategies,
            workers,
            partition,
            trade_mode,
            seed,
        } => verify_cmd(timesteps, strategies, workers, &partition, &trade_mode, seed),
        Commands::Generate {
            timesteps,
            strategies,
            seed,
            output_dir,
        } => generate_cmd(timesteps, strategies, seed, output_dir),
    }
}

fn run_cmd(config_path: PathBuf, output_dir: Option<PathBuf>, workers: Option<usize>) -> Result<()> {
    let mut config = RunConfig::from_file(&config_path)?;
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    if let Some(workers) = workers {
        config.execution.workers = workers;
        config.validate()?;
    }

    let outcome = run(&config)?;
    print_summary(&outcome);

    let run_dir = save_artifacts(&outcome, &config.output.dir, config.output.dump_csv)?;
    println!("Artifacts saved to: {}", run_dir.display());

    if let Some(report) = outcome.equivalence {
        if !report.is_within(multiweight_core::DEFAULT_EPSILON) {
            bail!(
                "scheduled result diverged from serial (max abs diff {:e})",
                report.max_abs_diff()
            );
        }
    }
    Ok(())
}

fn verify_cmd(
    timesteps: usize,
    strategies: usize,
    workers: usize,
    partition: &str,
    trade_mode: &str,
    seed: u64,
) -> Result<()> {
    let partition: Partition = partition.parse()?;
    let defaults = multiweight_runner::config::SimulationSection::default();
    let sizing = TradeSizing::from_parts(
        trade_mode,
        defaults.max_allocation_pct,
        defaults.fixed_cash_amount,
        defaults.position_size,
    )?;
    let config = SimulationConfig::new(DEFAULT_INITIAL_CASH, sizing);

    let data = generate(&SyntheticSpec {
        timesteps,
        strategies,
        seed,
        ..SyntheticSpec::default()
    });
    info!(timesteps, strategies, workers, %partition, %trade_mode, "verifying");

    let cmp = compare_schedules(&data.prices, &data.targets, &config, partition, workers)?;

    println!("=== Schedule Comparison ===");
    println!("Data:        {timesteps} timesteps x {strategies} strategies (seed {seed})");
    println!("Mode:        {}", sizing.mode());
    println!("Partition:   {partition} on {workers} workers");
    println!("Serial:      {:.3} ms", cmp.serial.as_secs_f64() * 1e3);
    println!("Scheduled:   {:.3} ms", cmp.parallel.as_secs_f64() * 1e3);
    println!("Speedup:     {:.2}x", cmp.speedup);
    println!(
        "Max diff:    cash {:e}, position {:e}, value {:e}",
        cmp.report.cash, cmp.report.position, cmp.report.value
    );

    match cmp.divergence {
        None => {
            println!("Result:      equivalent");
            Ok(())
        }
        Some((t, w)) => bail!("results diverge first at timestep {t}, strategy {w}"),
    }
}

fn generate_cmd(timesteps: usize, strategies: usize, seed: u64, output_dir: PathBuf) -> Result<()> {
    let data = generate(&SyntheticSpec {
        timesteps,
        strategies,
        seed,
        ..SyntheticSpec::default()
    });
    let (prices_path, targets_path) = save_inputs(&data.prices, &data.targets, &output_dir)?;
    println!("Prices written to:  {}", prices_path.display());
    println!("Targets written to: {}", targets_path.display());
    Ok(())
}

fn print_summary(outcome: &RunOutcome) {
    let result = &outcome.result;
    let finals = result.final_values();
    let initial = outcome.config.simulation.initial_cash;

    println!("=== Simulation Results ===");
    println!("Run:         {}", &outcome.run_id[..outcome.run_id.len().min(12)]);
    println!(
        "Data:        {} timesteps x {} strategies",
        result.timesteps(),
        result.strategies()
    );
    println!("Mode:        {}", outcome.config.simulation.trade_mode);
    println!(
        "Schedule:    {} on {} workers",
        outcome.partition, outcome.workers
    );
    println!("Load:        {:.3} s", outcome.timings.load_secs);
    println!("Simulate:    {:.3} s", outcome.timings.simulate_secs);
    if let Some(secs) = outcome.timings.verify_secs {
        println!("Verify:      {secs:.3} s");
    }

    if !finals.is_empty() {
        let best = finals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let worst = finals.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = finals.iter().sum::<f64>() / finals.len() as f64;
        println!();
        println!("Final value: mean {mean:.2}, best {best:.2}, worst {worst:.2}");
        println!("Mean return: {:.2}%", (mean / initial - 1.0) * 100.0);
    }
    if let Some(report) = outcome.equivalence {
        println!("Max diff vs serial: {:e}", report.max_abs_diff());
    }
}
