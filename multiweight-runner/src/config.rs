//! TOML run configuration.
//!
//! A run file has four sections, all optional:
//! - `[simulation]`: starting cash and trade sizing
//! - `[execution]`: worker count, partition, serial cross-check
//! - `[data]`: synthetic generator parameters or CSV paths
//! - `[output]`: artifact directory

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use multiweight_core::{
    ParallelExecutor, Partition, SimError, SimulationConfig, TradeSizing, DEFAULT_BLOCK_SIZE,
    DEFAULT_INITIAL_CASH,
};

/// Unique identifier for a run (content-addressable hash of its config).
pub type RunId = String;

/// Errors from reading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] SimError),
    #[error("[data] source = \"csv\" requires {0}")]
    MissingPath(&'static str),
    #[error("[data] {field} is out of range: {value}")]
    InvalidData { field: &'static str, value: f64 },
}

impl From<multiweight_core::ConfigError> for ConfigError {
    fn from(e: multiweight_core::ConfigError) -> Self {
        Self::Invalid(e.into())
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub simulation: SimulationSection,
    pub execution: ExecutionSection,
    pub data: DataSection,
    pub output: OutputSection,
}

/// `[simulation]`: the flat parameter set every trade mode reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub initial_cash: f64,
    pub trade_mode: String,
    pub max_allocation_pct: f64,
    pub fixed_cash_amount: f64,
    pub position_size: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            trade_mode: "portfolio_pct".into(),
            max_allocation_pct: 0.5,
            fixed_cash_amount: 100_000.0,
            position_size: 100.0,
        }
    }
}

/// `[execution]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub workers: usize,
    pub partition: String,
    pub block_size: usize,
    /// Also run the serial engine and report the maximum difference.
    pub verify: bool,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            partition: "static".into(),
            block_size: DEFAULT_BLOCK_SIZE,
            verify: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Synthetic,
    Csv,
}

/// `[data]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSource,
    pub timesteps: usize,
    pub strategies: usize,
    pub seed: u64,
    pub initial_price: f64,
    pub volatility: f64,
    pub drift: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prices_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets_path: Option<PathBuf>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSource::Synthetic,
            timesteps: 1000,
            strategies: 100,
            seed: 42,
            initial_price: 100.0,
            volatility: 0.02,
            drift: 0.0005,
            prices_path: None,
            targets_path: None,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    /// Write cash / position / value matrices next to the manifest.
    pub dump_csv: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            dump_csv: true,
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate. Unknown trade modes, out-of-range parameters and
    /// missing CSV paths are all rejected here, before any data is loaded.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation_config()?;
        self.partition()?;
        if self.execution.workers == 0 {
            return Err(multiweight_core::ConfigError::ZeroWorkers.into());
        }
        match self.data.source {
            DataSource::Synthetic => {
                let price = self.data.initial_price;
                if !(price.is_finite() && price > 0.0) {
                    return Err(ConfigError::InvalidData {
                        field: "initial_price",
                        value: price,
                    });
                }
                let vol = self.data.volatility;
                if !(vol.is_finite() && vol >= 0.0) {
                    return Err(ConfigError::InvalidData {
                        field: "volatility",
                        value: vol,
                    });
                }
                if !self.data.drift.is_finite() {
                    return Err(ConfigError::InvalidData {
                        field: "drift",
                        value: self.data.drift,
                    });
                }
            }
            DataSource::Csv => {
                if self.data.prices_path.is_none() {
                    return Err(ConfigError::MissingPath("prices_path"));
                }
                if self.data.targets_path.is_none() {
                    return Err(ConfigError::MissingPath("targets_path"));
                }
            }
        }
        Ok(())
    }

    /// Engine configuration for `[simulation]`.
    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        let s = &self.simulation;
        let sizing = TradeSizing::from_parts(
            &s.trade_mode,
            s.max_allocation_pct,
            s.fixed_cash_amount,
            s.position_size,
        )?;
        let config = SimulationConfig::new(s.initial_cash, sizing);
        config.validate()?;
        Ok(config)
    }

    pub fn partition(&self) -> Result<Partition, ConfigError> {
        Ok(Partition::from_parts(
            &self.execution.partition,
            self.execution.block_size,
        )?)
    }

    pub fn executor(&self) -> Result<ParallelExecutor, ConfigError> {
        Ok(ParallelExecutor::new(self.execution.workers, self.partition()?)?)
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        // Plain data with string keys; JSON serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
