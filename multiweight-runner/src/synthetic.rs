//! Seeded synthetic inputs for benchmarking and cross-checking.
//!
//! Prices follow a geometric Brownian motion so they stay strictly positive.
//! Targets are drawn uniformly from {-1, 0, 1}, which exercises the buy,
//! sell and hold branches in roughly equal proportion.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

use multiweight_core::Matrix;

use crate::config::DataSection;

/// Generator parameters. Same seed, same data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSpec {
    pub timesteps: usize,
    pub strategies: usize,
    pub seed: u64,
    pub initial_price: f64,
    pub volatility: f64,
    pub drift: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            timesteps: 1000,
            strategies: 100,
            seed: 42,
            initial_price: 100.0,
            volatility: 0.02,
            drift: 0.0005,
        }
    }
}

impl From<&DataSection> for SyntheticSpec {
    fn from(data: &DataSection) -> Self {
        Self {
            timesteps: data.timesteps,
            strategies: data.strategies,
            seed: data.seed,
            initial_price: data.initial_price,
            volatility: data.volatility,
            drift: data.drift,
        }
    }
}

/// A price series plus a target matrix with one row per price.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticData {
    pub prices: Vec<f64>,
    pub targets: Matrix,
}

pub fn generate(spec: &SyntheticSpec) -> SyntheticData {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let prices = gbm_prices(
        &mut rng,
        spec.timesteps,
        spec.initial_price,
        spec.drift,
        spec.volatility,
    );
    let targets = random_targets(&mut rng, spec.timesteps, spec.strategies);
    debug!(
        timesteps = spec.timesteps,
        strategies = spec.strategies,
        seed = spec.seed,
        "generated synthetic data"
    );
    SyntheticData { prices, targets }
}

/// `price[t] = initial_price * exp(r[0] + ... + r[t])`, `r ~ N(drift, volatility)`.
pub fn gbm_prices<R: Rng>(
    rng: &mut R,
    n: usize,
    initial_price: f64,
    drift: f64,
    volatility: f64,
) -> Vec<f64> {
    let mut log_return = 0.0_f64;
    (0..n)
        .map(|_| {
            let z: f64 = rng.sample(StandardNormal);
            log_return += drift + volatility * z;
            initial_price * log_return.exp()
        })
        .collect()
}

pub fn random_targets<R: Rng>(rng: &mut R, rows: usize, cols: usize) -> Matrix {
    let mut targets = Matrix::zeros(rows, cols);
    for t in 0..rows {
        for cell in targets.row_mut(t) {
            *cell = rng.gen_range(-1i32..=1) as f64;
        }
    }
    targets
}
