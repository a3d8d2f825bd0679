//! Trade sizing: how many lots a strategy buys when its target rises.
//!
//! Sizing is a pure function of (cash, held quantity, price). Four modes:
//! - **fixed**: always `position_size` lots
//! - **cash_all**: spend all available cash
//! - **portfolio_pct**: cap the position at a fraction of portfolio value
//! - **fixed_cash**: size as if a fixed cash budget were available
//!
//! Every mode is followed by the same affordability clamp, so a strategy can
//! never buy more than its cash covers.
//!
//! `TradeSizing` is the configuration-facing tagged enum. The engine does not
//! match on it per cell: it converts it once per run into one of the concrete
//! `SizingRule` types and runs a loop specialised for that rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Trade-mode tag as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    Fixed,
    CashAll,
    PortfolioPct,
    FixedCash,
}

impl TradeMode {
    pub const ALL: [TradeMode; 4] = [
        TradeMode::Fixed,
        TradeMode::CashAll,
        TradeMode::PortfolioPct,
        TradeMode::FixedCash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::CashAll => "cash_all",
            Self::PortfolioPct => "portfolio_pct",
            Self::FixedCash => "fixed_cash",
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradeMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownTradeMode(s.to_string()))
    }
}

/// Validated trade-sizing configuration. Each variant carries only the
/// parameter its mode reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trade_mode", rename_all = "snake_case")]
pub enum TradeSizing {
    Fixed { position_size: f64 },
    CashAll,
    PortfolioPct { max_allocation_pct: f64 },
    FixedCash { fixed_cash_amount: f64 },
}

impl Default for TradeSizing {
    fn default() -> Self {
        Self::PortfolioPct {
            max_allocation_pct: 0.5,
        }
    }
}

impl TradeSizing {
    pub fn fixed(position_size: f64) -> Result<Self, ConfigError> {
        let sizing = Self::Fixed { position_size };
        sizing.validate()?;
        Ok(sizing)
    }

    pub fn cash_all() -> Self {
        Self::CashAll
    }

    pub fn portfolio_pct(max_allocation_pct: f64) -> Result<Self, ConfigError> {
        let sizing = Self::PortfolioPct { max_allocation_pct };
        sizing.validate()?;
        Ok(sizing)
    }

    pub fn fixed_cash(fixed_cash_amount: f64) -> Result<Self, ConfigError> {
        let sizing = Self::FixedCash { fixed_cash_amount };
        sizing.validate()?;
        Ok(sizing)
    }

    /// Build from a flat parameter set as found in configuration files.
    ///
    /// Only the parameter read by the selected mode is validated; the others
    /// are ignored.
    pub fn from_parts(
        mode: &str,
        max_allocation_pct: f64,
        fixed_cash_amount: f64,
        position_size: f64,
    ) -> Result<Self, ConfigError> {
        match mode.parse::<TradeMode>()? {
            TradeMode::Fixed => Self::fixed(position_size),
            TradeMode::CashAll => Ok(Self::cash_all()),
            TradeMode::PortfolioPct => Self::portfolio_pct(max_allocation_pct),
            TradeMode::FixedCash => Self::fixed_cash(fixed_cash_amount),
        }
    }

    pub fn mode(&self) -> TradeMode {
        match self {
            Self::Fixed { .. } => TradeMode::Fixed,
            Self::CashAll => TradeMode::CashAll,
            Self::PortfolioPct { .. } => TradeMode::PortfolioPct,
            Self::FixedCash { .. } => TradeMode::FixedCash,
        }
    }

    /// Re-check parameter ranges, e.g. after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Fixed { position_size } => {
                if !(position_size.is_finite() && position_size > 0.0) {
                    return Err(ConfigError::NonPositivePositionSize(position_size));
                }
            }
            Self::CashAll => {}
            Self::PortfolioPct { max_allocation_pct } => {
                if !(max_allocation_pct > 0.0 && max_allocation_pct <= 1.0) {
                    return Err(ConfigError::AllocationOutOfRange(max_allocation_pct));
                }
            }
            Self::FixedCash { fixed_cash_amount } => {
                if !(fixed_cash_amount.is_finite() && fixed_cash_amount > 0.0) {
                    return Err(ConfigError::NonPositiveFixedCash(fixed_cash_amount));
                }
            }
        }
        Ok(())
    }

    /// Clamped buy quantity for a single cell.
    ///
    /// Convenience for callers outside the hot loop; the engine uses the
    /// rule returned by `with_rule` instead.
    pub fn buy_quantity(&self, cash: f64, held: f64, price: f64) -> f64 {
        self.with_rule(SingleBuy { cash, held, price })
    }

    /// Resolve the variant into its concrete rule and hand it to `f`.
    pub fn with_rule<F: RuleFn>(&self, f: F) -> F::Output {
        match *self {
            Self::Fixed { position_size } => f.call(FixedQuantity { position_size }),
            Self::CashAll => f.call(CashAll),
            Self::PortfolioPct { max_allocation_pct } => {
                f.call(PortfolioPct { max_allocation_pct })
            }
            Self::FixedCash { fixed_cash_amount } => f.call(FixedCash { fixed_cash_amount }),
        }
    }
}

/// A computation that is generic over the concrete sizing rule.
///
/// Lets callers write one generic body and have `TradeSizing::with_rule`
/// pick the monomorphized instance.
pub trait RuleFn {
    type Output;
    fn call<R: SizingRule>(self, rule: R) -> Self::Output;
}

struct SingleBuy {
    cash: f64,
    held: f64,
    price: f64,
}

impl RuleFn for SingleBuy {
    type Output = f64;

    fn call<R: SizingRule>(self, rule: R) -> f64 {
        buy_quantity(&rule, self.cash, self.held, self.price)
    }
}

/// Desired buy quantity before the affordability clamp.
pub trait SizingRule: Copy + Send + Sync {
    fn desired_quantity(&self, cash: f64, held: f64, price: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedQuantity {
    pub position_size: f64,
}

impl SizingRule for FixedQuantity {
    #[inline]
    fn desired_quantity(&self, _cash: f64, _held: f64, _price: f64) -> f64 {
        self.position_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashAll;

impl SizingRule for CashAll {
    #[inline]
    fn desired_quantity(&self, cash: f64, _held: f64, price: f64) -> f64 {
        (cash / price).floor()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioPct {
    pub max_allocation_pct: f64,
}

impl SizingRule for PortfolioPct {
    #[inline]
    fn desired_quantity(&self, cash: f64, held: f64, price: f64) -> f64 {
        let portfolio_value = cash + held * price;
        let max_position = (portfolio_value * self.max_allocation_pct / price).floor();
        (max_position - held).min((cash / price).floor()).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCash {
    pub fixed_cash_amount: f64,
}

impl SizingRule for FixedCash {
    #[inline]
    fn desired_quantity(&self, _cash: f64, _held: f64, price: f64) -> f64 {
        (self.fixed_cash_amount / price).floor()
    }
}

/// Largest whole number of lots `cash` pays for at `price`.
///
/// `floor(cash / price)` can round up to a lot count whose cost exceeds
/// `cash` by one ulp; step back one lot in that case so cash never goes
/// negative.
#[inline]
pub fn affordable_lots(cash: f64, price: f64) -> f64 {
    let lots = (cash / price).floor();
    if lots > 0.0 && lots * price > cash {
        lots - 1.0
    } else {
        lots.max(0.0)
    }
}

/// Desired quantity clamped to `[0, affordable_lots(cash, price)]`.
#[inline]
pub fn buy_quantity<R: SizingRule>(rule: &R, cash: f64, held: f64, price: f64) -> f64 {
    rule.desired_quantity(cash, held, price)
        .min(affordable_lots(cash, price))
        .max(0.0)
}
