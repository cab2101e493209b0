//! Transaction cost policies.
//!
//! Both policies are pure functions of the traded notional and are applied
//! identically to the entry and exit legs of a round trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FeePolicy {
    /// `value * brokerage_rate + value * clearing_rate + settlement_fee`
    RateFlat {
        brokerage_rate: f64,
        clearing_rate: f64,
        settlement_fee: f64,
    },
    /// `max(minimum, value * rate)`
    MinOrRate { minimum: f64, rate: f64 },
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy::RateFlat {
            brokerage_rate: 0.0,
            clearing_rate: 0.0,
            settlement_fee: 0.0,
        }
    }
}

impl FeePolicy {
    pub fn fee(&self, trade_value: f64) -> f64 {
        match *self {
            FeePolicy::RateFlat {
                brokerage_rate,
                clearing_rate,
                settlement_fee,
            } => trade_value * brokerage_rate + trade_value * clearing_rate + settlement_fee,
            FeePolicy::MinOrRate { minimum, rate } => minimum.max(trade_value * rate),
        }
    }

    pub fn kind(&self) -> FeePolicyKind {
        match self {
            FeePolicy::RateFlat { .. } => FeePolicyKind::RateFlat,
            FeePolicy::MinOrRate { .. } => FeePolicyKind::MinOrRate,
        }
    }
}

/// Policy identifier as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicyKind {
    RateFlat,
    MinOrRate,
}

impl FromStr for FeePolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rate_flat" => Ok(FeePolicyKind::RateFlat),
            "min_or_rate" => Ok(FeePolicyKind::MinOrRate),
            other => Err(format!(
                "unknown fee policy '{other}' (expected rate_flat or min_or_rate)"
            )),
        }
    }
}

impl fmt::Display for FeePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeePolicyKind::RateFlat => write!(f, "rate_flat"),
            FeePolicyKind::MinOrRate => write!(f, "min_or_rate"),
        }
    }
}
