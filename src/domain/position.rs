//! Open position and completed round trips.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// The single open holding. Never mutated: a new position replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_fees: f64,
    /// 0.0 when the stop is disabled.
    pub stop_loss: f64,
    /// 0.0 when the target is disabled.
    pub take_profit: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Capital committed at entry, fees included.
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price + self.entry_fees
    }

    pub fn should_stop_loss(&self, low: f64) -> bool {
        if self.stop_loss == 0.0 {
            return false;
        }
        low <= self.stop_loss
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        if self.take_profit == 0.0 {
            return false;
        }
        high >= self.take_profit
    }

    pub fn holding_days(&self, exit_date: NaiveDate) -> i64 {
        (exit_date - self.entry_date).num_days()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ModelExit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop-loss",
            ExitReason::TakeProfit => "take-profit",
            ExitReason::ModelExit => "model-exit",
            ExitReason::EndOfData => "end-of-data",
        };
        f.write_str(s)
    }
}

/// A completed round trip. Appended to the trade log, never changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub quantity: f64,
    pub total_fees: f64,
    pub tax_paid: f64,
    /// After fees, before tax.
    pub gross_profit: f64,
    /// After fees and tax.
    pub net_profit: f64,
    /// `None` when the cost basis was zero.
    pub profit_pct: Option<f64>,
    pub holding_days: i64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.net_profit > 0.0
    }
}
