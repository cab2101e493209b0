//! Single-instrument account state and equity tracking.
//!
//! The account is either fully in cash or fully invested; [`AccountState`]
//! makes the two mutually exclusive.

use chrono::NaiveDate;
use serde::Serialize;

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquitySnapshot {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountState {
    Flat { capital: f64 },
    Holding { position: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    pub state: AccountState,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySnapshot>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            initial_capital,
            state: AccountState::Flat {
                capital: initial_capital,
            },
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, AccountState::Flat { .. })
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            AccountState::Holding { position } => Some(position),
            AccountState::Flat { .. } => None,
        }
    }

    /// Cash on hand; zero while holding.
    pub fn capital(&self) -> f64 {
        match self.state {
            AccountState::Flat { capital } => capital,
            AccountState::Holding { .. } => 0.0,
        }
    }

    /// Cash, or the position marked at `price`.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        match &self.state {
            AccountState::Flat { capital } => *capital,
            AccountState::Holding { position } => position.market_value(price),
        }
    }

    pub fn open(&mut self, position: Position) {
        self.state = AccountState::Holding { position };
    }

    /// Replace the holding with cash. Returns the position that was closed.
    pub fn close(&mut self, capital: f64) -> Option<Position> {
        match std::mem::replace(&mut self.state, AccountState::Flat { capital }) {
            AccountState::Holding { position } => Some(position),
            AccountState::Flat { .. } => None,
        }
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, date: NaiveDate, value: f64) {
        self.equity_curve.push(EquitySnapshot { date, value });
    }
}
