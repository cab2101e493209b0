//! Core domain types and logic.

pub mod ohlcv;
pub mod features;
pub mod series;
pub mod oracle;
pub mod model;
pub mod consensus;
pub mod fees;
pub mod tax;
pub mod hold_period;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod batch;
pub mod universe;
pub mod config_validation;
pub mod error;
