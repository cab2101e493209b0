//! Multi-ticker scan.
//!
//! Each ticker is an independent simulation over shared, read-only inputs:
//! the data port, the feature preparer, the oracle set and the backtest
//! configuration. Tickers run on the rayon pool by default. A failure in one
//! ticker is captured in its [`TickerStatus`] and never stops the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use super::backtest::{BacktestConfig, BacktestOutcome, run_backtest};
use super::error::TraderError;
use super::features::FeaturePreparer;
use super::metrics::BacktestReport;
use super::oracle::OracleSet;
use super::series::MarketSeries;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub enum TickerStatus {
    Completed(Box<BacktestReport>),
    InsufficientData { bars: usize, minimum: usize },
    Failed(String),
    /// Not started because the scan was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerResult {
    pub ticker: String,
    pub status: TickerStatus,
}

impl TickerResult {
    pub fn report(&self) -> Option<&BacktestReport> {
        match &self.status {
            TickerStatus::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Fetch bars and align them with their feature rows.
pub fn load_series(
    ticker: &str,
    data: &dyn MarketDataPort,
    preparer: &dyn FeaturePreparer,
    lookback_years: u32,
) -> Result<MarketSeries, TraderError> {
    let bars = data.fetch_bars(ticker, lookback_years)?;
    MarketSeries::prepare(ticker, bars, preparer)
}

pub struct Scanner<'a> {
    data: &'a dyn MarketDataPort,
    preparer: &'a dyn FeaturePreparer,
    oracles: &'a OracleSet,
    config: &'a BacktestConfig,
    lookback_years: u32,
    parallel: bool,
    cancel: Arc<AtomicBool>,
}

impl<'a> Scanner<'a> {
    pub fn new(
        data: &'a dyn MarketDataPort,
        preparer: &'a dyn FeaturePreparer,
        oracles: &'a OracleSet,
        config: &'a BacktestConfig,
        lookback_years: u32,
    ) -> Self {
        Self {
            data,
            preparer,
            oracles,
            config,
            lookback_years,
            parallel: true,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Share a cancellation flag. Setting it stops tickers that have not
    /// started yet; running ones finish.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Results in the same order as `tickers`.
    pub fn scan(&self, tickers: &[String]) -> Vec<TickerResult> {
        info!(tickers = tickers.len(), parallel = self.parallel, "scan started");
        let results: Vec<TickerResult> = if self.parallel {
            tickers.par_iter().map(|t| self.run_one(t)).collect()
        } else {
            tickers.iter().map(|t| self.run_one(t)).collect()
        };
        let completed = results.iter().filter(|r| r.report().is_some()).count();
        info!(completed, total = results.len(), "scan finished");
        results
    }

    fn run_one(&self, ticker: &str) -> TickerResult {
        let status = if self.cancel.load(Ordering::Relaxed) {
            TickerStatus::Cancelled
        } else {
            self.simulate(ticker)
        };
        TickerResult {
            ticker: ticker.to_string(),
            status,
        }
    }

    fn simulate(&self, ticker: &str) -> TickerStatus {
        let series = match load_series(ticker, self.data, self.preparer, self.lookback_years) {
            Ok(series) => series,
            Err(e) => {
                warn!(ticker, error = %e, "skipping ticker");
                return TickerStatus::Failed(e.to_string());
            }
        };
        match run_backtest(ticker, &series, self.oracles, self.config) {
            BacktestOutcome::Completed(report) => TickerStatus::Completed(report),
            BacktestOutcome::InsufficientData { bars, minimum, .. } => {
                warn!(ticker, bars, minimum, "skipping ticker, insufficient data");
                TickerStatus::InsufficientData { bars, minimum }
            }
        }
    }
}
