#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use oracletrader::domain::backtest::BacktestConfig;
use oracletrader::domain::error::TraderError;
use oracletrader::domain::features::FeatureRow;
use oracletrader::domain::oracle::{FnOracle, ModelKind, Oracle, OracleError, OracleSet};
use oracletrader::domain::series::MarketSeries;
use oracletrader::domain::tax::TaxPolicy;
use oracletrader::ports::data_port::MarketDataPort;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use oracletrader::domain::ohlcv::PriceBar;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(&self, ticker: &str, _lookback_years: u32) -> Result<Vec<PriceBar>, TraderError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TraderError::Data {
                reason: reason.clone(),
            });
        }
        self.data
            .get(ticker)
            .cloned()
            .ok_or_else(|| TraderError::NoData {
                ticker: ticker.to_string(),
            })
    }

    fn list_tickers(&self) -> Result<Vec<String>, TraderError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn data_range(&self, ticker: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TraderError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn bar(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar {
        date,
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// Flat bar: open, high, low and close all equal.
pub fn flat_bar(date: NaiveDate, price: f64) -> PriceBar {
    bar(date, price, price, price, price)
}

/// `count` consecutive calendar days starting at `start`, closes rising by
/// `step` from `start_price`.
pub fn rising_bars(start: NaiveDate, count: usize, start_price: f64, step: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| flat_bar(start + Duration::days(i as i64), start_price + step * i as f64))
        .collect()
}

/// Noisy but deterministic closes, enough variation to warm up every
/// technical indicator.
pub fn wavy_bars(start: NaiveDate, count: usize, base: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| {
            let close = base + (i as f64 * 0.37).sin() * 5.0 + i as f64 * 0.05;
            PriceBar {
                date: start + Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10_000.0 + (i % 7) as f64 * 500.0,
            }
        })
        .collect()
}

/// One feature per bar, the close itself.
pub fn series_from_bars(ticker: &str, bars: Vec<PriceBar>) -> MarketSeries {
    let rows = bars
        .iter()
        .map(|b| FeatureRow {
            date: b.date,
            close: b.close,
            values: vec![b.close],
        })
        .collect();
    MarketSeries::new(ticker, bars, rows).unwrap()
}

pub fn always_bullish() -> Arc<dyn Oracle> {
    Arc::new(FnOracle::new(
        ModelKind::LinearElastic,
        |row: &FeatureRow, _: NaiveDate| Ok(row.close * 1.01),
    ))
}

pub fn always_bearish() -> Arc<dyn Oracle> {
    Arc::new(FnOracle::new(
        ModelKind::Kernel,
        |row: &FeatureRow, _: NaiveDate| Ok(row.close * 0.99),
    ))
}

pub fn failing() -> Arc<dyn Oracle> {
    Arc::new(FnOracle::new(
        ModelKind::TreeEnsemble,
        |_: &FeatureRow, _: NaiveDate| Err(OracleError::Failed("model offline".into())),
    ))
}

/// Bullish on the given dates, bearish on every other.
pub fn bullish_on(dates: HashSet<NaiveDate>) -> Arc<dyn Oracle> {
    Arc::new(FnOracle::new(
        ModelKind::GradientBoosted,
        move |row: &FeatureRow, as_of: NaiveDate| {
            if dates.contains(&as_of) {
                Ok(row.close + 1.0)
            } else {
                Ok(row.close - 1.0)
            }
        },
    ))
}

/// Bullish on the given dates, no answer otherwise.
pub fn bullish_on_else_silent(dates: HashSet<NaiveDate>) -> Arc<dyn Oracle> {
    Arc::new(FnOracle::new(
        ModelKind::GradientBoosted,
        move |row: &FeatureRow, as_of: NaiveDate| {
            if dates.contains(&as_of) {
                Ok(row.close + 1.0)
            } else {
                Err(OracleError::NoPrediction)
            }
        },
    ))
}

pub fn single(oracle: Arc<dyn Oracle>) -> OracleSet {
    OracleSet::single("stub", oracle)
}

pub fn flat_tax(rate: f64) -> TaxPolicy {
    TaxPolicy::FlatDiscount { rate }
}

/// 10,000 capital, zero fees, 50% flat tax, no thresholds.
pub fn base_config() -> BacktestConfig {
    BacktestConfig::new(10_000.0, flat_tax(0.5))
}
