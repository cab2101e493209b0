//! Market data access port trait.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait MarketDataPort: Send + Sync {
    /// Daily bars for `ticker`, ascending, covering the trailing
    /// `lookback_years` up to the latest available bar. An unknown ticker is
    /// [`TraderError::NoData`]; a short history is returned as-is.
    fn fetch_bars(&self, ticker: &str, lookback_years: u32) -> Result<Vec<PriceBar>, TraderError>;

    fn list_tickers(&self) -> Result<Vec<String>, TraderError>;

    /// First date, last date and bar count of the full stored history.
    fn data_range(&self, ticker: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError>;
}
