//! CSV file market data adapter.
//!
//! One file per ticker, `<base>/<TICKER>.csv`, with a header row and columns
//! `date,open,high,low,close,volume` (dates as `YYYY-MM-DD`).

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::MarketDataPort;
use chrono::{Months, NaiveDate};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    /// Every bar in the file, sorted by date.
    fn read_all(&self, ticker: &str) -> Result<Vec<PriceBar>, TraderError> {
        let path = self.csv_path(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TraderError::NoData {
                    ticker: ticker.to_string(),
                });
            }
            Err(e) => {
                return Err(TraderError::Data {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TraderError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let bad_row = |reason: String| TraderError::Data {
                reason: format!("{} row {}: {}", path.display(), line + 1, reason),
            };

            let date_str = record
                .get(0)
                .ok_or_else(|| bad_row("missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| bad_row(format!("invalid date '{date_str}': {e}")))?;

            let number = |idx: usize, name: &str| -> Result<f64, TraderError> {
                let raw = record
                    .get(idx)
                    .ok_or_else(|| bad_row(format!("missing {name} column")))?;
                raw.trim()
                    .parse::<f64>()
                    .map_err(|e| bad_row(format!("invalid {name} value '{raw}': {e}")))
            };

            bars.push(PriceBar {
                date,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(&self, ticker: &str, lookback_years: u32) -> Result<Vec<PriceBar>, TraderError> {
        let mut bars = self.read_all(ticker)?;
        let Some(last) = bars.last().map(|b| b.date) else {
            return Ok(bars);
        };
        let cutoff = last
            .checked_sub_months(Months::new(lookback_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        bars.retain(|b| b.date > cutoff);
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, TraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            if let Some(ticker) = name.to_string_lossy().strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn data_range(&self, ticker: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TraderError> {
        let bars = match self.read_all(ticker) {
            Ok(bars) => bars,
            Err(TraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
