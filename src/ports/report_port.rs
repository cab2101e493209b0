//! Report output port trait.

use crate::domain::error::TraderError;
use crate::domain::metrics::BacktestReport;
use std::path::Path;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), TraderError>;

    /// Several tickers' reports in one output.
    fn write_batch(&self, reports: &[BacktestReport], output_path: &Path) -> Result<(), TraderError>;
}
