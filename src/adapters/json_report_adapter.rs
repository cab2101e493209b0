//! JSON report writer.

use crate::domain::error::TraderError;
use crate::domain::metrics::BacktestReport;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    /// Serialize without touching the filesystem. Identical input gives
    /// byte-identical output.
    pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String, TraderError> {
        serde_json::to_string_pretty(value).map_err(|e| TraderError::Report {
            reason: format!("failed to serialize report: {e}"),
        })
    }

    fn write_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<(), TraderError> {
        let json = Self::render(value)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, json).map_err(|e| TraderError::Report {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), TraderError> {
        Self::write_json(report, output_path)
    }

    fn write_batch(&self, reports: &[BacktestReport], output_path: &Path) -> Result<(), TraderError> {
        Self::write_json(reports, output_path)
    }
}
