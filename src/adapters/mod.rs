//! Concrete adapter implementations for ports.

pub mod artifact_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
