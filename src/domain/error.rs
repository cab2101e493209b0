//! Domain error types.

use crate::domain::universe::UniverseError;

/// Top-level error type for oracletrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no models configured")]
    EmptyModelSet,

    #[error("model {model_id} configured more than once")]
    DuplicateModel { model_id: String },

    #[error("tie-breaker {model_id} is not one of the configured models")]
    UnknownTieBreaker { model_id: String },

    #[error("model kind {kind} is not available in this build")]
    ModelUnavailable { kind: String },

    #[error("stale artifact for {model_id}: feature schema {found} does not match {expected}, retrain required")]
    StaleArtifact {
        model_id: String,
        expected: String,
        found: String,
    },

    #[error("artifact for {model_id} has format version {found}, expected {expected}")]
    ArtifactVersion {
        model_id: String,
        expected: u32,
        found: u32,
    },

    #[error("invalid artifact for {model_id}: {reason}")]
    ArtifactInvalid { model_id: String, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("features for {ticker} are misaligned with bars: {reason}")]
    MisalignedFeatures { ticker: String, reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// True for errors that must stop a run before any simulation starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TraderError::ConfigParse { .. }
                | TraderError::ConfigMissing { .. }
                | TraderError::ConfigInvalid { .. }
                | TraderError::EmptyModelSet
                | TraderError::DuplicateModel { .. }
                | TraderError::UnknownTieBreaker { .. }
                | TraderError::ModelUnavailable { .. }
                | TraderError::StaleArtifact { .. }
                | TraderError::ArtifactVersion { .. }
                | TraderError::ArtifactInvalid { .. }
                | TraderError::Universe(_)
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Report { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::Universe(_) => 2,
            TraderError::Data { .. } | TraderError::MisalignedFeatures { .. } => 3,
            TraderError::EmptyModelSet
            | TraderError::DuplicateModel { .. }
            | TraderError::UnknownTieBreaker { .. }
            | TraderError::ModelUnavailable { .. }
            | TraderError::StaleArtifact { .. }
            | TraderError::ArtifactVersion { .. }
            | TraderError::ArtifactInvalid { .. } => 4,
            TraderError::NoData { .. } | TraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
