//! Versioned model artifact: trained parameters, their scaler, and the
//! fingerprint of the feature schema they were trained on.
//!
//! An artifact is only usable against the exact schema it was fitted with.
//! A fingerprint mismatch is reported as [`TraderError::StaleArtifact`]
//! rather than silently retrained or coerced.

use crate::domain::error::TraderError;
use crate::domain::features::{FeatureSchema, fingerprint_names};
use crate::domain::model::kernel::KernelModel;
use crate::domain::model::linear::LinearElasticModel;
use crate::domain::model::scaler::StandardScaler;
use crate::domain::oracle::{ModelKind, Oracle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelParams {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    Kernel {
        gamma: f64,
        intercept: f64,
        support_vectors: Vec<Vec<f64>>,
        dual_coefficients: Vec<f64>,
    },
    /// Parameters this build has no in-process predictor for.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_id: String,
    pub kind: ModelKind,
    pub schema_fingerprint: String,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub params: ModelParams,
}

impl ModelArtifact {
    pub fn new(
        model_id: impl Into<String>,
        kind: ModelKind,
        schema: &FeatureSchema,
        scaler: StandardScaler,
        params: ModelParams,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_id: model_id.into(),
            kind,
            schema_fingerprint: schema.fingerprint(),
            feature_names: schema.names().to_vec(),
            scaler,
            params,
        }
    }

    /// Check version, fingerprint and internal consistency against the
    /// schema the caller will feed this model.
    pub fn validate(&self, expected: &FeatureSchema) -> Result<(), TraderError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(TraderError::ArtifactVersion {
                model_id: self.model_id.clone(),
                expected: ARTIFACT_FORMAT_VERSION,
                found: self.format_version,
            });
        }

        if fingerprint_names(&self.feature_names) != self.schema_fingerprint {
            return Err(self.invalid("schema fingerprint does not match its feature names"));
        }

        let expected_fingerprint = expected.fingerprint();
        if self.schema_fingerprint != expected_fingerprint {
            return Err(TraderError::StaleArtifact {
                model_id: self.model_id.clone(),
                expected: expected_fingerprint,
                found: self.schema_fingerprint.clone(),
            });
        }

        if !self.scaler.is_consistent() || self.scaler.n_features() != expected.len() {
            return Err(self.invalid(&format!(
                "scaler covers {} features, schema has {}",
                self.scaler.n_features(),
                expected.len()
            )));
        }
        Ok(())
    }

    /// Validate, then build the predictor for this artifact's kind.
    pub fn into_oracle(self, expected: &FeatureSchema) -> Result<Arc<dyn Oracle>, TraderError> {
        self.validate(expected)?;
        let model_id = self.model_id.clone();
        let invalid = |reason: String| TraderError::ArtifactInvalid {
            model_id: model_id.clone(),
            reason,
        };

        match (self.kind, self.params) {
            (
                ModelKind::LinearElastic,
                ModelParams::Linear {
                    intercept,
                    coefficients,
                },
            ) => {
                let model = LinearElasticModel::new(self.scaler, intercept, coefficients)
                    .map_err(invalid)?;
                Ok(Arc::new(model))
            }
            (
                ModelKind::Kernel,
                ModelParams::Kernel {
                    gamma,
                    intercept,
                    support_vectors,
                    dual_coefficients,
                },
            ) => {
                let model = KernelModel::new(
                    self.scaler,
                    gamma,
                    intercept,
                    support_vectors,
                    dual_coefficients,
                )
                .map_err(invalid)?;
                Ok(Arc::new(model))
            }
            (ModelKind::LinearElastic, _) | (ModelKind::Kernel, _) => Err(invalid(format!(
                "parameters do not match model kind {}",
                self.kind
            ))),
            (kind, _) => Err(TraderError::ModelUnavailable {
                kind: kind.to_string(),
            }),
        }
    }

    fn invalid(&self, reason: &str) -> TraderError {
        TraderError::ArtifactInvalid {
            model_id: self.model_id.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::FeatureRow;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["close", "rsi_14"])
    }

    fn linear_artifact() -> ModelArtifact {
        ModelArtifact::new(
            "ridge",
            ModelKind::LinearElastic,
            &schema(),
            StandardScaler::identity(2),
            ModelParams::Linear {
                intercept: 1.0,
                coefficients: vec![1.0, 0.0],
            },
        )
    }

    #[test]
    fn valid_artifact_builds_oracle() {
        let oracle = linear_artifact().into_oracle(&schema()).unwrap();
        let row = FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            close: 50.0,
            values: vec![50.0, 70.0],
        };
        assert_eq!(oracle.kind(), ModelKind::LinearElastic);
        assert_relative_eq!(oracle.predict(&row, row.date).unwrap(), 51.0);
    }

    #[test]
    fn schema_mismatch_is_stale() {
        let other = FeatureSchema::new(["close", "rsi_14", "sma_5"]);
        let err = linear_artifact().validate(&other).unwrap_err();
        assert!(matches!(err, TraderError::StaleArtifact { .. }));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut artifact = linear_artifact();
        artifact.format_version = 99;
        let err = artifact.validate(&schema()).unwrap_err();
        assert!(matches!(
            err,
            TraderError::ArtifactVersion {
                expected: ARTIFACT_FORMAT_VERSION,
                found: 99,
                ..
            }
        ));
    }

    #[test]
    fn tampered_feature_names_are_invalid() {
        let mut artifact = linear_artifact();
        artifact.feature_names.push("extra".into());
        let err = artifact.validate(&schema()).unwrap_err();
        assert!(matches!(err, TraderError::ArtifactInvalid { .. }));
    }

    #[test]
    fn unsupported_kind_is_unavailable() {
        let artifact = ModelArtifact::new(
            "lstm",
            ModelKind::SequenceNetwork,
            &schema(),
            StandardScaler::identity(2),
            ModelParams::Unsupported,
        );
        let err = artifact.into_oracle(&schema()).err().unwrap();
        assert!(matches!(err, TraderError::ModelUnavailable { .. }));
    }

    #[test]
    fn kind_params_mismatch_is_invalid() {
        let mut artifact = linear_artifact();
        artifact.kind = ModelKind::Kernel;
        let err = artifact.into_oracle(&schema()).err().unwrap();
        assert!(matches!(err, TraderError::ArtifactInvalid { .. }));
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_string(&linear_artifact()).unwrap();
        assert!(json.contains("\"kind\":\"linear_elastic\""));
        assert!(json.contains("\"type\":\"linear\""));
        let back: ModelArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, linear_artifact());

        let mut foreign = serde_json::to_value(linear_artifact()).unwrap();
        foreign["params"] = serde_json::json!({ "type": "booster", "trees": 300 });
        let parsed: ModelArtifact = serde_json::from_value(foreign).unwrap();
        assert_eq!(parsed.params, ModelParams::Unsupported);
    }
}
