//! Per-feature standardisation fitted alongside a model.

use crate::domain::oracle::OracleError;
use serde::{Deserialize, Serialize};

const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn identity(n_features: usize) -> Self {
        Self {
            mean: vec![0.0; n_features],
            scale: vec![1.0; n_features],
        }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn is_consistent(&self) -> bool {
        self.mean.len() == self.scale.len()
            && self.mean.iter().chain(&self.scale).all(|v| v.is_finite())
    }

    /// (x - mean) / scale, with near-zero scales treated as 1.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, OracleError> {
        if values.len() != self.mean.len() {
            return Err(OracleError::FeatureCount {
                expected: self.mean.len(),
                got: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                let s = if s.abs() < MIN_SCALE { 1.0 } else { *s };
                (x - m) / s
            })
            .collect())
    }
}
