//! RBF kernel regressor (support-vector form).
//!
//! prediction = intercept + Σ dual_i * exp(-gamma * ||sv_i - x||²)

use crate::domain::features::FeatureRow;
use crate::domain::model::scaler::StandardScaler;
use crate::domain::oracle::{ModelKind, Oracle, OracleError};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct KernelModel {
    scaler: StandardScaler,
    gamma: f64,
    intercept: f64,
    support_vectors: Vec<Vec<f64>>,
    dual_coefficients: Vec<f64>,
}

impl KernelModel {
    pub fn new(
        scaler: StandardScaler,
        gamma: f64,
        intercept: f64,
        support_vectors: Vec<Vec<f64>>,
        dual_coefficients: Vec<f64>,
    ) -> Result<Self, String> {
        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(format!("gamma must be positive, got {gamma}"));
        }
        if support_vectors.len() != dual_coefficients.len() {
            return Err(format!(
                "{} support vectors but {} dual coefficients",
                support_vectors.len(),
                dual_coefficients.len()
            ));
        }
        let n = scaler.n_features();
        if let Some(bad) = support_vectors.iter().find(|sv| sv.len() != n) {
            return Err(format!(
                "support vector has {} features, scaler has {}",
                bad.len(),
                n
            ));
        }
        Ok(Self {
            scaler,
            gamma,
            intercept,
            support_vectors,
            dual_coefficients,
        })
    }

    fn rbf(&self, a: &[f64], b: &[f64]) -> f64 {
        let dist2: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
        (-self.gamma * dist2).exp()
    }
}

impl Oracle for KernelModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Kernel
    }

    fn predict(&self, row: &FeatureRow, _as_of: NaiveDate) -> Result<f64, OracleError> {
        let x = self.scaler.transform(&row.values)?;
        let prediction = self.intercept
            + self
                .support_vectors
                .iter()
                .zip(&self.dual_coefficients)
                .map(|(sv, alpha)| alpha * self.rbf(sv, &x))
                .sum::<f64>();
        if prediction.is_finite() {
            Ok(prediction)
        } else {
            Err(OracleError::NoPrediction)
        }
    }
}
