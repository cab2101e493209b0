//! Linear (elastic-net fitted) regressor.
//!
//! prediction = intercept + Σ coefficient_j * scaled_feature_j

use crate::domain::features::FeatureRow;
use crate::domain::model::scaler::StandardScaler;
use crate::domain::oracle::{ModelKind, Oracle, OracleError};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearElasticModel {
    scaler: StandardScaler,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearElasticModel {
    pub fn new(
        scaler: StandardScaler,
        intercept: f64,
        coefficients: Vec<f64>,
    ) -> Result<Self, String> {
        if coefficients.len() != scaler.n_features() {
            return Err(format!(
                "{} coefficients for {} scaled features",
                coefficients.len(),
                scaler.n_features()
            ));
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err("non-finite coefficient".to_string());
        }
        Ok(Self {
            scaler,
            intercept,
            coefficients,
        })
    }
}

impl Oracle for LinearElasticModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearElastic
    }

    fn predict(&self, row: &FeatureRow, _as_of: NaiveDate) -> Result<f64, OracleError> {
        let x = self.scaler.transform(&row.values)?;
        let prediction = self.intercept
            + x.iter()
                .zip(&self.coefficients)
                .map(|(xi, ci)| xi * ci)
                .sum::<f64>();
        if prediction.is_finite() {
            Ok(prediction)
        } else {
            Err(OracleError::NoPrediction)
        }
    }
}
