//! Bars paired with their feature rows.

use crate::domain::error::TraderError;
use crate::domain::features::{FeaturePreparer, FeatureRow};
use crate::domain::ohlcv::{PriceBar, is_strictly_ascending};

/// Bars and feature rows of equal length with matching dates, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    bars: Vec<PriceBar>,
    features: Vec<FeatureRow>,
}

impl MarketSeries {
    pub fn new(
        ticker: &str,
        bars: Vec<PriceBar>,
        features: Vec<FeatureRow>,
    ) -> Result<Self, TraderError> {
        let misaligned = |reason: String| TraderError::MisalignedFeatures {
            ticker: ticker.to_string(),
            reason,
        };

        if bars.len() != features.len() {
            return Err(misaligned(format!(
                "{} bars but {} feature rows",
                bars.len(),
                features.len()
            )));
        }
        if !is_strictly_ascending(&bars) {
            return Err(misaligned("bars are not in ascending date order".into()));
        }
        if let Some((bar, row)) = bars.iter().zip(&features).find(|(b, r)| b.date != r.date) {
            return Err(misaligned(format!(
                "bar dated {} paired with feature row dated {}",
                bar.date, row.date
            )));
        }
        Ok(Self { bars, features })
    }

    /// Run the preparer and drop the bars that fell inside its warm-up.
    pub fn prepare(
        ticker: &str,
        mut bars: Vec<PriceBar>,
        preparer: &dyn FeaturePreparer,
    ) -> Result<Self, TraderError> {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let features = preparer.prepare(&bars);
        let skip = bars.len() - features.len().min(bars.len());
        let aligned = bars.split_off(skip);
        Self::new(ticker, aligned, features)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn features(&self) -> &[FeatureRow] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_row(&self) -> Option<&FeatureRow> {
        self.features.last()
    }
}
