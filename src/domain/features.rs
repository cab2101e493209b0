//! Feature rows fed to prediction oracles.
//!
//! A [`FeatureRow`] is aligned 1:1 with a [`PriceBar`] once every rolling
//! window is warm. [`TechnicalFeatures`] is the default preparer; anything
//! implementing [`FeaturePreparer`] can replace it.
//!
//! Indicator definitions:
//! - SMA(n): mean of the last n closes
//! - EMA(n): k = 2/(n+1), seeded with SMA(n), then C*k + EMA*(1-k)
//! - RSI(n): Wilder smoothing of average gain/loss, 100 when avg loss is 0
//! - volatility(n): population stddev of the last n one-day returns

use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    /// Close of the bar this row describes; predictions are compared to it.
    pub close: f64,
    pub values: Vec<f64>,
}

/// Ordered feature names plus a content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// blake3 over the schema version and ordered names.
    pub fn fingerprint(&self) -> String {
        fingerprint_names(&self.names)
    }
}

pub fn fingerprint_names(names: &[String]) -> String {
    let canonical = format!("v{}:{}", SCHEMA_VERSION, names.join(","));
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

pub trait FeaturePreparer: Send + Sync {
    fn schema(&self) -> FeatureSchema;

    /// Rows for every bar past the warm-up, in bar order.
    fn prepare(&self, bars: &[PriceBar]) -> Vec<FeatureRow>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalFeatures;

const SMA_FAST: usize = 5;
const SMA_SLOW: usize = 20;
const EMA_FAST: usize = 12;
const EMA_SLOW: usize = 26;
const RSI_PERIOD: usize = 14;
const VOLATILITY_WINDOW: usize = 20;
const VOLUME_WINDOW: usize = 20;

impl TechnicalFeatures {
    pub const NAMES: [&'static str; 9] = [
        "close",
        "return_1d",
        "sma_5",
        "sma_20",
        "ema_12",
        "ema_26",
        "rsi_14",
        "volatility_20",
        "volume_ratio_20",
    ];
}

impl FeaturePreparer for TechnicalFeatures {
    fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(Self::NAMES)
    }

    fn prepare(&self, bars: &[PriceBar]) -> Vec<FeatureRow> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let returns = one_day_returns(&closes);
        let sma_fast = sma(&closes, SMA_FAST);
        let sma_slow = sma(&closes, SMA_SLOW);
        let ema_fast = ema(&closes, EMA_FAST);
        let ema_slow = ema(&closes, EMA_SLOW);
        let rsi_values = rsi(&closes, RSI_PERIOD);
        let volatility = rolling_stddev(&returns, VOLATILITY_WINDOW);
        let volume_sma = sma(&volumes, VOLUME_WINDOW);

        let mut rows = Vec::with_capacity(bars.len());
        for (i, bar) in bars.iter().enumerate() {
            let columns = [
                Some(bar.close),
                returns[i],
                sma_fast[i],
                sma_slow[i],
                ema_fast[i],
                ema_slow[i],
                rsi_values[i],
                volatility[i],
                volume_sma[i].map(|avg| if avg > 0.0 { bar.volume / avg } else { 1.0 }),
            ];
            if columns.iter().all(Option::is_some) {
                rows.push(FeatureRow {
                    date: bar.date,
                    close: bar.close,
                    values: columns.iter().flatten().copied().collect(),
                });
            }
        }
        rows
    }
}

fn one_day_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i == 0 || closes[i - 1] == 0.0 {
            out.push(None);
        } else {
            out.push(Some(closes[i] / closes[i - 1] - 1.0));
        }
    }
    out
}

fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current = values[i] * k + current * (1.0 - k);
        out[i] = Some(current);
    }
    out
}

fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_from(avg_gain, avg_loss));

    for i in (period + 1)..closes.len() {
        let idx = i - 1;
        avg_gain = (avg_gain * (period - 1) as f64 + gains[idx]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[idx]) / period as f64;
        out[i] = Some(rsi_from(avg_gain, avg_loss));
    }
    out
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

fn rolling_stddev(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    for i in 0..values.len() {
        if i + 1 < window {
            continue;
        }
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(Option::is_none) {
            continue;
        }
        let mean = slice.iter().flatten().sum::<f64>() / window as f64;
        let variance = slice
            .iter()
            .flatten()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / window as f64;
        out[i] = Some(variance.sqrt());
    }
    out
}
