//! Capital gains tax policies.
//!
//! Tax is only ever charged on a positive gross profit. Both policies apply
//! the long-term discount: a holding of at least [`LONG_TERM_DAYS`] halves the
//! taxable gain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const LONG_TERM_DAYS: i64 = 365;
pub const LONG_TERM_TAXABLE_FRACTION: f64 = 0.5;

/// Per-account inputs the marginal schedule needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountContext {
    /// Annual income the gain is stacked on top of.
    pub base_income: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub threshold: f64,
    pub rate: f64,
}

/// Stepped progressive schedule, thresholds ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketSchedule {
    brackets: Vec<Bracket>,
}

impl BracketSchedule {
    pub fn new(brackets: Vec<Bracket>) -> Result<Self, String> {
        if brackets.is_empty() {
            return Err("bracket schedule is empty".to_string());
        }
        for b in &brackets {
            if !b.threshold.is_finite() || b.threshold < 0.0 {
                return Err(format!("invalid bracket threshold {}", b.threshold));
            }
            if !(0.0..=1.0).contains(&b.rate) {
                return Err(format!("bracket rate {} must be between 0 and 1", b.rate));
            }
        }
        if brackets.windows(2).any(|w| w[0].threshold >= w[1].threshold) {
            return Err("bracket thresholds must be strictly ascending".to_string());
        }
        Ok(Self { brackets })
    }

    /// Australian resident individual rates, 2024-25.
    pub fn australia_2024() -> Self {
        Self {
            brackets: vec![
                Bracket { threshold: 0.0, rate: 0.0 },
                Bracket { threshold: 18_200.0, rate: 0.16 },
                Bracket { threshold: 45_000.0, rate: 0.30 },
                Bracket { threshold: 135_000.0, rate: 0.37 },
                Bracket { threshold: 190_000.0, rate: 0.45 },
            ],
        }
    }

    /// Resolve a preset name or parse `threshold:rate,threshold:rate,...`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("au-2024") {
            return Ok(Self::australia_2024());
        }

        let mut brackets = Vec::new();
        for token in trimmed.split(',') {
            let (threshold, rate) = token
                .split_once(':')
                .ok_or_else(|| format!("bracket '{}' must be threshold:rate", token.trim()))?;
            let threshold: f64 = threshold
                .trim()
                .parse()
                .map_err(|_| format!("invalid bracket threshold '{}'", threshold.trim()))?;
            let rate: f64 = rate
                .trim()
                .parse()
                .map_err(|_| format!("invalid bracket rate '{}'", rate.trim()))?;
            brackets.push(Bracket { threshold, rate });
        }
        Self::new(brackets)
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    /// Total tax owed on `income` under this schedule.
    pub fn tax(&self, income: f64) -> f64 {
        if income <= 0.0 {
            return 0.0;
        }
        let mut total = 0.0;
        for (i, bracket) in self.brackets.iter().enumerate() {
            if income <= bracket.threshold {
                break;
            }
            let upper = self
                .brackets
                .get(i + 1)
                .map(|next| next.threshold.min(income))
                .unwrap_or(income);
            total += (upper - bracket.threshold) * bracket.rate;
        }
        total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TaxPolicy {
    FlatDiscount { rate: f64 },
    MarginalBracket { schedule: BracketSchedule },
}

impl TaxPolicy {
    pub fn tax(&self, gross_profit: f64, holding_days: i64, context: &AccountContext) -> f64 {
        if gross_profit <= 0.0 {
            return 0.0;
        }
        let taxable = taxable_gain(gross_profit, holding_days);
        match self {
            TaxPolicy::FlatDiscount { rate } => taxable * rate,
            TaxPolicy::MarginalBracket { schedule } => {
                let base = context.base_income.max(0.0);
                (schedule.tax(base + taxable) - schedule.tax(base)).max(0.0)
            }
        }
    }

    pub fn kind(&self) -> TaxPolicyKind {
        match self {
            TaxPolicy::FlatDiscount { .. } => TaxPolicyKind::FlatDiscount,
            TaxPolicy::MarginalBracket { .. } => TaxPolicyKind::MarginalBracket,
        }
    }
}

/// Gain after the long-term discount; the boundary day is discounted.
pub fn taxable_gain(gross_profit: f64, holding_days: i64) -> f64 {
    if holding_days >= LONG_TERM_DAYS {
        gross_profit * LONG_TERM_TAXABLE_FRACTION
    } else {
        gross_profit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxPolicyKind {
    FlatDiscount,
    MarginalBracket,
}

impl FromStr for TaxPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat_discount" => Ok(TaxPolicyKind::FlatDiscount),
            "marginal_bracket" => Ok(TaxPolicyKind::MarginalBracket),
            other => Err(format!(
                "unknown tax policy '{other}' (expected flat_discount or marginal_bracket)"
            )),
        }
    }
}

impl fmt::Display for TaxPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxPolicyKind::FlatDiscount => write!(f, "flat_discount"),
            TaxPolicyKind::MarginalBracket => write!(f, "marginal_bracket"),
        }
    }
}
