//! Minimum holding period before take-profit or model exits apply.
//!
//! Quarters are 13 weeks. Months and years are calendar-aware and clamp to
//! the end of a shorter month (Jan 31 + 1 month = Feb 28/29).

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", content = "count", rename_all = "snake_case")]
pub enum HoldPeriod {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Quarters(u32),
    Years(u32),
}

impl Default for HoldPeriod {
    fn default() -> Self {
        HoldPeriod::Days(0)
    }
}

impl HoldPeriod {
    /// First date on which non-stop exits are allowed.
    pub fn eligible_from(&self, entry_date: NaiveDate) -> NaiveDate {
        let shifted = match *self {
            HoldPeriod::Days(n) => entry_date.checked_add_days(Days::new(n as u64)),
            HoldPeriod::Weeks(n) => entry_date.checked_add_days(Days::new(7 * n as u64)),
            HoldPeriod::Quarters(n) => entry_date.checked_add_days(Days::new(91 * n as u64)),
            HoldPeriod::Months(n) => entry_date.checked_add_months(Months::new(n)),
            HoldPeriod::Years(n) => n
                .checked_mul(12)
                .and_then(|m| entry_date.checked_add_months(Months::new(m))),
        };
        shifted.unwrap_or(NaiveDate::MAX)
    }

    pub fn has_elapsed(&self, entry_date: NaiveDate, today: NaiveDate) -> bool {
        today >= self.eligible_from(entry_date)
    }
}

impl FromStr for HoldPeriod {
    type Err = String;

    /// `Nd`, `Nw`, `Nm`, `Nq` or `Ny`, e.g. `30d`, `1m`, `2q`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (count, unit) = match s.char_indices().last() {
            Some((idx, _)) if idx > 0 => s.split_at(idx),
            _ => {
                return Err(format!(
                    "invalid hold period '{s}' (expected e.g. 30d, 1m, 1q, 1y)"
                ));
            }
        };
        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| format!("invalid hold period count '{count}'"))?;
        match unit {
            "d" => Ok(HoldPeriod::Days(count)),
            "w" => Ok(HoldPeriod::Weeks(count)),
            "m" => Ok(HoldPeriod::Months(count)),
            "q" => Ok(HoldPeriod::Quarters(count)),
            "y" => Ok(HoldPeriod::Years(count)),
            other => Err(format!("unknown hold period unit '{other}' (expected d, w, m, q or y)")),
        }
    }
}

impl fmt::Display for HoldPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldPeriod::Days(n) => write!(f, "{n}d"),
            HoldPeriod::Weeks(n) => write!(f, "{n}w"),
            HoldPeriod::Months(n) => write!(f, "{n}m"),
            HoldPeriod::Quarters(n) => write!(f, "{n}q"),
            HoldPeriod::Years(n) => write!(f, "{n}y"),
        }
    }
}
