//! Configuration validation.
//!
//! Every field is read and checked by its own function so that a bad value
//! is reported against the exact `[section] key` it came from. Nothing here
//! falls back silently on an unparsable value: absent keys take their
//! documented default, present-but-invalid keys are errors.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::backtest::{DEFAULT_MIN_BARS, LiquidationPolicy};
use crate::domain::error::TraderError;
use crate::domain::execution::Thresholds;
use crate::domain::fees::{FeePolicy, FeePolicyKind};
use crate::domain::hold_period::HoldPeriod;
use crate::domain::tax::{AccountContext, BracketSchedule, TaxPolicy, TaxPolicyKind};
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LOOKBACK_YEARS: u32 = 5;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Where bars and artifacts live, and how much history to load.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub data_dir: String,
    pub models_dir: String,
    pub lookback_years: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub ids: Vec<String>,
    pub tie_breaker: Option<String>,
    /// `None` when the oracle timeout is disabled.
    pub timeout: Option<Duration>,
}

/// Check every section without building anything.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    initial_capital(config)?;
    min_bars(config)?;
    risk_free_rate(config)?;
    data_settings(config)?;
    tickers(config)?;
    fee_policy(config)?;
    tax_policy(config)?;
    account_context(config)?;
    thresholds(config)?;
    liquidation_policy(config)?;
    model_settings(config)?;
    Ok(())
}

pub fn initial_capital(config: &dyn ConfigPort) -> Result<f64, TraderError> {
    let value = require_f64(config, "backtest", "initial_capital")?;
    if value <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }
    Ok(value)
}

pub fn min_bars(config: &dyn ConfigPort) -> Result<usize, TraderError> {
    let value = read_u64(config, "backtest", "min_bars")?.unwrap_or(DEFAULT_MIN_BARS as u64);
    if value < 1 {
        return Err(invalid("backtest", "min_bars", "min_bars must be at least 1"));
    }
    usize::try_from(value).map_err(|_| invalid("backtest", "min_bars", "min_bars is too large"))
}

pub fn risk_free_rate(config: &dyn ConfigPort) -> Result<f64, TraderError> {
    let value = read_f64(config, "backtest", "risk_free_rate")?.unwrap_or(0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(value)
}

pub fn data_settings(config: &dyn ConfigPort) -> Result<DataSettings, TraderError> {
    let lookback = read_u64(config, "backtest", "lookback_years")?
        .unwrap_or(DEFAULT_LOOKBACK_YEARS as u64);
    if lookback < 1 || lookback > 100 {
        return Err(invalid(
            "backtest",
            "lookback_years",
            "lookback_years must be between 1 and 100",
        ));
    }
    Ok(DataSettings {
        data_dir: non_empty_or(config, "backtest", "data_dir", DEFAULT_DATA_DIR),
        models_dir: non_empty_or(config, "backtest", "models_dir", DEFAULT_MODELS_DIR),
        lookback_years: lookback as u32,
    })
}

/// Configured tickers, or `None` when the key is absent.
pub fn tickers(config: &dyn ConfigPort) -> Result<Option<Vec<String>>, TraderError> {
    match config.get_string("backtest", "tickers") {
        None => Ok(None),
        Some(raw) => parse_tickers(&raw)
            .map(Some)
            .map_err(|e| invalid("backtest", "tickers", &e.to_string())),
    }
}

pub fn fee_policy(config: &dyn ConfigPort) -> Result<FeePolicy, TraderError> {
    let kind = match config.get_string("fees", "policy") {
        None => FeePolicyKind::RateFlat,
        Some(s) => FeePolicyKind::from_str(&s).map_err(|e| invalid("fees", "policy", &e))?,
    };
    match kind {
        FeePolicyKind::RateFlat => Ok(FeePolicy::RateFlat {
            brokerage_rate: non_negative(config, "fees", "brokerage_rate")?,
            clearing_rate: non_negative(config, "fees", "clearing_rate")?,
            settlement_fee: non_negative(config, "fees", "settlement_fee")?,
        }),
        FeePolicyKind::MinOrRate => Ok(FeePolicy::MinOrRate {
            minimum: non_negative(config, "fees", "minimum")?,
            rate: non_negative(config, "fees", "rate")?,
        }),
    }
}

/// The tax policy must be chosen explicitly.
pub fn tax_policy(config: &dyn ConfigPort) -> Result<TaxPolicy, TraderError> {
    let raw = config
        .get_string("tax", "policy")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing("tax", "policy"))?;
    let kind = TaxPolicyKind::from_str(&raw).map_err(|e| invalid("tax", "policy", &e))?;

    match kind {
        TaxPolicyKind::FlatDiscount => {
            let rate = require_f64(config, "tax", "flat_rate")?;
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid("tax", "flat_rate", "flat_rate must be between 0 and 1"));
            }
            Ok(TaxPolicy::FlatDiscount { rate })
        }
        TaxPolicyKind::MarginalBracket => {
            let schedule = match config.get_string("tax", "schedule") {
                None => BracketSchedule::australia_2024(),
                Some(s) => BracketSchedule::parse(&s).map_err(|e| invalid("tax", "schedule", &e))?,
            };
            Ok(TaxPolicy::MarginalBracket { schedule })
        }
    }
}

pub fn account_context(config: &dyn ConfigPort) -> Result<AccountContext, TraderError> {
    Ok(AccountContext {
        base_income: non_negative(config, "tax", "base_income")?,
    })
}

pub fn thresholds(config: &dyn ConfigPort) -> Result<Thresholds, TraderError> {
    let stop_loss_pct = non_negative(config, "thresholds", "stop_loss")?;
    if stop_loss_pct >= 1.0 {
        return Err(invalid("thresholds", "stop_loss", "stop_loss must be below 1"));
    }
    let take_profit_pct = non_negative(config, "thresholds", "take_profit")?;
    let hold_period = match config.get_string("thresholds", "hold_period") {
        None => HoldPeriod::default(),
        Some(s) => HoldPeriod::from_str(&s).map_err(|e| invalid("thresholds", "hold_period", &e))?,
    };
    Ok(Thresholds {
        stop_loss_pct,
        take_profit_pct,
        hold_period,
    })
}

pub fn liquidation_policy(config: &dyn ConfigPort) -> Result<LiquidationPolicy, TraderError> {
    Ok(LiquidationPolicy {
        record_as_trade: read_bool(config, "liquidation", "record_as_trade")?.unwrap_or(false),
        apply_tax: read_bool(config, "liquidation", "apply_tax")?.unwrap_or(false),
    })
}

pub fn model_settings(config: &dyn ConfigPort) -> Result<ModelSettings, TraderError> {
    let raw = config
        .get_string("models", "ids")
        .filter(|s| !s.trim().is_empty())
        .ok_or(TraderError::EmptyModelSet)?;

    let mut ids: Vec<String> = Vec::new();
    for token in raw.split(',') {
        let id = token.trim();
        if id.is_empty() {
            return Err(invalid("models", "ids", "empty token in model list"));
        }
        if ids.iter().any(|existing| existing == id) {
            return Err(TraderError::DuplicateModel {
                model_id: id.to_string(),
            });
        }
        ids.push(id.to_string());
    }

    let tie_breaker = config
        .get_string("models", "tie_breaker")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(tb) = &tie_breaker
        && !ids.contains(tb)
    {
        return Err(TraderError::UnknownTieBreaker {
            model_id: tb.clone(),
        });
    }

    let timeout_ms = read_u64(config, "models", "timeout_ms")?.unwrap_or(0);
    Ok(ModelSettings {
        ids,
        tie_breaker,
        timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
    })
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> TraderError {
    TraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn read_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("'{s}' is not a number"))),
        },
    }
}

fn require_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, TraderError> {
    read_f64(config, section, key)?.ok_or_else(|| missing(section, key))
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, TraderError> {
    let value = read_f64(config, section, key)?.unwrap_or(0.0);
    if value < 0.0 {
        return Err(invalid(section, key, &format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn read_u64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<u64>, TraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("'{s}' is not a non-negative integer"))),
    }
}

fn read_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<bool>, TraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(invalid(section, key, &format!("'{s}' is not a boolean"))),
        },
    }
}

fn non_empty_or(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[backtest]\ninitial_capital = 10000\n[tax]\npolicy = flat_discount\nflat_rate = 0.22\n[models]\nids = ridge\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BASE}{extra}"))
    }

    fn invalid_key(err: TraderError) -> String {
        match err {
            TraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 10000000
min_bars = 120
lookback_years = 3
risk_free_rate = 0.02
tickers = 005930,000660
data_dir = prices
models_dir = artifacts

[fees]
policy = min_or_rate
minimum = 10
rate = 0.001

[tax]
policy = marginal_bracket
schedule = 0:0,18200:0.16,45000:0.30
base_income = 60000

[thresholds]
stop_loss = 0.1
take_profit = 0.2
hold_period = 1q

[liquidation]
record_as_trade = yes
apply_tax = no

[models]
ids = ridge, svr
tie_breaker = svr
timeout_ms = 250
"#,
        );
        assert!(validate_config(&config).is_ok());
        assert_eq!(min_bars(&config).unwrap(), 120);
        assert_eq!(
            fee_policy(&config).unwrap(),
            FeePolicy::MinOrRate {
                minimum: 10.0,
                rate: 0.001
            }
        );
        assert!(matches!(
            tax_policy(&config).unwrap(),
            TaxPolicy::MarginalBracket { .. }
        ));
        assert_eq!(thresholds(&config).unwrap().hold_period, HoldPeriod::Quarters(1));
        assert_eq!(
            liquidation_policy(&config).unwrap(),
            LiquidationPolicy {
                record_as_trade: true,
                apply_tax: false
            }
        );
        let models = model_settings(&config).unwrap();
        assert_eq!(models.ids, vec!["ridge", "svr"]);
        assert_eq!(models.tie_breaker.as_deref(), Some("svr"));
        assert_eq!(models.timeout, Some(Duration::from_millis(250)));
        let data = data_settings(&config).unwrap();
        assert_eq!(data.data_dir, "prices");
        assert_eq!(data.lookback_years, 3);
        assert_eq!(
            tickers(&config).unwrap(),
            Some(vec!["005930".to_string(), "000660".to_string()])
        );
    }

    #[test]
    fn defaults_apply_to_absent_keys() {
        let config = make_config(BASE);
        assert!(validate_config(&config).is_ok());
        assert_eq!(min_bars(&config).unwrap(), DEFAULT_MIN_BARS);
        assert_eq!(fee_policy(&config).unwrap(), FeePolicy::default());
        assert_eq!(thresholds(&config).unwrap(), Thresholds::default());
        assert_eq!(liquidation_policy(&config).unwrap(), LiquidationPolicy::default());
        assert_eq!(model_settings(&config).unwrap().timeout, None);
        assert_eq!(tickers(&config).unwrap(), None);
        assert_eq!(data_settings(&config).unwrap().models_dir, DEFAULT_MODELS_DIR);
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        assert_eq!(invalid_key(initial_capital(&config).unwrap_err()), "initial_capital");
    }

    #[test]
    fn initial_capital_is_required() {
        let config = make_config("[backtest]\n");
        assert!(matches!(
            initial_capital(&config).unwrap_err(),
            TraderError::ConfigMissing { key, .. } if key == "initial_capital"
        ));
    }

    #[test]
    fn unparsable_number_is_not_defaulted() {
        let config = with("[thresholds]\nstop_loss = ten\n");
        assert_eq!(invalid_key(validate_config(&config).unwrap_err()), "stop_loss");
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[backtest]\nrisk_free_rate = 1.5\n");
        assert_eq!(invalid_key(risk_free_rate(&config).unwrap_err()), "risk_free_rate");
    }

    #[test]
    fn negative_fee_fails() {
        let config = with("[fees]\nbrokerage_rate = -0.01\n");
        assert_eq!(invalid_key(fee_policy(&config).unwrap_err()), "brokerage_rate");
    }

    #[test]
    fn unknown_fee_policy_fails() {
        let config = with("[fees]\npolicy = tiered\n");
        assert_eq!(invalid_key(fee_policy(&config).unwrap_err()), "policy");
    }

    #[test]
    fn tax_policy_is_required() {
        let config = make_config("[tax]\nflat_rate = 0.2\n");
        assert!(matches!(
            tax_policy(&config).unwrap_err(),
            TraderError::ConfigMissing { key, .. } if key == "policy"
        ));
    }

    #[test]
    fn flat_rate_required_for_flat_discount() {
        let config = make_config("[tax]\npolicy = flat_discount\n");
        assert!(matches!(
            tax_policy(&config).unwrap_err(),
            TraderError::ConfigMissing { key, .. } if key == "flat_rate"
        ));
    }

    #[test]
    fn marginal_bracket_defaults_to_preset() {
        let config = make_config("[tax]\npolicy = marginal_bracket\n");
        assert_eq!(
            tax_policy(&config).unwrap(),
            TaxPolicy::MarginalBracket {
                schedule: BracketSchedule::australia_2024()
            }
        );
    }

    #[test]
    fn bad_schedule_fails() {
        let config = make_config("[tax]\npolicy = marginal_bracket\nschedule = 0:abc\n");
        assert_eq!(invalid_key(tax_policy(&config).unwrap_err()), "schedule");
    }

    #[test]
    fn stop_loss_of_one_fails() {
        let config = with("[thresholds]\nstop_loss = 1.0\n");
        assert_eq!(invalid_key(thresholds(&config).unwrap_err()), "stop_loss");
    }

    #[test]
    fn bad_hold_period_fails() {
        let config = with("[thresholds]\nhold_period = 1x\n");
        assert_eq!(invalid_key(thresholds(&config).unwrap_err()), "hold_period");
    }

    #[test]
    fn non_ascii_hold_period_fails_cleanly() {
        let config = with("[thresholds]\nhold_period = 3月\n");
        assert_eq!(invalid_key(thresholds(&config).unwrap_err()), "hold_period");
    }

    #[test]
    fn bad_bool_fails() {
        let config = with("[liquidation]\napply_tax = maybe\n");
        assert_eq!(invalid_key(liquidation_policy(&config).unwrap_err()), "apply_tax");
    }

    #[test]
    fn models_required() {
        let config = make_config("[models]\nids =   \n");
        assert!(matches!(model_settings(&config).unwrap_err(), TraderError::EmptyModelSet));
    }

    #[test]
    fn duplicate_model_fails() {
        let config = make_config("[models]\nids = ridge,svr,ridge\n");
        assert!(matches!(
            model_settings(&config).unwrap_err(),
            TraderError::DuplicateModel { model_id } if model_id == "ridge"
        ));
    }

    #[test]
    fn unknown_tie_breaker_fails() {
        let config = make_config("[models]\nids = ridge,svr\ntie_breaker = lstm\n");
        assert!(matches!(
            model_settings(&config).unwrap_err(),
            TraderError::UnknownTieBreaker { model_id } if model_id == "lstm"
        ));
    }

    #[test]
    fn duplicate_ticker_fails() {
        let config = with("[backtest]\ntickers = BHP,bhp\n");
        assert_eq!(invalid_key(tickers(&config).unwrap_err()), "tickers");
    }

    #[test]
    fn lookback_out_of_range_fails() {
        let config = make_config("[backtest]\nlookback_years = 0\n");
        assert_eq!(invalid_key(data_settings(&config).unwrap_err()), "lookback_years");
    }
}
