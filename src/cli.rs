//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::artifact_adapter::JsonArtifactStore;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::BacktestConfig;
use crate::domain::batch::{Scanner, TickerResult, TickerStatus, load_series};
use crate::domain::config_validation::{self, DataSettings, ModelSettings, validate_config};
use crate::domain::consensus::decide_today;
use crate::domain::error::TraderError;
use crate::domain::features::{FeaturePreparer, FeatureSchema, TechnicalFeatures};
use crate::domain::oracle::OracleSet;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::model_port::ModelPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "oracletrader",
    about = "Consensus-driven single-instrument backtester"
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest every configured ticker
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated tickers, overriding [backtest] tickers
        #[arg(long)]
        ticker: Option<String>,
        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run tickers one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Today's consensus decision for one ticker
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
    },
    /// Validate configuration and model artifacts without running
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show stored data range for ticker(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Backtest {
            config,
            ticker,
            output,
            sequential,
        } => run_backtest(&config, ticker.as_deref(), output.as_deref(), sequential),
        Command::Signal { config, ticker } => run_signal(&config, &ticker),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // a subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Everything a command needs from a loaded, validated config file.
pub struct Session {
    pub adapter: FileConfigAdapter,
    pub data_settings: DataSettings,
    pub data: CsvAdapter,
    pub models: JsonArtifactStore,
}

impl Session {
    pub fn open(config_path: &Path) -> Result<Self, TraderError> {
        info!(config = %config_path.display(), "loading config");
        let adapter = FileConfigAdapter::from_file(config_path)?;
        validate_config(&adapter)?;
        let data_settings = config_validation::data_settings(&adapter)?;
        let data = CsvAdapter::new(resolve_dir(config_path, &data_settings.data_dir));
        let models = JsonArtifactStore::new(resolve_dir(config_path, &data_settings.models_dir));
        Ok(Self {
            adapter,
            data_settings,
            data,
            models,
        })
    }
}

/// Relative directories are taken relative to the config file.
pub fn resolve_dir(config_path: &Path, dir: &str) -> PathBuf {
    let dir = Path::new(dir);
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    config_path
        .parent()
        .map(|parent| parent.join(dir))
        .unwrap_or_else(|| dir.to_path_buf())
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    Ok(BacktestConfig {
        initial_capital: config_validation::initial_capital(adapter)?,
        fee_policy: config_validation::fee_policy(adapter)?,
        tax_policy: config_validation::tax_policy(adapter)?,
        account: config_validation::account_context(adapter)?,
        thresholds: config_validation::thresholds(adapter)?,
        liquidation: config_validation::liquidation_policy(adapter)?,
        min_bars: config_validation::min_bars(adapter)?,
        risk_free_rate: config_validation::risk_free_rate(adapter)?,
    })
}

/// Load every configured model once; the set is shared by all tickers.
pub fn build_oracle_set(
    settings: &ModelSettings,
    models: &dyn ModelPort,
    schema: &FeatureSchema,
) -> Result<OracleSet, TraderError> {
    let mut members = Vec::with_capacity(settings.ids.len());
    for id in &settings.ids {
        let oracle = models.load_artifact(id)?.into_oracle(schema)?;
        info!(model = %id, kind = %oracle.kind(), "model loaded");
        members.push((id.clone(), oracle));
    }
    let set = OracleSet::new(members, settings.tie_breaker.as_deref())?;
    Ok(match settings.timeout {
        Some(timeout) => set.with_timeout(timeout),
        None => set,
    })
}

/// `--ticker` wins over `[backtest] tickers`.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    adapter: &dyn ConfigPort,
) -> Result<Vec<String>, TraderError> {
    if let Some(raw) = ticker_override {
        return Ok(parse_tickers(raw)?);
    }
    config_validation::tickers(adapter)?.ok_or_else(|| TraderError::ConfigMissing {
        section: "backtest".into(),
        key: "tickers".into(),
    })
}

fn run_backtest(
    config_path: &Path,
    ticker_override: Option<&str>,
    output: Option<&Path>,
    sequential: bool,
) -> Result<(), TraderError> {
    let session = Session::open(config_path)?;
    let config = build_backtest_config(&session.adapter)?;
    let model_settings = config_validation::model_settings(&session.adapter)?;
    let tickers = resolve_tickers(ticker_override, &session.adapter)?;

    let preparer = TechnicalFeatures;
    let oracles = build_oracle_set(&model_settings, &session.models, &preparer.schema())?;

    let results = Scanner::new(
        &session.data,
        &preparer,
        &oracles,
        &config,
        session.data_settings.lookback_years,
    )
    .with_parallelism(!sequential)
    .scan(&tickers);

    print_summary(&results);

    let reports: Vec<_> = results
        .iter()
        .filter_map(|r| r.report().cloned())
        .collect();

    if reports.is_empty() {
        let short = results.iter().find_map(|r| match r.status {
            TickerStatus::InsufficientData { bars, minimum } => Some((r.ticker.clone(), bars, minimum)),
            _ => None,
        });
        return Err(match short {
            Some((ticker, bars, minimum)) => TraderError::InsufficientData {
                ticker,
                bars,
                minimum,
            },
            None => TraderError::Data {
                reason: "no ticker could be backtested".into(),
            },
        });
    }

    if let Some(path) = output {
        let writer = JsonReportAdapter;
        match reports.as_slice() {
            [single] if tickers.len() == 1 => writer.write(single, path)?,
            all => writer.write_batch(all, path)?,
        }
        eprintln!("Report written to: {}", path.display());
    }
    Ok(())
}

fn print_summary(results: &[TickerResult]) {
    for result in results {
        match &result.status {
            TickerStatus::Completed(report) => {
                let pf = report
                    .stats
                    .profit_factor
                    .map(|pf| format!("{pf:.2}"))
                    .unwrap_or_else(|| "n/a".into());
                let period = match (report.first_date(), report.last_date()) {
                    (Some(first), Some(last)) => format!("{first} to {last}"),
                    _ => "no bars".into(),
                };
                println!(
                    "{} ({}): {} trades, win rate {:.1}%, net ROI {:.2}%, gross ROI {:.2}%, max DD -{:.1}%, sharpe {:.2}, PF {}, final {:.2}",
                    report.ticker,
                    period,
                    report.total_trades,
                    report.win_rate * 100.0,
                    report.net_roi * 100.0,
                    report.gross_roi * 100.0,
                    report.stats.max_drawdown * 100.0,
                    report.stats.sharpe_ratio,
                    pf,
                    report.final_capital,
                );
            }
            TickerStatus::InsufficientData { bars, minimum } => {
                println!("{}: skipped, {} bars (minimum {})", result.ticker, bars, minimum);
            }
            TickerStatus::Failed(reason) => println!("{}: failed, {}", result.ticker, reason),
            TickerStatus::Cancelled => println!("{}: cancelled", result.ticker),
        }
    }
}

fn run_signal(config_path: &Path, ticker: &str) -> Result<(), TraderError> {
    let session = Session::open(config_path)?;
    let model_settings = config_validation::model_settings(&session.adapter)?;
    let ticker = ticker.trim().to_uppercase();

    let preparer = TechnicalFeatures;
    let oracles = build_oracle_set(&model_settings, &session.models, &preparer.schema())?;
    let series = load_series(
        &ticker,
        &session.data,
        &preparer,
        session.data_settings.lookback_years,
    )?;
    let latest = series.last_row().ok_or_else(|| TraderError::InsufficientData {
        ticker: ticker.clone(),
        bars: 0,
        minimum: 1,
    })?;

    let (decision, confidence) = decide_today(latest, &oracles);
    println!(
        "{} {}: {} (confidence {:.0}%, close {:.2})",
        ticker,
        latest.date,
        decision,
        confidence * 100.0,
        latest.close
    );
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let session = Session::open(config_path)?;
    let config = build_backtest_config(&session.adapter)?;
    let model_settings = config_validation::model_settings(&session.adapter)?;
    let oracles = build_oracle_set(&model_settings, &session.models, &TechnicalFeatures.schema())?;

    eprintln!("Capital:      {:.2}", config.initial_capital);
    eprintln!("Fees:         {}", config.fee_policy.kind());
    eprintln!("Tax:          {}", config.tax_policy.kind());
    eprintln!(
        "Thresholds:   stop {:.2}%, target {:.2}%, hold {}",
        config.thresholds.stop_loss_pct * 100.0,
        config.thresholds.take_profit_pct * 100.0,
        config.thresholds.hold_period
    );
    eprintln!(
        "Models:       {} (tie-breaker {})",
        oracles.ids().join(", "),
        oracles.tie_breaker_id()
    );
    if let Some(tickers) = config_validation::tickers(&session.adapter)? {
        eprintln!("Tickers:      {}", tickers.join(", "));
    }
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(config_path: &Path, ticker_override: Option<&str>) -> Result<(), TraderError> {
    let session = Session::open(config_path)?;
    let tickers = match resolve_tickers(ticker_override, &session.adapter) {
        Ok(tickers) => tickers,
        Err(TraderError::ConfigMissing { .. }) => session.data.list_tickers()?,
        Err(e) => return Err(e),
    };

    for ticker in &tickers {
        match session.data.data_range(ticker)? {
            Some((first, last, count)) => println!("{ticker}: {count} bars, {first} to {last}"),
            None => println!("{ticker}: no data found"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_dir_relative_to_config() {
        let config = Path::new("/etc/trader/config.ini");
        assert_eq!(resolve_dir(config, "data"), PathBuf::from("/etc/trader/data"));
        assert_eq!(resolve_dir(config, "/srv/data"), PathBuf::from("/srv/data"));
        assert_eq!(
            resolve_dir(Path::new("config.ini"), "data"),
            PathBuf::from("data")
        );
    }

    #[test]
    fn ticker_override_wins() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ntickers = AAA,BBB\n").unwrap();
        assert_eq!(resolve_tickers(Some("ccc"), &adapter).unwrap(), vec!["CCC"]);
        assert_eq!(resolve_tickers(None, &adapter).unwrap(), vec!["AAA", "BBB"]);
    }

    #[test]
    fn missing_tickers_is_config_missing() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        assert!(matches!(
            resolve_tickers(None, &adapter),
            Err(TraderError::ConfigMissing { key, .. }) if key == "tickers"
        ));
    }

    #[test]
    fn cli_parses_backtest() {
        let cli = Cli::parse_from([
            "oracletrader",
            "-v",
            "backtest",
            "-c",
            "config.ini",
            "--ticker",
            "BHP",
            "-o",
            "out.json",
        ]);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(
            cli.command,
            Command::Backtest { ticker: Some(ref t), sequential: false, .. } if t == "BHP"
        ));
    }
}
