//! Single-instrument backtest loop.
//!
//! Walks a [`MarketSeries`] once in date order. Every bar gets an equity
//! snapshot; every bar but the last gets a consensus decision and a state
//! transition. The last bar closes out any open position according to the
//! [`LiquidationPolicy`].

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use super::consensus::{Decision, decide};
use super::execution::{
    ClosedPosition, ExitFill, Thresholds, check_exit, close_position, enter_position,
};
use super::fees::FeePolicy;
use super::metrics::BacktestReport;
use super::ohlcv::PriceBar;
use super::oracle::OracleSet;
use super::portfolio::Portfolio;
use super::position::ExitReason;
use super::series::MarketSeries;
use super::tax::{AccountContext, TaxPolicy};

pub const DEFAULT_MIN_BARS: usize = 100;

/// How an open position is settled on the final bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LiquidationPolicy {
    /// Append the forced sale to the trade log (counts toward win rate).
    pub record_as_trade: bool,
    /// Charge capital gains tax on the forced sale.
    pub apply_tax: bool,
}

/// Immutable per-run parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub fee_policy: FeePolicy,
    pub tax_policy: TaxPolicy,
    pub account: AccountContext,
    pub thresholds: Thresholds,
    pub liquidation: LiquidationPolicy,
    pub min_bars: usize,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    /// Zero fees, no thresholds, default minimum history.
    pub fn new(initial_capital: f64, tax_policy: TaxPolicy) -> Self {
        Self {
            initial_capital,
            fee_policy: FeePolicy::default(),
            tax_policy,
            account: AccountContext::default(),
            thresholds: Thresholds::default(),
            liquidation: LiquidationPolicy::default(),
            min_bars: DEFAULT_MIN_BARS,
            risk_free_rate: 0.0,
        }
    }
}

/// The end-of-data forced sale. Reported whether or not it is also
/// recorded as a trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalLiquidation {
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: f64,
    pub entry_fees: f64,
    pub exit_fee: f64,
    pub tax: f64,
    pub proceeds: f64,
    pub recorded_as_trade: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BacktestOutcome {
    Completed(Box<BacktestReport>),
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },
}

impl BacktestOutcome {
    pub fn report(&self) -> Option<&BacktestReport> {
        match self {
            BacktestOutcome::Completed(report) => Some(report),
            BacktestOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn into_report(self) -> Option<BacktestReport> {
        match self {
            BacktestOutcome::Completed(report) => Some(*report),
            BacktestOutcome::InsufficientData { .. } => None,
        }
    }
}

pub fn run_backtest(
    ticker: &str,
    series: &MarketSeries,
    oracles: &OracleSet,
    config: &BacktestConfig,
) -> BacktestOutcome {
    if series.len() < config.min_bars {
        info!(
            ticker,
            bars = series.len(),
            minimum = config.min_bars,
            "insufficient data, skipping"
        );
        return BacktestOutcome::InsufficientData {
            ticker: ticker.to_string(),
            bars: series.len(),
            minimum: config.min_bars,
        };
    }

    info!(ticker, bars = series.len(), models = oracles.len(), "backtest started");

    let mut portfolio = Portfolio::new(config.initial_capital);
    let bars = series.bars();
    let last = bars.len().saturating_sub(1);

    for (i, (bar, row)) in bars.iter().zip(series.features()).enumerate() {
        portfolio.record_equity(bar.date, portfolio.mark_to_market(bar.close));
        if i == last {
            break;
        }

        let signal = decide(row, oracles);
        debug!(
            ticker,
            date = %bar.date,
            decision = ?signal.decision,
            bullish = signal.bullish_votes,
            cast = signal.votes_cast,
            "daily decision"
        );
        step(ticker, &mut portfolio, bar, signal.decision, config);
    }

    let liquidation = bars
        .last()
        .and_then(|bar| liquidate(ticker, &mut portfolio, bar, config));

    let report = BacktestReport::build(ticker, &portfolio, liquidation, config.risk_free_rate);
    info!(
        ticker,
        trades = report.total_trades,
        final_capital = report.final_capital,
        net_roi = report.net_roi,
        "backtest finished"
    );
    BacktestOutcome::Completed(Box::new(report))
}

fn step(
    ticker: &str,
    portfolio: &mut Portfolio,
    bar: &PriceBar,
    decision: Decision,
    config: &BacktestConfig,
) {
    if let Some(position) = portfolio.position() {
        let closed = check_exit(position, bar, decision, &config.thresholds.hold_period).map(
            |fill| {
                close_position(
                    position,
                    bar.date,
                    fill,
                    &config.fee_policy,
                    &config.tax_policy,
                    &config.account,
                    true,
                )
            },
        );
        if let Some(ClosedPosition {
            trade, proceeds, ..
        }) = closed
        {
            info!(
                ticker,
                date = %bar.date,
                reason = %trade.exit_reason,
                price = trade.exit_price,
                net_profit = trade.net_profit,
                "sell"
            );
            portfolio.close(proceeds);
            portfolio.record_trade(trade);
        }
        return;
    }

    if !decision.is_bullish() {
        return;
    }

    let capital = portfolio.capital();
    match enter_position(capital, bar, &config.fee_policy, &config.thresholds) {
        Some(position) => {
            info!(
                ticker,
                date = %bar.date,
                price = position.entry_price,
                quantity = position.quantity,
                fee = position.entry_fees,
                "buy"
            );
            portfolio.open(position);
        }
        None => debug!(ticker, date = %bar.date, capital, close = bar.close, "buy skipped"),
    }
}

fn liquidate(
    ticker: &str,
    portfolio: &mut Portfolio,
    bar: &PriceBar,
    config: &BacktestConfig,
) -> Option<TerminalLiquidation> {
    let position = portfolio.position()?;
    let fill = ExitFill {
        price: bar.close,
        reason: ExitReason::EndOfData,
    };
    let closed = close_position(
        position,
        bar.date,
        fill,
        &config.fee_policy,
        &config.tax_policy,
        &config.account,
        config.liquidation.apply_tax,
    );
    let entry_fees = position.entry_fees;

    let liquidation = TerminalLiquidation {
        date: bar.date,
        price: bar.close,
        quantity: closed.trade.quantity,
        entry_fees,
        exit_fee: closed.exit_fee,
        tax: closed.trade.tax_paid,
        proceeds: closed.proceeds,
        recorded_as_trade: config.liquidation.record_as_trade,
    };
    info!(
        ticker,
        date = %bar.date,
        price = bar.close,
        proceeds = closed.proceeds,
        recorded = liquidation.recorded_as_trade,
        "end-of-data liquidation"
    );

    portfolio.close(closed.proceeds);
    if config.liquidation.record_as_trade {
        portfolio.record_trade(closed.trade);
    }
    Some(liquidation)
}
