//! Result aggregation: reduce the trade and equity logs into a report.

use chrono::NaiveDate;
use serde::Serialize;

use super::backtest::TerminalLiquidation;
use super::portfolio::{EquitySnapshot, Portfolio};
use super::position::Trade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStats {
    pub total_fees: f64,
    pub total_tax: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_duration: i64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub avg_holding_days: f64,
    /// `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub trades_won: usize,
    pub trades_lost: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub ticker: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_trades: usize,
    pub win_rate: f64,
    pub net_roi: f64,
    pub gross_roi: f64,
    pub trades: Vec<Trade>,
    pub equity_history: Vec<EquitySnapshot>,
    pub liquidation: Option<TerminalLiquidation>,
    pub stats: ReportStats,
}

impl BacktestReport {
    /// `portfolio` must already be flat.
    pub fn build(
        ticker: &str,
        portfolio: &Portfolio,
        liquidation: Option<TerminalLiquidation>,
        risk_free_rate: f64,
    ) -> Self {
        let initial = portfolio.initial_capital;
        let final_capital = portfolio.capital();
        let trades = &portfolio.trades;

        let mut total_fees: f64 = trades.iter().map(|t| t.total_fees).sum();
        let mut total_tax: f64 = trades.iter().map(|t| t.tax_paid).sum();
        if let Some(liq) = liquidation.as_ref().filter(|l| !l.recorded_as_trade) {
            total_fees += liq.entry_fees + liq.exit_fee;
            total_tax += liq.tax;
        }

        let net_roi = roi(initial, final_capital);
        let gross_roi = roi(initial, final_capital + total_fees + total_tax);
        let trades_won = trades.iter().filter(|t| t.is_win()).count();
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            trades_won as f64 / trades.len() as f64
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&portfolio.equity_curve);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&portfolio.equity_curve, daily_rf);

        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        for trade in trades {
            let pnl = trade.net_profit;
            if pnl > 0.0 {
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let profit_factor = (total_losses > 0.0).then(|| total_wins / total_losses);
        let avg_holding_days = if trades.is_empty() {
            0.0
        } else {
            trades.iter().map(|t| t.holding_days as f64).sum::<f64>() / trades.len() as f64
        };

        BacktestReport {
            ticker: ticker.to_string(),
            initial_capital: initial,
            final_capital,
            total_trades: trades.len(),
            win_rate,
            net_roi,
            gross_roi,
            trades: trades.clone(),
            equity_history: portfolio.equity_curve.clone(),
            liquidation,
            stats: ReportStats {
                total_fees,
                total_tax,
                max_drawdown,
                max_drawdown_duration,
                sharpe_ratio,
                sortino_ratio,
                avg_holding_days,
                profit_factor,
                largest_win,
                largest_loss,
                trades_won,
                trades_lost,
            },
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.equity_history.first().map(|s| s.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.equity_history.last().map(|s| s.date)
    }
}

fn roi(initial: f64, value: f64) -> f64 {
    if initial > 0.0 {
        (value - initial) / initial
    } else {
        0.0
    }
}

fn compute_drawdown(equity_curve: &[EquitySnapshot]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.value >= peak {
            peak = point.value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.value) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquitySnapshot], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].value;
            if prev > 0.0 {
                (w[1].value - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
