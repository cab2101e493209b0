//! Entry sizing, exit triggers and round-trip accounting.
//!
//! Long-only and all-in: a buy commits the whole cash balance less the entry
//! fee, a sell returns the proceeds less the exit fee and any tax.

use chrono::NaiveDate;

use super::consensus::Decision;
use super::fees::FeePolicy;
use super::hold_period::HoldPeriod;
use super::ohlcv::PriceBar;
use super::position::{ExitReason, Position, Trade};
use super::tax::{AccountContext, TaxPolicy};

/// Exit thresholds. A percentage of 0 disables that trigger.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Thresholds {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub hold_period: HoldPeriod,
}

impl Thresholds {
    pub fn stop_price(&self, entry_price: f64) -> f64 {
        if self.stop_loss_pct > 0.0 {
            entry_price * (1.0 - self.stop_loss_pct)
        } else {
            0.0
        }
    }

    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        if self.take_profit_pct > 0.0 {
            entry_price * (1.0 + self.take_profit_pct)
        } else {
            0.0
        }
    }
}

/// Price and reason for a position exit triggered on a given bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub price: f64,
    pub reason: ExitReason,
}

/// A closed position: the trade record and the cash it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub trade: Trade,
    pub exit_fee: f64,
    pub proceeds: f64,
}

/// Buy at the bar's close with all available capital.
///
/// Returns `None` when the capital cannot cover the entry fee or the close
/// is not a usable price.
pub fn enter_position(
    capital: f64,
    bar: &PriceBar,
    fee_policy: &FeePolicy,
    thresholds: &Thresholds,
) -> Option<Position> {
    if bar.close <= 0.0 || !bar.close.is_finite() {
        return None;
    }
    let fee = fee_policy.fee(capital);
    let investable = capital - fee;
    if investable <= 0.0 {
        return None;
    }
    Some(Position {
        quantity: investable / bar.close,
        entry_price: bar.close,
        entry_date: bar.date,
        entry_fees: fee,
        stop_loss: thresholds.stop_price(bar.close),
        take_profit: thresholds.take_profit_price(bar.close),
    })
}

/// Evaluate exits in priority order: stop-loss, then (once the hold period
/// has elapsed) take-profit, then a bearish model call.
///
/// Gaps are honoured: a stop fills at the open if the bar opened below the
/// stop, a target fills at the open if it opened above the target.
pub fn check_exit(
    position: &Position,
    bar: &PriceBar,
    decision: Decision,
    hold_period: &HoldPeriod,
) -> Option<ExitFill> {
    if position.should_stop_loss(bar.low) {
        return Some(ExitFill {
            price: position.stop_loss.min(bar.open),
            reason: ExitReason::StopLoss,
        });
    }

    if !hold_period.has_elapsed(position.entry_date, bar.date) {
        return None;
    }

    if position.should_take_profit(bar.high) {
        return Some(ExitFill {
            price: position.take_profit.max(bar.open),
            reason: ExitReason::TakeProfit,
        });
    }

    if decision.is_bearish() {
        return Some(ExitFill {
            price: bar.close,
            reason: ExitReason::ModelExit,
        });
    }

    None
}

/// Sell the whole position and settle fees and tax.
///
/// Tax is only charged when `apply_tax` is set and the round trip made a
/// gross profit after both fees.
pub fn close_position(
    position: &Position,
    exit_date: NaiveDate,
    fill: ExitFill,
    fee_policy: &FeePolicy,
    tax_policy: &TaxPolicy,
    account: &AccountContext,
    apply_tax: bool,
) -> ClosedPosition {
    let quantity = position.quantity;
    let exit_value = quantity * fill.price;
    let exit_fee = fee_policy.fee(exit_value);
    let total_fees = position.entry_fees + exit_fee;
    let gross_profit = exit_value - quantity * position.entry_price - total_fees;
    let holding_days = position.holding_days(exit_date);

    let tax_paid = if apply_tax && gross_profit > 0.0 {
        tax_policy.tax(gross_profit, holding_days, account)
    } else {
        0.0
    };
    let net_profit = gross_profit - tax_paid;
    let cost_basis = position.cost_basis();
    let profit_pct = (cost_basis > 0.0).then(|| net_profit / cost_basis);

    ClosedPosition {
        trade: Trade {
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            exit_date,
            exit_price: fill.price,
            quantity,
            total_fees,
            tax_paid,
            gross_profit,
            net_profit,
            profit_pct,
            holding_days,
            exit_reason: fill.reason,
        },
        exit_fee,
        proceeds: exit_value - exit_fee - tax_paid,
    }
}
