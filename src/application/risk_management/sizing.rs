//! Position-sizing algorithms. Grounded on the teacher's
//! `risk_management/sizing_engine.rs` (`SizingConfig`, `KellyStats`,
//! volatility-targeting multiplier) and the original's `risk/manager.py`
//! `_fixed_fractional_sizing` / `_volatility_adjusted_sizing` /
//! `_kelly_criterion_sizing` / `_risk_parity_sizing`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMethod {
    FixedFractional,
    VolatilityAdjusted,
    KellyCriterion,
    RiskParity,
}

#[derive(Debug, Clone)]
pub struct SizingInput {
    pub equity: Decimal,
    pub price: Decimal,
    pub risk_per_trade_pct: Decimal,
    /// Annualized realized volatility of the symbol, if known (e.g. 0.25 = 25%).
    pub realized_volatility: Option<f64>,
    pub target_volatility: Decimal,
    pub kelly_stats: Option<KellyStats>,
    /// Number of open positions, used by risk-parity sizing to split risk budget evenly.
    pub open_position_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct KellyStats {
    pub win_rate: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub n_trades: usize,
}

impl KellyStats {
    /// Quarter-Kelly fraction: f* = (p*b - (1-p)*a) / b, then 0.25 * f*.
    /// Returns None with fewer than 30 trades — not enough signal to size on.
    pub fn quarter_kelly_fraction(&self) -> Option<Decimal> {
        if self.n_trades < 30 || self.avg_win <= Decimal::ZERO {
            return None;
        }
        let p = Decimal::from_f64_retain(self.win_rate).unwrap_or(Decimal::ZERO);
        let one_p = Decimal::ONE - p;
        let loss_as_positive = self.avg_loss.abs();
        let numerator = p * self.avg_win - one_p * loss_as_positive;
        let f_star = numerator.checked_div(self.avg_win).unwrap_or(Decimal::ZERO);
        if f_star <= Decimal::ZERO {
            return None;
        }
        Some((f_star * dec!(0.25)).clamp(Decimal::ZERO, Decimal::ONE))
    }
}

/// Computes an order quantity in shares/units given the sizing method and
/// input. Never returns a negative quantity; callers apply side separately.
pub fn size_position(method: SizingMethod, input: &SizingInput) -> Decimal {
    if input.price <= Decimal::ZERO || input.equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let qty = match method {
        SizingMethod::FixedFractional => fixed_fractional(input),
        SizingMethod::VolatilityAdjusted => volatility_adjusted(input),
        SizingMethod::KellyCriterion => kelly_criterion(input),
        SizingMethod::RiskParity => risk_parity(input),
    };

    qty.max(Decimal::ZERO).round_dp(4)
}

fn fixed_fractional(input: &SizingInput) -> Decimal {
    let risk_amount = input.equity * input.risk_per_trade_pct;
    risk_amount.checked_div(input.price).unwrap_or(Decimal::ZERO)
}

fn volatility_adjusted(input: &SizingInput) -> Decimal {
    let base = fixed_fractional(input);
    let Some(realized_vol) = input.realized_volatility else {
        return base;
    };
    if realized_vol <= 0.0 {
        return base;
    }
    let realized_vol_dec = Decimal::from_f64_retain(realized_vol).unwrap_or(Decimal::ONE);
    let multiplier = input
        .target_volatility
        .checked_div(realized_vol_dec)
        .unwrap_or(Decimal::ONE)
        .clamp(dec!(0.25), dec!(2.0));
    base * multiplier
}

fn kelly_criterion(input: &SizingInput) -> Decimal {
    let Some(stats) = input.kelly_stats else {
        return fixed_fractional(input);
    };
    let Some(fraction) = stats.quarter_kelly_fraction() else {
        return fixed_fractional(input);
    };
    let risk_amount = input.equity * fraction;
    risk_amount.checked_div(input.price).unwrap_or(Decimal::ZERO)
}

/// Splits a fixed total risk budget evenly across all currently open
/// positions plus the one about to be opened, so no single symbol
/// dominates portfolio risk regardless of its individual volatility.
fn risk_parity(input: &SizingInput) -> Decimal {
    let slots = (input.open_position_count + 1).max(1);
    let per_slot_pct = input
        .risk_per_trade_pct
        .checked_div(Decimal::from(slots as u64).max(Decimal::ONE))
        .unwrap_or(input.risk_per_trade_pct);
    let risk_amount = input.equity * per_slot_pct;
    risk_amount.checked_div(input.price).unwrap_or(Decimal::ZERO)
}

pub fn realized_volatility(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    Some(variance.sqrt() * periods_per_year.sqrt())
}
