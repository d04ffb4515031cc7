//! Individual risk checks run in a fixed order by `RiskManager` before any
//! order is sized or submitted. Each validator is independent and stateless
//! over its inputs, mirroring the original's `risk/filters/*` one-check-per-
//! file layout, now expressed as an enum + free functions rather than a
//! trait-object registry (no dynamic filter registration is needed here).

use crate::domain::errors::RiskError;
use crate::domain::risk::state::RiskState;
use crate::domain::trading::portfolio::{Portfolio, Position};
use crate::domain::trading::types::RiskLimits;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Checked in order; the first failing validator short-circuits the pipeline.
pub const VALIDATION_ORDER: &[&str] = &[
    "emergency_stop",
    "drawdown",
    "daily_loss",
    "position_size",
    "portfolio_exposure",
    "sector_exposure",
    "correlation",
    "buying_power",
    "pdt",
];

pub fn check_emergency_stop(emergency_stop_active: bool) -> Result<(), RiskError> {
    if emergency_stop_active {
        return Err(RiskError::EmergencyStopActive);
    }
    Ok(())
}

pub fn check_drawdown(current_equity: Decimal, state: &RiskState, limits: &RiskLimits) -> Result<(), RiskError> {
    if state.equity_high_water_mark <= Decimal::ZERO {
        return Ok(());
    }
    let drawdown_pct = ((state.equity_high_water_mark - current_equity) / state.equity_high_water_mark)
        .to_f64()
        .unwrap_or(0.0)
        * 100.0;
    if drawdown_pct > limits.max_drawdown_pct {
        return Err(RiskError::MaxDrawdown {
            drawdown_pct,
            max_pct: limits.max_drawdown_pct,
        });
    }
    Ok(())
}

pub fn check_daily_loss(current_equity: Decimal, state: &RiskState, limits: &RiskLimits) -> Result<(), RiskError> {
    if state.daily_start_equity <= Decimal::ZERO {
        return Ok(());
    }
    let loss_pct = ((state.daily_start_equity - current_equity) / state.daily_start_equity)
        .to_f64()
        .unwrap_or(0.0)
        * 100.0;
    if loss_pct > limits.max_daily_loss_pct {
        return Err(RiskError::DailyLossLimit {
            loss_pct,
            limit_pct: limits.max_daily_loss_pct,
        });
    }
    Ok(())
}

pub fn check_position_size(symbol: &str, proposed_notional: Decimal, total_equity: Decimal, limits: &RiskLimits) -> Result<(), RiskError> {
    if total_equity <= Decimal::ZERO {
        return Ok(());
    }
    let current_pct = (proposed_notional / total_equity).to_f64().unwrap_or(0.0) * 100.0;
    if current_pct > limits.max_position_pct {
        return Err(RiskError::PositionSizeLimit {
            symbol: symbol.to_string(),
            current_pct,
            max_pct: limits.max_position_pct,
        });
    }
    Ok(())
}

/// Sums notional exposure of every open position in the portfolio, plus the
/// proposed trade, against equity.
pub fn check_portfolio_exposure(
    proposed_notional: Decimal,
    portfolio: &Portfolio,
    total_equity: Decimal,
    limits: &RiskLimits,
) -> Result<(), RiskError> {
    if total_equity <= Decimal::ZERO {
        return Ok(());
    }
    let existing_exposure: Decimal = portfolio.positions.values().map(|p| p.market_value.abs()).sum();
    let current_pct = ((existing_exposure + proposed_notional) / total_equity).to_f64().unwrap_or(0.0) * 100.0;
    if current_pct > limits.max_portfolio_exposure_pct {
        return Err(RiskError::PortfolioExposureLimit {
            current_pct,
            max_pct: limits.max_portfolio_exposure_pct,
        });
    }
    Ok(())
}

/// Sums notional exposure of every open position in `sector`, plus the
/// proposed trade, against equity.
pub fn check_sector_exposure(
    sector: &str,
    proposed_notional: Decimal,
    positions: &[(&Position, &str)],
    total_equity: Decimal,
    limits: &RiskLimits,
) -> Result<(), RiskError> {
    if total_equity <= Decimal::ZERO {
        return Ok(());
    }
    let existing: Decimal = positions
        .iter()
        .filter(|(_, s)| *s == sector)
        .map(|(p, _)| p.market_value.abs())
        .sum();
    let current_pct = ((existing + proposed_notional) / total_equity).to_f64().unwrap_or(0.0) * 100.0;
    if current_pct > limits.max_sector_exposure_pct {
        return Err(RiskError::SectorExposureLimit {
            sector: sector.to_string(),
            current_pct,
            max_pct: limits.max_sector_exposure_pct,
        });
    }
    Ok(())
}

pub fn check_correlation(symbol_a: &str, symbol_b: &str, correlation: f64, limits: &RiskLimits) -> Result<(), RiskError> {
    if correlation.abs() > limits.max_correlation {
        return Err(RiskError::CorrelationLimit {
            symbol_a: symbol_a.to_string(),
            symbol_b: symbol_b.to_string(),
            correlation,
        });
    }
    Ok(())
}

pub fn check_buying_power(needed: Decimal, portfolio: &Portfolio) -> Result<(), RiskError> {
    if needed > portfolio.cash {
        return Err(RiskError::InsufficientBuyingPower {
            need: needed,
            available: portfolio.cash,
        });
    }
    Ok(())
}

/// Pattern-day-trading protection: under $25,000 equity, a 4th day trade
/// within a rolling 5-day window is blocked rather than risk an account flag.
pub fn check_pdt(day_trades_used: u64, equity: Decimal, limits: &RiskLimits) -> Result<(), RiskError> {
    if equity < limits.min_equity_for_day_trading && day_trades_used >= limits.max_day_trades {
        return Err(RiskError::PdtProtection {
            day_trades: day_trades_used,
            equity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_emergency_stop_blocks_when_active() {
        assert!(check_emergency_stop(true).is_err());
        assert!(check_emergency_stop(false).is_ok());
    }

    #[test]
    fn test_position_size_limit_enforced() {
        let limits = RiskLimits::default();
        let result = check_position_size("AAPL", dec!(15_000), dec!(100_000), &limits);
        assert!(matches!(result, Err(RiskError::PositionSizeLimit { .. })));
    }

    #[test]
    fn test_position_size_within_limit_passes() {
        let limits = RiskLimits::default();
        let result = check_position_size("AAPL", dec!(5_000), dec!(100_000), &limits);
        assert!(result.is_ok());
    }

    #[test]
    fn test_buying_power_insufficient() {
        let portfolio = Portfolio::with_starting_cash(dec!(1000));
        let result = check_buying_power(dec!(5000), &portfolio);
        assert!(matches!(result, Err(RiskError::InsufficientBuyingPower { .. })));
    }

    #[test]
    fn test_pdt_blocks_under_min_equity_with_day_trades_used() {
        let limits = RiskLimits::default();
        let result = check_pdt(3, dec!(10_000), &limits);
        assert!(matches!(result, Err(RiskError::PdtProtection { .. })));
    }

    #[test]
    fn test_pdt_allows_above_min_equity() {
        let limits = RiskLimits::default();
        let result = check_pdt(10, dec!(30_000), &limits);
        assert!(result.is_ok());
    }

    #[test]
    fn test_portfolio_exposure_limit_enforced() {
        let limits = RiskLimits::default();
        let portfolio = Portfolio::with_starting_cash(dec!(100_000));
        let result = check_portfolio_exposure(dec!(90_000), &portfolio, dec!(100_000), &limits);
        assert!(matches!(result, Err(RiskError::PortfolioExposureLimit { .. })));
    }

    #[test]
    fn test_portfolio_exposure_within_limit_passes() {
        let limits = RiskLimits::default();
        let portfolio = Portfolio::with_starting_cash(dec!(100_000));
        let result = check_portfolio_exposure(dec!(10_000), &portfolio, dec!(100_000), &limits);
        assert!(result.is_ok());
    }

    #[test]
    fn test_correlation_limit_enforced() {
        let limits = RiskLimits::default();
        let result = check_correlation("AAPL", "MSFT", 0.9, &limits);
        assert!(matches!(result, Err(RiskError::CorrelationLimit { .. })));
    }
}
