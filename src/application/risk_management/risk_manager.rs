//! Validates and sizes every proposed trade before it reaches the order
//! manager. Grounded on the teacher's `application/risk_manager.rs` (session
//! equity tracking, circuit-breaker-style halt checks) expanded to the
//! original's `risk/manager.py` full validator pipeline and position-sizing
//! dispatch.

use super::sizing::{size_position, SizingInput, SizingMethod};
use super::validators;
use crate::domain::errors::RiskError;
use crate::domain::ports::{CorrelationProvider, SectorProvider};
use crate::domain::risk::state::RiskState;
use crate::domain::trading::portfolio::Portfolio;
use crate::domain::trading::types::{AggregatedSignal, OrderSide, RiskLimits};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct RiskManager {
    state: RwLock<RiskState>,
    limits: RiskLimits,
    emergency_stop: AtomicBool,
    sizing_method: SizingMethod,
    sector_provider: Option<Arc<dyn SectorProvider>>,
    correlation_provider: Option<Arc<dyn CorrelationProvider>>,
}

/// Everything `RiskManager` needs to validate and size one proposed trade.
pub struct TradeContext<'a> {
    pub signal: &'a AggregatedSignal,
    pub price: Decimal,
    pub portfolio: &'a Portfolio,
    pub current_prices: &'a std::collections::HashMap<String, Decimal>,
    pub day_trades_used: u64,
    pub realized_volatility: Option<f64>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits, sizing_method: SizingMethod) -> Self {
        Self {
            state: RwLock::new(RiskState::default()),
            limits,
            emergency_stop: AtomicBool::new(false),
            sizing_method,
            sector_provider: None,
            correlation_provider: None,
        }
    }

    pub fn with_sector_provider(mut self, provider: Arc<dyn SectorProvider>) -> Self {
        self.sector_provider = Some(provider);
        self
    }

    pub fn with_correlation_provider(mut self, provider: Arc<dyn CorrelationProvider>) -> Self {
        self.correlation_provider = Some(provider);
        self
    }

    pub async fn initialize_session(&self, starting_equity: Decimal) {
        let mut state = self.state.write().await;
        state.session_start_equity = starting_equity;
        state.daily_start_equity = starting_equity;
        state.equity_high_water_mark = starting_equity;
        state.reference_date = Utc::now().date_naive();
        info!(equity = %starting_equity, "risk manager session initialized");
    }

    pub fn trip_emergency_stop(&self) {
        warn!("emergency stop engaged");
        self.emergency_stop.store(true, Ordering::SeqCst);
    }

    pub fn clear_emergency_stop(&self) {
        self.emergency_stop.store(false, Ordering::SeqCst);
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop.load(Ordering::SeqCst)
    }

    /// Rolls the daily-loss baseline and resets the drawdown-reset flag when
    /// the reference date has advanced.
    pub async fn roll_day_if_needed(&self, current_equity: Decimal) {
        let today = Utc::now().date_naive();
        let mut state = self.state.write().await;
        if state.reference_date != today {
            state.reference_date = today;
            state.daily_start_equity = current_equity;
            state.daily_drawdown_reset = false;
        }
    }

    pub async fn update_high_water_mark(&self, current_equity: Decimal) {
        let mut state = self.state.write().await;
        if current_equity > state.equity_high_water_mark {
            state.equity_high_water_mark = current_equity;
        }
    }

    /// Runs the full validator pipeline in order, short-circuiting on the
    /// first failure, then sizes the trade if every check passes.
    pub async fn validate_and_size(&self, ctx: &TradeContext<'_>) -> Result<Decimal, RiskError> {
        validators::check_emergency_stop(self.is_emergency_stopped())?;

        let total_equity = ctx.portfolio.total_value(ctx.current_prices);
        let state = self.state.read().await.clone();

        validators::check_drawdown(total_equity, &state, &self.limits)?;
        validators::check_daily_loss(total_equity, &state, &self.limits)?;
        validators::check_pdt(ctx.day_trades_used, total_equity, &self.limits)?;

        let sizing_input = SizingInput {
            equity: total_equity,
            price: ctx.price,
            risk_per_trade_pct: Decimal::try_from(self.limits.max_position_pct / 100.0).unwrap_or_default(),
            realized_volatility: ctx.realized_volatility,
            target_volatility: Decimal::try_from(0.15).unwrap_or_default(),
            kelly_stats: None,
            open_position_count: ctx.portfolio.positions.len(),
        };
        let quantity = size_position(self.sizing_method, &sizing_input);
        if quantity.is_zero() {
            return Err(RiskError::PositionSizeLimit {
                symbol: ctx.signal.symbol.clone(),
                current_pct: 0.0,
                max_pct: self.limits.max_position_pct,
            });
        }

        let proposed_notional = quantity * ctx.price;
        validators::check_position_size(&ctx.signal.symbol, proposed_notional, total_equity, &self.limits)?;
        validators::check_portfolio_exposure(proposed_notional, ctx.portfolio, total_equity, &self.limits)?;

        if let Some(sector_provider) = &self.sector_provider {
            if let Some(sector) = sector_provider.sector_of(&ctx.signal.symbol) {
                let positions_with_sector: Vec<_> = ctx
                    .portfolio
                    .positions
                    .values()
                    .filter_map(|p| sector_provider.sector_of(&p.symbol).map(|s| (p, s)))
                    .collect();
                let positions_ref: Vec<_> = positions_with_sector.iter().map(|(p, s)| (*p, s.as_str())).collect();
                validators::check_sector_exposure(&sector, proposed_notional, &positions_ref, total_equity, &self.limits)?;
            }
        }

        if let Some(correlation_provider) = &self.correlation_provider {
            for other_symbol in ctx.portfolio.positions.keys() {
                if other_symbol == &ctx.signal.symbol {
                    continue;
                }
                if let Some(correlation) = correlation_provider.correlation(&ctx.signal.symbol, other_symbol) {
                    validators::check_correlation(&ctx.signal.symbol, other_symbol, correlation, &self.limits)?;
                }
            }
        }

        if ctx.signal.side == OrderSide::Buy {
            validators::check_buying_power(proposed_notional, ctx.portfolio)?;
        }

        Ok(quantity)
    }

    pub async fn current_state(&self) -> RiskState {
        self.state.read().await.clone()
    }
}
