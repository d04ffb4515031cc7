//! Owns the live `Portfolio`, applies fills, marks positions to the latest
//! price on every candle, and periodically computes performance metrics
//! over the portfolio's equity history. Grounded on the original's
//! `portfolio/manager.py` (real-time valuation, periodic metrics
//! calculation) using `domain::risk::metrics::compute_risk_metrics` for the
//! statistical work, and the teacher's RwLock-guarded shared-state idiom.

use crate::domain::errors::DataError;
use crate::domain::events::Event;
use crate::domain::risk::metrics::{compute_risk_metrics, RiskMetrics};
use crate::domain::trading::portfolio::Portfolio;
use crate::domain::trading::types::{Candle, OrderSide};
use crate::infrastructure::EventBus;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const EQUITY_HISTORY_CAPACITY: usize = 10_000;

pub struct PortfolioManager {
    portfolio: Arc<RwLock<Portfolio>>,
    current_prices: RwLock<HashMap<String, Decimal>>,
    equity_history: RwLock<VecDeque<Decimal>>,
    event_bus: EventBus,
}

impl PortfolioManager {
    pub fn new(portfolio: Arc<RwLock<Portfolio>>, event_bus: EventBus) -> Self {
        Self {
            portfolio,
            current_prices: RwLock::new(HashMap::new()),
            equity_history: RwLock::new(VecDeque::new()),
            event_bus,
        }
    }

    pub fn portfolio_handle(&self) -> Arc<RwLock<Portfolio>> {
        Arc::clone(&self.portfolio)
    }

    /// Marks the symbol's position to the candle's close and publishes
    /// `PortfolioValueChanged` with the refreshed total.
    pub async fn on_market_data(&self, candle: &Candle) {
        self.current_prices.write().await.insert(candle.symbol.clone(), candle.close);

        let mut portfolio = self.portfolio.write().await;
        if let Some(position) = portfolio.positions.get_mut(&candle.symbol) {
            position.mark(candle.close);
        }

        let prices = self.current_prices.read().await.clone();
        let total_value = portfolio.total_value(&prices);
        let cash = portfolio.cash;
        let unrealized = portfolio.unrealized_pnl(&prices);
        if total_value > portfolio.max_equity {
            portfolio.max_equity = total_value;
        }
        drop(portfolio);

        self.record_equity(total_value).await;

        let _ = self
            .event_bus
            .publish(Event::PortfolioValueChanged {
                event_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                correlation_id: Uuid::new_v4(),
                total_value,
                cash,
                unrealized_pnl: unrealized,
            })
            .await;
    }

    /// Applies a broker fill to the portfolio and publishes `PositionChanged`.
    pub async fn apply_fill(&self, symbol: &str, side: OrderSide, fill_qty: Decimal, fill_price: Decimal, commission: Decimal) -> Decimal {
        let (realized, position_snapshot) = {
            let mut portfolio = self.portfolio.write().await;
            let realized = portfolio.apply_fill(symbol, side, fill_qty, fill_price, commission);
            let snapshot = portfolio.positions.get(symbol).map(|p| (p.quantity, p.average_price));
            (realized, snapshot)
        };

        if let Some((quantity, average_price)) = position_snapshot {
            let _ = self
                .event_bus
                .publish(Event::PositionChanged {
                    event_id: Uuid::new_v4(),
                    timestamp: Utc::now(),
                    correlation_id: Uuid::new_v4(),
                    symbol: symbol.to_string(),
                    quantity,
                    average_price,
                })
                .await;
        }

        realized
    }

    async fn record_equity(&self, value: Decimal) {
        let mut history = self.equity_history.write().await;
        if history.len() >= EQUITY_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(value);
    }

    /// Computes portfolio-wide risk metrics from the recorded equity curve.
    /// Returns `DataError::InvalidCandle`-free `Ok(None)` when there isn't
    /// enough history yet rather than an error — this is an expected,
    /// transient state right after startup.
    pub async fn compute_performance_metrics(&self) -> Result<Option<RiskMetrics>, DataError> {
        let history = self.equity_history.read().await;
        if history.len() < 2 {
            return Ok(None);
        }
        let returns: Vec<f64> = history
            .iter()
            .zip(history.iter().skip(1))
            .map(|(prev, cur)| {
                if prev.is_zero() {
                    0.0
                } else {
                    ((*cur - *prev) / *prev).to_f64().unwrap_or(0.0)
                }
            })
            .collect();
        drop(history);

        let portfolio = self.portfolio.read().await;
        let prices = self.current_prices.read().await;
        let total_value = portfolio.total_value(&prices);
        let weights: Vec<f64> = portfolio
            .positions
            .values()
            .filter_map(|p| (p.market_value / total_value.max(Decimal::ONE)).to_f64())
            .collect();

        Ok(Some(compute_risk_metrics(&returns, &weights, 0.0)))
    }

    pub async fn publish_risk_metrics(&self) {
        if let Ok(Some(metrics)) = self.compute_performance_metrics().await {
            let _ = self
                .event_bus
                .publish(Event::RiskMetrics {
                    event_id: Uuid::new_v4(),
                    timestamp: Utc::now(),
                    correlation_id: Uuid::new_v4(),
                    sharpe: metrics.sharpe_ratio,
                    max_drawdown_pct: metrics.max_drawdown_pct,
                    var_95: metrics.var_95,
                })
                .await;
        }
    }

    pub async fn current_prices(&self) -> HashMap<String, Decimal> {
        self.current_prices.read().await.clone()
    }
}
