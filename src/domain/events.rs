//! The single tagged-sum event type carried on the event bus. Every variant
//! carries its own `event_id`/`timestamp`/`correlation_id` so handlers never
//! need to downcast or reflect on a trait object to dispatch.

use crate::domain::trading::types::{Candle, OrderSide, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MarketData {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        candle: Candle,
    },
    SignalGenerated {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        strategy_id: String,
        symbol: String,
        side: OrderSide,
        confidence: f64,
        reason: String,
    },
    OrderCreated {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        order_id: String,
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
    },
    OrderFilled {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        order_id: String,
        symbol: String,
        side: OrderSide,
        fill_qty: Decimal,
        fill_price: Decimal,
        commission: Decimal,
    },
    OrderStatusChanged {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        order_id: String,
        status: OrderStatus,
    },
    PositionChanged {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        symbol: String,
        quantity: Decimal,
        average_price: Decimal,
    },
    PortfolioValueChanged {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        total_value: Decimal,
        cash: Decimal,
        unrealized_pnl: Decimal,
    },
    RiskViolation {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        kind: String,
        severity: String,
        detail: String,
    },
    RiskMetrics {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        sharpe: Option<f64>,
        max_drawdown_pct: f64,
        var_95: Decimal,
    },
    StrategyStatusChanged {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        strategy_id: String,
        status: String,
    },
    BrokerHealthAlert {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        broker: String,
        level: String,
        message: String,
    },
}

impl Event {
    /// A short, stable name for the event's variant, used for handler routing
    /// and for stats/log keys (`event_type` in the monitor task).
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::MarketData { .. } => "market_data",
            Event::SignalGenerated { .. } => "signal_generated",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderFilled { .. } => "order_filled",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::PositionChanged { .. } => "position_changed",
            Event::PortfolioValueChanged { .. } => "portfolio_value_changed",
            Event::RiskViolation { .. } => "risk_violation",
            Event::RiskMetrics { .. } => "risk_metrics",
            Event::StrategyStatusChanged { .. } => "strategy_status_changed",
            Event::BrokerHealthAlert { .. } => "broker_health_alert",
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        match self {
            Event::MarketData { correlation_id, .. }
            | Event::SignalGenerated { correlation_id, .. }
            | Event::OrderCreated { correlation_id, .. }
            | Event::OrderFilled { correlation_id, .. }
            | Event::OrderStatusChanged { correlation_id, .. }
            | Event::PositionChanged { correlation_id, .. }
            | Event::PortfolioValueChanged { correlation_id, .. }
            | Event::RiskViolation { correlation_id, .. }
            | Event::RiskMetrics { correlation_id, .. }
            | Event::StrategyStatusChanged { correlation_id, .. }
            | Event::BrokerHealthAlert { correlation_id, .. } => *correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let e = Event::RiskViolation {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            kind: "position_size".to_string(),
            severity: "warning".to_string(),
            detail: "over limit".to_string(),
        };
        assert_eq!(e.event_type(), "risk_violation");
    }

    #[test]
    fn test_correlation_id_accessor() {
        let cid = Uuid::new_v4();
        let e = Event::StrategyStatusChanged {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: cid,
            strategy_id: "momentum".to_string(),
            status: "active".to_string(),
        };
        assert_eq!(e.correlation_id(), cid);
    }
}
