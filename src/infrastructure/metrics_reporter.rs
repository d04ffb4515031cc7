//! Subscribes to the event bus and logs a structured line per event that
//! matters for operational visibility, standing in for a metrics backend.

use crate::domain::events::Event;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::infrastructure::event_bus::EventHandler;

/// Turns bus events into `tracing` output. Registered once at startup so
/// every risk/portfolio/broker snapshot is visible in the logs without a
/// metrics scrape endpoint.
pub struct MetricsReporter;

#[async_trait]
impl EventHandler for MetricsReporter {
    fn event_types(&self) -> Option<Vec<&'static str>> {
        Some(vec![
            "risk_metrics",
            "portfolio_value_changed",
            "broker_health_alert",
            "strategy_status_changed",
        ])
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::RiskMetrics { sharpe, max_drawdown_pct, var_95, .. } => {
                info!(sharpe = ?sharpe, max_drawdown_pct, %var_95, "risk metrics snapshot");
            }
            Event::PortfolioValueChanged { total_value, cash, unrealized_pnl, .. } => {
                info!(%total_value, %cash, %unrealized_pnl, "portfolio value snapshot");
            }
            Event::BrokerHealthAlert { broker, level, message, .. } => {
                warn!(broker, level, message, "broker health alert");
            }
            Event::StrategyStatusChanged { strategy_id, status, .. } => {
                info!(strategy_id, status, "strategy status changed");
            }
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "metrics_reporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_handles_risk_metrics_without_error() {
        let reporter = MetricsReporter;
        let event = Event::RiskMetrics {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            sharpe: Some(1.2),
            max_drawdown_pct: 0.05,
            var_95: dec!(1000),
        };
        assert!(reporter.handle(&event).await.is_ok());
    }

    #[test]
    fn test_event_types_is_a_fixed_subset() {
        let reporter = MetricsReporter;
        let types = reporter.event_types().unwrap();
        assert!(types.contains(&"risk_metrics"));
        assert!(!types.contains(&"order_created"));
    }
}
