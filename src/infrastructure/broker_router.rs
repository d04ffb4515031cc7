//! Routes orders to a registered broker, failing over to the next candidate
//! on rejection or circuit-open, per one of several selection policies.

use crate::domain::errors::BrokerError;
use crate::domain::ports::BrokerAdapter;
use crate::domain::trading::types::Order;
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    PriorityBased,
    RoundRobin,
    HealthBased,
    PerformanceBased,
}

struct RegisteredBroker {
    adapter: Arc<dyn BrokerAdapter>,
    priority: u32,
    circuit: CircuitBreaker,
    success_count: u64,
    failure_count: u64,
}

pub struct BrokerRouter {
    brokers: RwLock<Vec<RegisteredBroker>>,
    policy: RoutingPolicy,
    max_failover_attempts: u32,
    round_robin_cursor: std::sync::atomic::AtomicUsize,
}

impl BrokerRouter {
    pub fn new(policy: RoutingPolicy, max_failover_attempts: u32) -> Self {
        Self {
            brokers: RwLock::new(Vec::new()),
            policy,
            max_failover_attempts,
            round_robin_cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub async fn register(&self, adapter: Arc<dyn BrokerAdapter>, priority: u32) {
        let name = adapter.name().to_string();
        self.brokers.write().await.push(RegisteredBroker {
            adapter,
            priority,
            circuit: CircuitBreaker::new(name, 5, 2, Duration::from_secs(30)),
            success_count: 0,
            failure_count: 0,
        });
    }

    async fn ordered_candidates(&self) -> Vec<usize> {
        let brokers = self.brokers.read().await;
        let mut indices: Vec<usize> = (0..brokers.len()).collect();
        match self.policy {
            RoutingPolicy::PriorityBased => {
                indices.sort_by_key(|&i| brokers[i].priority);
            }
            RoutingPolicy::RoundRobin => {
                let start = self
                    .round_robin_cursor
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                    % indices.len().max(1);
                indices.rotate_left(start.min(indices.len().saturating_sub(1)));
            }
            RoutingPolicy::HealthBased => {
                indices.sort_by_key(|&i| brokers[i].failure_count);
            }
            RoutingPolicy::PerformanceBased => {
                indices.sort_by(|&a, &b| {
                    let score_a = brokers[a].success_count as i64 - brokers[a].failure_count as i64;
                    let score_b = brokers[b].success_count as i64 - brokers[b].failure_count as i64;
                    score_b.cmp(&score_a)
                });
            }
        }
        indices
    }

    /// Attempts submission against candidates in policy order, failing over
    /// up to `max_failover_attempts` times. Each attempt goes through that
    /// broker's circuit breaker.
    pub async fn submit(&self, order: &Order) -> Result<String, BrokerError> {
        let candidates = self.ordered_candidates().await;
        if candidates.is_empty() {
            return Err(BrokerError::NoHealthyBroker);
        }

        let mut attempts = 0u32;
        let mut last_error = None;

        for idx in candidates {
            if attempts >= self.max_failover_attempts {
                break;
            }
            attempts += 1;

            let (name, circuit_state) = {
                let brokers = self.brokers.read().await;
                (brokers[idx].adapter.name().to_string(), brokers[idx].circuit.state().await)
            };
            if circuit_state == CircuitState::Open {
                warn!(broker = %name, "skipping broker: circuit open");
                last_error = Some(BrokerError::CircuitOpen { broker: name });
                continue;
            }

            let result = {
                let brokers = self.brokers.read().await;
                let broker = &brokers[idx];
                broker.circuit.call(broker.adapter.submit_order(order)).await
            };

            match result {
                Ok(broker_order_id) => {
                    let mut brokers = self.brokers.write().await;
                    brokers[idx].success_count += 1;
                    info!(broker = %name, order_id = %order.id, "order routed");
                    return Ok(broker_order_id);
                }
                Err(CircuitBreakerError::Open(_)) => {
                    last_error = Some(BrokerError::CircuitOpen { broker: name });
                }
                Err(CircuitBreakerError::Inner(e)) => {
                    let mut brokers = self.brokers.write().await;
                    brokers[idx].failure_count += 1;
                    warn!(broker = %name, error = %e, "broker rejected order, trying next");
                    last_error = Some(BrokerError::Rejected {
                        broker: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or(BrokerError::NoHealthyBroker))
    }

    pub async fn broker_names(&self) -> Vec<String> {
        self.brokers
            .read()
            .await
            .iter()
            .map(|b| b.adapter.name().to_string())
            .collect()
    }

    pub async fn broker_stats(&self) -> HashMap<String, (u64, u64)> {
        self.brokers
            .read()
            .await
            .iter()
            .map(|b| (b.adapter.name().to_string(), (b.success_count, b.failure_count)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::portfolio::Portfolio;
    use crate::domain::trading::types::{Order, OrderSide, OrderType};
    use crate::infrastructure::mock::MockBroker;
    use rust_decimal_macros::dec;

    fn sample_order() -> Order {
        Order::new("AAPL", OrderSide::Buy, dec!(10), OrderType::Market, dec!(100))
    }

    #[tokio::test]
    async fn test_submit_routes_to_only_broker() {
        let router = BrokerRouter::new(RoutingPolicy::PriorityBased, 3);
        let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(10000))));
        router.register(Arc::new(MockBroker::new("primary", portfolio)), 0).await;

        let result = router.submit(&sample_order()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_submit_with_no_brokers_errors() {
        let router = BrokerRouter::new(RoutingPolicy::PriorityBased, 3);
        let result = router.submit(&sample_order()).await;
        assert!(matches!(result, Err(BrokerError::NoHealthyBroker)));
    }

    #[tokio::test]
    async fn test_priority_orders_candidates() {
        let router = BrokerRouter::new(RoutingPolicy::PriorityBased, 3);
        let p1 = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(10000))));
        let p2 = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(10000))));
        router.register(Arc::new(MockBroker::new("secondary", p2)), 1).await;
        router.register(Arc::new(MockBroker::new("primary", p1)), 0).await;

        let candidates = router.ordered_candidates().await;
        let brokers = router.brokers.read().await;
        assert_eq!(brokers[candidates[0]].adapter.name(), "primary");
    }
}
