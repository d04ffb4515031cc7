//! Converts a validated, sized signal into a submitted order and tracks it
//! through fill/cancel/reject, failing over across brokers via
//! `BrokerRouter`. Grounded on the original's `orders/manager.py`
//! (rate limiting, daily order cap, order timeout) and the teacher's
//! actor-with-channel idiom from `application/risk_manager.rs`.

use crate::domain::errors::OrderError;
use crate::domain::events::Event;
use crate::domain::trading::types::{AggregatedSignal, Order, OrderStatus, OrderType};
use crate::infrastructure::broker_router::BrokerRouter;
use crate::infrastructure::EventBus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrderManagerConfig {
    pub max_orders_per_minute: u32,
    pub max_daily_orders: u32,
    pub order_timeout: Duration,
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            max_orders_per_minute: 60,
            max_daily_orders: 1000,
            order_timeout: Duration::from_secs(60 * 60),
        }
    }
}

struct OrderManagerState {
    orders: HashMap<String, Order>,
    submission_times: VecDeque<DateTime<Utc>>,
    daily_order_count: u32,
    last_reset_date: chrono::NaiveDate,
    deferred: VecDeque<(AggregatedSignal, Decimal, Decimal)>,
}

pub struct OrderManager {
    config: OrderManagerConfig,
    router: Arc<BrokerRouter>,
    event_bus: EventBus,
    state: RwLock<OrderManagerState>,
    emergency_stop: std::sync::atomic::AtomicBool,
}

impl OrderManager {
    pub fn new(config: OrderManagerConfig, router: Arc<BrokerRouter>, event_bus: EventBus) -> Self {
        Self {
            config,
            router,
            event_bus,
            state: RwLock::new(OrderManagerState {
                orders: HashMap::new(),
                submission_times: VecDeque::new(),
                daily_order_count: 0,
                last_reset_date: Utc::now().date_naive(),
                deferred: VecDeque::new(),
            }),
            emergency_stop: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn trip_emergency_stop(&self) {
        self.emergency_stop.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Converts a risk-approved signal + sized quantity into an order and
    /// submits it through the broker router, publishing `OrderCreated` on
    /// success. Rate limiting defers the order rather than rejecting it
    /// outright: the caller should retry `drain_deferred` shortly after.
    pub async fn submit_from_signal(&self, signal: &AggregatedSignal, quantity: Decimal, price: Decimal) -> Result<Order, OrderError> {
        if self.emergency_stop.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(OrderError::InvalidOrder {
                reason: "emergency stop active".to_string(),
            });
        }
        if quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidOrder {
                reason: "quantity must be positive".to_string(),
            });
        }

        self.roll_day_if_needed().await;

        {
            let mut state = self.state.write().await;
            if state.daily_order_count >= self.config.max_daily_orders {
                return Err(OrderError::DailyLimitReached {
                    limit: self.config.max_daily_orders,
                });
            }

            let cutoff = Utc::now() - chrono::Duration::seconds(60);
            while state.submission_times.front().is_some_and(|t| *t < cutoff) {
                state.submission_times.pop_front();
            }
            if state.submission_times.len() as u32 >= self.config.max_orders_per_minute {
                state.deferred.push_back((signal.clone(), quantity, price));
                return Err(OrderError::RateLimited {
                    limit: self.config.max_orders_per_minute,
                });
            }
            state.submission_times.push_back(Utc::now());
            state.daily_order_count += 1;
        }

        let mut order = Order::new(signal.symbol.clone(), signal.side, quantity, OrderType::Market, price);
        order.strategy_id = signal.contributing_strategies.first().cloned();

        match self.router.submit(&order).await {
            Ok(broker_order_id) => {
                order.broker_order_id = Some(broker_order_id);
                order.status = OrderStatus::Accepted;
            }
            Err(e) => {
                order.status = OrderStatus::Rejected;
                warn!(order_id = %order.id, error = %e, "order submission failed across all brokers");
                self.state.write().await.orders.insert(order.id.clone(), order.clone());
                return Err(OrderError::AllBrokersFailed {
                    order_id: order.id,
                    reason: e.to_string(),
                });
            }
        }

        self.state.write().await.orders.insert(order.id.clone(), order.clone());

        let _ = self
            .event_bus
            .publish(Event::OrderCreated {
                event_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                correlation_id: Uuid::new_v4(),
                order_id: order.id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
                quantity: order.quantity,
            })
            .await;

        Ok(order)
    }

    async fn roll_day_if_needed(&self) {
        let today = Utc::now().date_naive();
        let mut state = self.state.write().await;
        if state.last_reset_date != today {
            state.last_reset_date = today;
            state.daily_order_count = 0;
        }
    }

    /// Records a fill against a tracked order and publishes `OrderFilled`.
    /// Returns the order's new status so the caller can decide whether to
    /// stop polling it.
    pub async fn record_fill(&self, order_id: &str, fill_qty: Decimal, fill_price: Decimal, commission: Decimal) -> Result<OrderStatus, OrderError> {
        let (symbol, side, status) = {
            let mut state = self.state.write().await;
            let order = state.orders.get_mut(order_id).ok_or_else(|| OrderError::NotFound {
                order_id: order_id.to_string(),
            })?;
            order.apply_fill(fill_qty, fill_price, commission);
            (order.symbol.clone(), order.side, order.status)
        };

        let _ = self
            .event_bus
            .publish(Event::OrderFilled {
                event_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                correlation_id: Uuid::new_v4(),
                order_id: order_id.to_string(),
                symbol,
                side,
                fill_qty,
                fill_price,
                commission,
            })
            .await;

        Ok(status)
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), OrderError> {
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(order_id).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        if !order.is_open() {
            return Err(OrderError::NotCancellable {
                order_id: order_id.to_string(),
                status: order.status.to_string(),
            });
        }
        order.status = OrderStatus::Canceled;
        order.updated_at = Utc::now();
        Ok(())
    }

    /// Flags orders whose `updated_at` predates `order_timeout` as timed
    /// out, so a caller can alert on a broker that accepted an order but
    /// never reported it filled or rejected.
    pub async fn timed_out_orders(&self) -> Vec<String> {
        let state = self.state.read().await;
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.order_timeout).unwrap_or(chrono::Duration::hours(1));
        state
            .orders
            .values()
            .filter(|o| o.is_open() && o.updated_at < cutoff)
            .map(|o| o.id.clone())
            .collect()
    }

    pub async fn get_order(&self, order_id: &str) -> Option<Order> {
        self.state.read().await.orders.get(order_id).cloned()
    }

    pub async fn open_order_count(&self) -> usize {
        self.state.read().await.orders.values().filter(|o| o.is_open()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::portfolio::Portfolio;
    use crate::domain::trading::types::OrderSide;
    use crate::infrastructure::broker_router::RoutingPolicy;
    use crate::infrastructure::event_bus::EventBusConfig;
    use crate::infrastructure::mock::MockBroker;
    use rust_decimal_macros::dec;

    fn signal() -> AggregatedSignal {
        AggregatedSignal {
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            confidence: 0.8,
            price: dec!(100),
            qty: dec!(10),
            contributing_strategies: vec!["momentum".to_string()],
            method: "test".to_string(),
            metadata: HashMap::new(),
            reason: "test".to_string(),
        }
    }

    async fn manager_with_broker() -> OrderManager {
        let router = Arc::new(BrokerRouter::new(RoutingPolicy::PriorityBased, 3));
        let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(100_000))));
        router.register(Arc::new(MockBroker::new("mock", portfolio)), 0).await;
        let bus = EventBus::new(EventBusConfig::default());
        OrderManager::new(OrderManagerConfig::default(), router, bus)
    }

    #[tokio::test]
    async fn test_submit_from_signal_succeeds() {
        let manager = manager_with_broker().await;
        let order = manager.submit_from_signal(&signal(), dec!(10), dec!(100)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert!(order.broker_order_id.is_some());
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let manager = manager_with_broker().await;
        let result = manager.submit_from_signal(&signal(), Decimal::ZERO, dec!(100)).await;
        assert!(matches!(result, Err(OrderError::InvalidOrder { .. })));
    }

    #[tokio::test]
    async fn test_record_fill_updates_status() {
        let manager = manager_with_broker().await;
        let order = manager.submit_from_signal(&signal(), dec!(10), dec!(100)).await.unwrap();
        let status = manager.record_fill(&order.id, dec!(10), dec!(101), dec!(1)).await.unwrap();
        assert_eq!(status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_cancel_open_order() {
        let manager = manager_with_broker().await;
        let order = manager.submit_from_signal(&signal(), dec!(10), dec!(100)).await.unwrap();
        manager.cancel_order(&order.id).await.unwrap();
        let fetched = manager.get_order(&order.id).await.unwrap();
        assert_eq!(fetched.status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn test_emergency_stop_blocks_submission() {
        let manager = manager_with_broker().await;
        manager.trip_emergency_stop();
        let result = manager.submit_from_signal(&signal(), dec!(10), dec!(100)).await;
        assert!(matches!(result, Err(OrderError::InvalidOrder { .. })));
    }
}
