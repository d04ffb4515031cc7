//! End-to-end: market data in, a sized order out, the portfolio updated.
//! Exercises the same wiring `bin/engine.rs` does, minus the network loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use tradeweave::application::order_manager::{OrderManager, OrderManagerConfig};
use tradeweave::application::portfolio_manager::PortfolioManager;
use tradeweave::application::risk_management::{RiskManager, SizingMethod, TradeContext};
use tradeweave::application::strategies::{
    ConflictResolutionMode, SignalAggregationMethod, StatisticalMomentumStrategy, StrategyManager,
};
use tradeweave::domain::trading::portfolio::Portfolio;
use tradeweave::domain::trading::types::{Candle, StrategyAllocation};
use tradeweave::infrastructure::broker_router::{BrokerRouter, RoutingPolicy};
use tradeweave::infrastructure::event_bus::EventBusConfig;
use tradeweave::infrastructure::mock::MockBroker;
use tradeweave::infrastructure::EventBus;

fn candle(close: Decimal) -> Candle {
    Candle {
        symbol: "AAPL".to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume: dec!(1000),
        timestamp: 0,
    }
}

/// A momentum signal on rising candles should survive risk sizing, become a
/// filled order, and leave the portfolio holding a long position.
#[tokio::test]
async fn test_signal_to_fill_updates_portfolio() {
    let event_bus = EventBus::new(EventBusConfig::default());
    let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(100_000))));

    let router = Arc::new(BrokerRouter::new(RoutingPolicy::PriorityBased, 3));
    let broker = Arc::new(MockBroker::new("mock", Arc::clone(&portfolio)));
    router.register(broker, 0).await;

    let strategy_manager = StrategyManager::new(
        SignalAggregationMethod::HighestConfidence,
        ConflictResolutionMode::HighestConfidence,
        Duration::from_millis(200),
        event_bus.clone(),
    );
    strategy_manager
        .register_strategy(
            Box::new(StatisticalMomentumStrategy::new("momentum-1", 2, dec!(0.01))),
            StrategyAllocation::new("momentum-1", 0.2),
        )
        .await
        .unwrap();
    strategy_manager.start_strategy("momentum-1").await.unwrap();

    let risk_manager = RiskManager::new(Default::default(), SizingMethod::FixedFractional);
    risk_manager.initialize_session(dec!(100_000)).await;

    let order_manager = OrderManager::new(OrderManagerConfig::default(), Arc::clone(&router), event_bus.clone());
    let portfolio_manager = PortfolioManager::new(Arc::clone(&portfolio), event_bus.clone());

    // Two flat candles establish the lookback window, then a sharp rise triggers a buy.
    for close in [dec!(100), dec!(100), dec!(112)] {
        let bar = candle(close);
        portfolio_manager.on_market_data(&bar).await;

        let Some(aggregated) = strategy_manager.on_market_data(bar.clone()).await else {
            continue;
        };

        let current_prices = portfolio_manager.current_prices().await;
        let snapshot = portfolio.read().await.clone();
        let ctx = TradeContext {
            signal: &aggregated,
            price: bar.close,
            portfolio: &snapshot,
            current_prices: &current_prices,
            day_trades_used: 0,
            realized_volatility: None,
        };

        let quantity = risk_manager.validate_and_size(&ctx).await.expect("trade should pass risk checks");
        let order = order_manager
            .submit_from_signal(&aggregated, quantity, bar.close)
            .await
            .expect("order should be accepted");

        order_manager
            .record_fill(&order.id, order.quantity, bar.close, Decimal::ZERO)
            .await
            .unwrap();
        portfolio_manager
            .apply_fill(&order.symbol, order.side, order.quantity, bar.close, Decimal::ZERO)
            .await;
    }

    let final_portfolio = portfolio.read().await;
    let position = final_portfolio.positions.get("AAPL").expect("expected an open AAPL position");
    assert!(position.quantity > Decimal::ZERO);
    assert!(final_portfolio.cash < dec!(100_000));
}

/// Tripping the emergency stop mid-stream blocks further order submission
/// even though the strategy keeps producing signals.
#[tokio::test]
async fn test_emergency_stop_halts_new_orders() {
    let event_bus = EventBus::new(EventBusConfig::default());
    let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(100_000))));

    let router = Arc::new(BrokerRouter::new(RoutingPolicy::PriorityBased, 3));
    let broker = Arc::new(MockBroker::new("mock", Arc::clone(&portfolio)));
    router.register(broker, 0).await;

    let order_manager = OrderManager::new(OrderManagerConfig::default(), router, event_bus.clone());
    order_manager.trip_emergency_stop();

    let signal = tradeweave::domain::trading::types::AggregatedSignal {
        symbol: "AAPL".to_string(),
        side: tradeweave::domain::trading::types::OrderSide::Buy,
        confidence: 0.9,
        price: dec!(100),
        qty: dec!(10),
        contributing_strategies: vec!["momentum-1".to_string()],
        method: "test".to_string(),
        metadata: HashMap::new(),
        reason: "test".to_string(),
    };

    let result = order_manager.submit_from_signal(&signal, dec!(10), dec!(100)).await;
    assert!(result.is_err());

    let prices: HashMap<String, Decimal> = HashMap::new();
    assert_eq!(portfolio.read().await.total_value(&prices), dec!(100_000));
}
