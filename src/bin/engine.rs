//! Headless trading engine entry point. Wires the event bus, strategy
//! manager, risk manager, order manager, broker router/health monitor, and
//! portfolio manager around the mock broker/market-data pair, then runs
//! until Ctrl+C. Grounded on the teacher's `bin/server.rs` (logging setup,
//! env loading, graceful shutdown via `tokio::signal::ctrl_c`).

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn, Level};
use tracing_subscriber::prelude::*;

use tradeweave::application::order_manager::{OrderManager, OrderManagerConfig};
use tradeweave::application::portfolio_manager::PortfolioManager;
use tradeweave::application::risk_management::{RiskManager, SizingMethod};
use tradeweave::application::strategies::{ConflictResolutionMode, SignalAggregationMethod, StatisticalMomentumStrategy, StrategyManager};
use tradeweave::config::EngineConfig;
use tradeweave::domain::errors::OrderError;
use tradeweave::domain::trading::portfolio::Portfolio;
use tradeweave::domain::trading::types::{Candle, MarketEvent, StrategyAllocation};
use tradeweave::infrastructure::broker_health_monitor::BrokerHealthMonitor;
use tradeweave::infrastructure::broker_router::BrokerRouter;
use tradeweave::infrastructure::metrics_reporter::MetricsReporter;
use tradeweave::infrastructure::mock::{MockBroker, MockMarketDataGateway};
use tradeweave::infrastructure::EventBus;
use tradeweave::domain::ports::{BrokerAdapter, MarketDataProvider};

#[tokio::main]
async fn main() -> Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("tradeweave engine {} starting", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::from_env()?;
    info!(symbols = ?config.strategy.symbols, initial_cash = %config.initial_cash, "configuration loaded");

    let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(config.initial_cash)));
    let event_bus = EventBus::new(config.event_bus.clone());
    event_bus.subscribe(Arc::new(MetricsReporter)).await;

    let router = Arc::new(BrokerRouter::new(config.broker_router.policy, config.broker_router.max_failover_attempts));
    let broker = Arc::new(MockBroker::new("mock", Arc::clone(&portfolio)));
    router.register(Arc::clone(&broker) as Arc<dyn BrokerAdapter>, 0).await;

    let health_monitor = Arc::new(BrokerHealthMonitor::new(
        config.health_monitor.check_interval,
        config.health_monitor.history_retention_hours,
        config.health_monitor.auto_recovery_enabled,
    ));
    health_monitor.register(Arc::clone(&broker) as Arc<dyn BrokerAdapter>).await;

    let strategy_manager = Arc::new(StrategyManager::new(
        SignalAggregationMethod::HighestConfidence,
        ConflictResolutionMode::HighestConfidence,
        config.strategy.dispatch_timeout,
        event_bus.clone(),
    ));
    let momentum = Box::new(StatisticalMomentumStrategy::new("momentum-1", 5, dec!(0.01)));
    strategy_manager
        .register_strategy(momentum, StrategyAllocation::new("momentum-1", 0.2))
        .await?;
    strategy_manager.start_strategy("momentum-1").await?;

    let risk_manager = Arc::new(RiskManager::new(config.risk.limits.clone(), SizingMethod::FixedFractional));
    risk_manager.initialize_session(config.initial_cash).await;

    let order_manager = Arc::new(OrderManager::new(
        OrderManagerConfig {
            max_orders_per_minute: config.order_execution.max_orders_per_minute,
            max_daily_orders: config.order_execution.max_daily_orders,
            order_timeout: config.order_execution.order_timeout,
        },
        Arc::clone(&router),
        event_bus.clone(),
    ));

    let portfolio_manager = Arc::new(PortfolioManager::new(Arc::clone(&portfolio), event_bus.clone()));

    let market_data = MockMarketDataGateway::new();
    let mut market_data_rx = market_data.subscribe(config.strategy.symbols.clone()).await?;

    let health_monitor_task = {
        let health_monitor = Arc::clone(&health_monitor);
        let mut interval = tokio::time::interval(health_monitor.check_interval());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                health_monitor.check_all().await;
            }
        })
    };

    let metrics_task = {
        let portfolio_manager = Arc::clone(&portfolio_manager);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                portfolio_manager.publish_risk_metrics().await;
            }
        })
    };

    let trading_loop = {
        let strategy_manager = Arc::clone(&strategy_manager);
        let risk_manager = Arc::clone(&risk_manager);
        let order_manager = Arc::clone(&order_manager);
        let portfolio_manager = Arc::clone(&portfolio_manager);
        let portfolio = Arc::clone(&portfolio);

        tokio::spawn(async move {
            while let Some(event) = market_data_rx.recv().await {
                let candle = match event {
                    MarketEvent::Candle(candle) => candle,
                    MarketEvent::Quote { symbol, price, timestamp, .. } => Candle {
                        symbol,
                        open: price,
                        high: price,
                        low: price,
                        close: price,
                        volume: dec!(0),
                        timestamp,
                    },
                    MarketEvent::SymbolSubscription { .. } => continue,
                };

                portfolio_manager.on_market_data(&candle).await;

                let Some(aggregated) = strategy_manager.on_market_data(candle.clone()).await else {
                    continue;
                };

                let current_prices = portfolio_manager.current_prices().await;
                let portfolio_snapshot = portfolio.read().await.clone();
                let ctx = tradeweave::application::risk_management::TradeContext {
                    signal: &aggregated,
                    price: candle.close,
                    portfolio: &portfolio_snapshot,
                    current_prices: &current_prices,
                    day_trades_used: portfolio_snapshot.day_trades_count,
                    realized_volatility: None,
                };

                let quantity = match risk_manager.validate_and_size(&ctx).await {
                    Ok(quantity) => quantity,
                    Err(e) => {
                        warn!(symbol = %aggregated.symbol, error = %e, "trade rejected by risk manager");
                        continue;
                    }
                };

                match order_manager.submit_from_signal(&aggregated, quantity, candle.close).await {
                    Ok(order) => {
                        // Mock broker fills immediately at the order price.
                        if let Err(e) = order_manager.record_fill(&order.id, order.quantity, candle.close, Decimal::ZERO).await {
                            error!(order_id = %order.id, error = %e, "failed to record fill");
                            continue;
                        }
                        portfolio_manager
                            .apply_fill(&order.symbol, order.side, order.quantity, candle.close, Decimal::ZERO)
                            .await;
                    }
                    Err(OrderError::RateLimited { .. }) => {
                        warn!(symbol = %aggregated.symbol, "order deferred: rate limited");
                    }
                    Err(e) => {
                        error!(symbol = %aggregated.symbol, error = %e, "order submission failed");
                    }
                }
            }
        })
    };

    info!("engine running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    health_monitor_task.abort();
    metrics_task.abort();
    trading_loop.abort();
    event_bus.stop();

    Ok(())
}
