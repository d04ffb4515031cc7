//! Turnkey mock broker and market-data gateway: no network access required,
//! used as the default adapter pair and throughout the test suite.

use crate::domain::ports::{BrokerAdapter, MarketDataProvider};
use crate::domain::trading::portfolio::Portfolio;
use crate::domain::trading::types::{Candle, MarketEvent, Order};
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, Receiver, Sender},
    RwLock,
};
use tracing::{info, warn};

/// Validates a candle before it may be published: high/low must bracket
/// open/close and volume must be non-negative. Invalid candles are dropped,
/// never published.
pub fn validate_candle(candle: &Candle) -> Result<(), String> {
    if candle.high < candle.open.max(candle.close) {
        return Err(format!("high {} below max(open,close)", candle.high));
    }
    if candle.low > candle.open.min(candle.close) {
        return Err(format!("low {} above min(open,close)", candle.low));
    }
    if candle.low < Decimal::ZERO || candle.high < Decimal::ZERO {
        return Err("negative price".to_string());
    }
    if candle.volume < Decimal::ZERO {
        return Err("negative volume".to_string());
    }
    Ok(())
}

#[derive(Clone)]
pub struct MockMarketDataGateway {
    subscribers: Arc<RwLock<Vec<Sender<MarketEvent>>>>,
    pub simulation_enabled: bool,
    current_prices: Arc<RwLock<HashMap<String, Decimal>>>,
}

impl MockMarketDataGateway {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            simulation_enabled: true,
            current_prices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn new_no_sim() -> Self {
        Self {
            simulation_enabled: false,
            ..Self::new()
        }
    }

    async fn publish(&self, event: MarketEvent) {
        if let MarketEvent::Candle(candle) = &event {
            if let Err(reason) = validate_candle(candle) {
                warn!(symbol = %candle.symbol, reason, "dropping invalid candle");
                return;
            }
        }
        if let MarketEvent::Quote { symbol, price, .. } = &event {
            self.current_prices.write().await.insert(symbol.clone(), *price);
        }
        if let MarketEvent::Candle(candle) = &event {
            self.current_prices
                .write()
                .await
                .insert(candle.symbol.clone(), candle.close);
        }

        let mut subs = self.subscribers.write().await;
        if subs.is_empty() {
            return;
        }
        let mut active = Vec::new();
        for tx in subs.iter() {
            if tx.send(event.clone()).await.is_ok() {
                active.push(tx.clone());
            }
        }
        *subs = active;
    }

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.current_prices.write().await.insert(symbol.to_string(), price);
        self.publish(MarketEvent::Quote {
            symbol: symbol.to_string(),
            price,
            quantity: Decimal::ONE,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
        .await;
    }
}

impl Default for MockMarketDataGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketDataGateway {
    async fn subscribe(&self, symbols: Vec<String>) -> Result<Receiver<MarketEvent>> {
        let (tx, rx) = mpsc::channel(100);
        self.subscribers.write().await.push(tx);

        if self.simulation_enabled {
            let symbols_clone = symbols.clone();
            let gateway = self.clone();
            tokio::spawn(async move {
                let mut prices: HashMap<String, f64> = HashMap::new();
                for symbol in &symbols_clone {
                    let base = if symbol.contains("BTC") {
                        96_000.0
                    } else if symbol.contains("ETH") {
                        3_400.0
                    } else {
                        150.0
                    };
                    prices.insert(symbol.clone(), base);
                }

                let mut interval = tokio::time::interval(std::time::Duration::from_millis(500));
                let mut rng = rand::rng();
                loop {
                    interval.tick().await;
                    for symbol in symbols_clone.iter() {
                        let current = prices.get(symbol).copied().unwrap_or(100.0);
                        let random: f64 = rng.random_range(-0.5..0.5);
                        let new_price = current * (1.0 + random * 0.01);
                        prices.insert(symbol.clone(), new_price);

                        gateway
                            .publish(MarketEvent::Quote {
                                symbol: symbol.clone(),
                                price: Decimal::from_f64(new_price).unwrap_or(Decimal::ZERO),
                                quantity: Decimal::ONE,
                                timestamp: chrono::Utc::now().timestamp_millis(),
                            })
                            .await;
                    }
                }
            });
            info!(?symbols, "mock market data simulation started");
        }

        Ok(rx)
    }

    async fn get_prices(&self, symbols: Vec<String>) -> Result<HashMap<String, Decimal>> {
        let stored = self.current_prices.read().await;
        Ok(symbols
            .into_iter()
            .map(|s| {
                let price = stored.get(&s).copied().unwrap_or(Decimal::from(100));
                (s, price)
            })
            .collect())
    }

    async fn get_historical_bars(
        &self,
        _symbol: &str,
        _start: chrono::DateTime<chrono::Utc>,
        _end: chrono::DateTime<chrono::Utc>,
        _timeframe: &str,
    ) -> Result<Vec<Candle>> {
        Ok(vec![])
    }
}

/// A paper broker: fills every order immediately at the order's stated
/// price, no slippage/commission model beyond what's passed in.
pub struct MockBroker {
    name: String,
    portfolio: Arc<RwLock<Portfolio>>,
    cash: Arc<RwLock<Decimal>>,
}

impl MockBroker {
    pub fn new(name: impl Into<String>, portfolio: Arc<RwLock<Portfolio>>) -> Self {
        let cash = Arc::new(RwLock::new(Decimal::ZERO));
        Self {
            name: name.into(),
            portfolio,
            cash,
        }
    }
}

#[async_trait]
impl BrokerAdapter for MockBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit_order(&self, order: &Order) -> Result<String> {
        info!(order_id = %order.id, broker = %self.name, "mock broker accepted order");
        Ok(format!("MOCK-{}", order.id))
    }

    async fn cancel_order(&self, _broker_order_id: &str) -> Result<()> {
        Ok(())
    }

    async fn get_account_cash(&self) -> Result<Decimal> {
        let portfolio = self.portfolio.read().await;
        Ok(portfolio.cash)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_candle_accepts_sane_bar() {
        let candle = Candle {
            symbol: "AAPL".to_string(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(99),
            close: dec!(103),
            volume: dec!(1000),
            timestamp: 0,
        };
        assert!(validate_candle(&candle).is_ok());
    }

    #[test]
    fn test_validate_candle_rejects_high_below_close() {
        let candle = Candle {
            symbol: "AAPL".to_string(),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(110),
            volume: dec!(1000),
            timestamp: 0,
        };
        assert!(validate_candle(&candle).is_err());
    }

    #[test]
    fn test_validate_candle_rejects_negative_volume() {
        let candle = Candle {
            symbol: "AAPL".to_string(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(99),
            close: dec!(103),
            volume: dec!(-1),
            timestamp: 0,
        };
        assert!(validate_candle(&candle).is_err());
    }

    #[tokio::test]
    async fn test_mock_broker_submit_order_returns_id() {
        let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(10000))));
        let broker = MockBroker::new("mock", portfolio);
        let order = Order::new(
            "AAPL",
            crate::domain::trading::types::OrderSide::Buy,
            dec!(10),
            crate::domain::trading::types::OrderType::Market,
            dec!(100),
        );
        let broker_order_id = broker.submit_order(&order).await.unwrap();
        assert!(broker_order_id.starts_with("MOCK-"));
    }
}
