//! Port interfaces implemented by infrastructure adapters. All async, all
//! fallible via `anyhow::Result` at the boundary — callers convert into the
//! engine's typed errors (`BrokerError`, `DataError`) where they need to.

use crate::domain::trading::types::{Candle, MarketEvent, Order};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc::Receiver;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn subscribe(&self, symbols: Vec<String>) -> Result<Receiver<MarketEvent>>;
    async fn get_prices(&self, symbols: Vec<String>) -> Result<HashMap<String, Decimal>>;
    async fn get_historical_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: &str,
    ) -> Result<Vec<Candle>>;
}

/// A single broker connection: submit/cancel orders, report account state,
/// and answer a liveness probe used by `BrokerHealthMonitor`.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn submit_order(&self, order: &Order) -> Result<String>;
    async fn cancel_order(&self, broker_order_id: &str) -> Result<()>;
    async fn get_account_cash(&self) -> Result<Decimal>;
    async fn ping(&self) -> Result<()>;
}

/// Optional provider mapping a symbol to its sector, used by
/// `SectorExposureValidator`. Skipped (not stubbed) when absent.
pub trait SectorProvider: Send + Sync {
    fn sector_of(&self, symbol: &str) -> Option<String>;
}

/// Optional provider of pairwise return correlation, used by
/// `CorrelationFilter`. Skipped (not stubbed) when absent.
pub trait CorrelationProvider: Send + Sync {
    fn correlation(&self, symbol_a: &str, symbol_b: &str) -> Option<f64>;
}
