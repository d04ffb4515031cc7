use crate::domain::trading::types::{Candle, Signal};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Read-only view of the strategy's own open position in a symbol, handed
/// in on every analysis call so strategies never need to query the
/// portfolio themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionInfo {
    pub quantity: Decimal,
    pub average_price: Decimal,
}

/// Everything a strategy needs to produce a signal: the latest candle, a
/// short rolling window of history, current indicator values, and the
/// strategy's own position (if any) in the symbol.
pub struct AnalysisContext<'a> {
    pub symbol: &'a str,
    pub candle: &'a Candle,
    pub recent_candles: &'a [Candle],
    pub indicators: &'a HashMap<String, Decimal>,
    pub position: PositionInfo,
}

/// Capability interface for a trading strategy. Strategies are pure,
/// synchronous, CPU-bound functions of market state — never I/O — so they
/// are dispatched from `StrategyManager` under a timeout rather than given
/// their own async runtime presence.
pub trait Strategy: Send + Sync {
    fn id(&self) -> &str;

    /// Called once when the strategy is activated by `StrategyManager`.
    fn on_start(&mut self) {}

    /// Called on every new candle for a subscribed symbol.
    fn on_market_data(&mut self, ctx: &AnalysisContext) -> Option<Signal>;

    /// Called when one of this strategy's own orders fills.
    fn on_order_filled(&mut self, _symbol: &str, _fill_qty: Decimal, _fill_price: Decimal) {}

    /// Called once when the strategy is deactivated.
    fn on_stop(&mut self) {}
}
