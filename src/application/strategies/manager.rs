//! Owns every registered strategy, dispatches market data to them under a
//! per-call timeout, aggregates their signals, and resolves conflicts
//! between strategies targeting the same symbol. Actor shape (command enum
//! dispatched from a `tokio::select!` loop) grounded on the teacher's
//! `RiskManager::run`; the aggregation/conflict-resolution method set, the
//! per-strategy performance tracking, and the `Restart`/`CreateGroup`/
//! rebalancing operations are grounded on the original's
//! `strategies/manager.py`.

use super::traits::{AnalysisContext, PositionInfo, Strategy};
use crate::domain::errors::StrategyError;
use crate::domain::events::Event;
use crate::domain::trading::types::{AggregatedSignal, Candle, OrderSide, Signal, StrategyAllocation};
use crate::infrastructure::EventBus;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAggregationMethod {
    FirstWins,
    HighestConfidence,
    WeightedAverage,
    Consensus,
    RiskAdjusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolutionMode {
    CancelAll,
    NetPosition,
    HighestConfidence,
    StrategyPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyLifecycle {
    Registered,
    Starting,
    Active,
    Stopping,
    Stopped,
    Error,
}

const MAX_RETURN_SAMPLES: usize = 50;

/// Running win/loss and return history behind `win_rate`/`sharpe` in the
/// `RiskAdjusted` aggregation method and the periodic rebalancing score.
#[derive(Debug, Default)]
struct StrategyPerformance {
    trade_count: u32,
    win_count: u32,
    pnl: Decimal,
    returns: VecDeque<f64>,
}

impl StrategyPerformance {
    fn record(&mut self, pnl: Decimal, win: bool, return_pct: f64) {
        self.trade_count += 1;
        if win {
            self.win_count += 1;
        }
        self.pnl += pnl;
        if self.returns.len() >= MAX_RETURN_SAMPLES {
            self.returns.pop_front();
        }
        self.returns.push_back(return_pct);
    }

    /// Defaults to a neutral 0.5 before any trade has closed, so a
    /// freshly-registered strategy gets a unit `RiskAdjusted` multiplier.
    fn win_rate(&self) -> f64 {
        if self.trade_count == 0 {
            0.5
        } else {
            self.win_count as f64 / self.trade_count as f64
        }
    }

    fn sharpe(&self) -> f64 {
        let n = self.returns.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.returns.iter().sum::<f64>() / n as f64;
        let variance = self.returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            0.0
        } else {
            mean / std_dev
        }
    }
}

struct StrategySlot {
    strategy: Box<dyn Strategy>,
    allocation: StrategyAllocation,
    lifecycle: StrategyLifecycle,
    recent_errors: VecDeque<String>,
    performance: StrategyPerformance,
}

const MAX_RECENT_ERRORS: usize = 20;

/// A signal carried through conflict resolution and aggregation alongside
/// the per-strategy context those steps need: its effective weight
/// (`allocation.weight * performance_weight`), its `StrategyPriority` rank,
/// and the risk multiplier `RiskAdjusted` applies to its confidence.
#[derive(Clone)]
struct SignalEntry {
    signal: Signal,
    weight: f64,
    priority: i32,
    risk_multiplier: f64,
}

pub struct StrategyManager {
    strategies: Arc<RwLock<HashMap<String, StrategySlot>>>,
    candle_history: Arc<RwLock<HashMap<String, VecDeque<Candle>>>>,
    history_window: usize,
    aggregation_method: SignalAggregationMethod,
    conflict_mode: ConflictResolutionMode,
    strategy_timeout: Duration,
    event_bus: EventBus,
}

impl StrategyManager {
    pub fn new(
        aggregation_method: SignalAggregationMethod,
        conflict_mode: ConflictResolutionMode,
        strategy_timeout: Duration,
        event_bus: EventBus,
    ) -> Self {
        Self {
            strategies: Arc::new(RwLock::new(HashMap::new())),
            candle_history: Arc::new(RwLock::new(HashMap::new())),
            history_window: 200,
            aggregation_method,
            conflict_mode,
            strategy_timeout,
            event_bus,
        }
    }

    pub async fn register_strategy(
        &self,
        strategy: Box<dyn Strategy>,
        allocation: StrategyAllocation,
    ) -> Result<(), StrategyError> {
        let id = strategy.id().to_string();
        let mut strategies = self.strategies.write().await;
        if strategies.contains_key(&id) {
            return Err(StrategyError::AlreadyRegistered { id });
        }
        strategies.insert(
            id,
            StrategySlot {
                strategy,
                allocation,
                lifecycle: StrategyLifecycle::Registered,
                recent_errors: VecDeque::new(),
                performance: StrategyPerformance::default(),
            },
        );
        Ok(())
    }

    pub async fn start_strategy(&self, id: &str) -> Result<(), StrategyError> {
        let mut strategies = self.strategies.write().await;
        let slot = strategies.get_mut(id).ok_or_else(|| StrategyError::NotFound { id: id.to_string() })?;
        slot.lifecycle = StrategyLifecycle::Starting;
        slot.strategy.on_start();
        slot.lifecycle = StrategyLifecycle::Active;
        drop(strategies);
        self.publish_status(id, "active").await;
        Ok(())
    }

    pub async fn stop_strategy(&self, id: &str) -> Result<(), StrategyError> {
        let mut strategies = self.strategies.write().await;
        let slot = strategies.get_mut(id).ok_or_else(|| StrategyError::NotFound { id: id.to_string() })?;
        slot.lifecycle = StrategyLifecycle::Stopping;
        slot.strategy.on_stop();
        slot.lifecycle = StrategyLifecycle::Stopped;
        drop(strategies);
        self.publish_status(id, "stopped").await;
        Ok(())
    }

    /// Restarts a strategy that errored out or was stopped: clears its
    /// error history and cycles it back through `on_start` into `Active`.
    pub async fn restart_strategy(&self, id: &str) -> Result<(), StrategyError> {
        {
            let mut strategies = self.strategies.write().await;
            let slot = strategies.get_mut(id).ok_or_else(|| StrategyError::NotFound { id: id.to_string() })?;
            slot.lifecycle = StrategyLifecycle::Starting;
            slot.recent_errors.clear();
            slot.strategy.on_start();
            slot.lifecycle = StrategyLifecycle::Active;
        }
        self.publish_status(id, "active").await;
        Ok(())
    }

    /// Splits `group_weight` evenly across `ids`, overwriting each member's
    /// `allocation.weight`. `name` identifies the group only for error
    /// reporting; no separate group registry is kept.
    pub async fn create_group(&self, name: impl Into<String>, ids: &[String], group_weight: f64) -> Result<(), StrategyError> {
        let name = name.into();
        if ids.is_empty() {
            return Err(StrategyError::InvalidAllocation {
                id: name,
                reason: "group has no member strategies".to_string(),
            });
        }
        let per_member_weight = group_weight / ids.len() as f64;
        let mut strategies = self.strategies.write().await;
        for id in ids {
            let slot = strategies.get_mut(id).ok_or_else(|| StrategyError::NotFound { id: id.clone() })?;
            slot.allocation.weight = per_member_weight;
        }
        Ok(())
    }

    /// Records a closed trade's outcome against a strategy's performance
    /// history, feeding both `RiskAdjusted` aggregation and `rebalance`.
    pub async fn record_trade_result(&self, strategy_id: &str, pnl: Decimal, win: bool, return_pct: f64) {
        let mut strategies = self.strategies.write().await;
        if let Some(slot) = strategies.get_mut(strategy_id) {
            slot.performance.record(pnl, win, return_pct);
        }
    }

    /// Recomputes each strategy's `performance_weight` from a blended score
    /// of realized pnl share, win rate, and Sharpe ratio, applied as an EMA
    /// over the previous weight so a single bad window can't zero it out.
    pub async fn rebalance(&self, total_capital: Decimal) {
        let mut strategies = self.strategies.write().await;
        if strategies.is_empty() {
            return;
        }
        let total_capital_f64 = total_capital.to_f64().unwrap_or(0.0).max(1.0);

        let scores: HashMap<String, f64> = strategies
            .iter()
            .map(|(id, slot)| {
                let pnl_share = slot.performance.pnl.to_f64().unwrap_or(0.0) / total_capital_f64;
                let win_rate = slot.performance.win_rate();
                let sharpe_term = slot.performance.sharpe().max(0.0) / 3.0;
                let score = 0.4 * pnl_share + 0.3 * win_rate + 0.3 * sharpe_term;
                (id.clone(), score.max(0.1))
            })
            .collect();

        let total: f64 = scores.values().sum();
        if total <= 0.0 {
            return;
        }
        for (id, slot) in strategies.iter_mut() {
            let normalized = scores.get(id).copied().unwrap_or(0.1) / total;
            slot.allocation.performance_weight = 0.7 * slot.allocation.performance_weight + 0.3 * normalized;
        }
    }

    async fn publish_status(&self, id: &str, status: &str) {
        let _ = self
            .event_bus
            .publish(Event::StrategyStatusChanged {
                event_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                correlation_id: Uuid::new_v4(),
                strategy_id: id.to_string(),
                status: status.to_string(),
            })
            .await;
    }

    /// Feeds a new candle to every active strategy subscribed to its
    /// symbol, collecting signals under `strategy_timeout` isolation: a
    /// slow or failing strategy cannot block the others.
    pub async fn on_market_data(&self, candle: Candle) -> Option<AggregatedSignal> {
        {
            let mut history = self.candle_history.write().await;
            let entry = history.entry(candle.symbol.clone()).or_default();
            entry.push_back(candle.clone());
            if entry.len() > self.history_window {
                entry.pop_front();
            }
        }

        let recent_candles: Vec<Candle> = {
            let history = self.candle_history.read().await;
            history.get(&candle.symbol).cloned().unwrap_or_default().into_iter().collect()
        };

        let mut signals = Vec::new();
        let mut strategies = self.strategies.write().await;
        for slot in strategies.values_mut() {
            if slot.lifecycle != StrategyLifecycle::Active || !slot.allocation.enabled {
                continue;
            }
            let indicators = HashMap::new();
            let ctx = AnalysisContext {
                symbol: &candle.symbol,
                candle: &candle,
                recent_candles: &recent_candles,
                indicators: &indicators,
                position: PositionInfo::default(),
            };

            let outcome = tokio::time::timeout(
                self.strategy_timeout,
                std::future::ready(slot.strategy.on_market_data(&ctx)),
            )
            .await;

            match outcome {
                Ok(Some(signal)) => {
                    let weight = slot.allocation.weight * slot.allocation.performance_weight;
                    let risk_multiplier = (2.0 * slot.performance.win_rate() + slot.performance.sharpe().max(0.0) / 2.0).clamp(0.1, 2.0);
                    signals.push(SignalEntry {
                        signal,
                        weight,
                        priority: slot.allocation.priority,
                        risk_multiplier,
                    });
                }
                Ok(None) => {}
                Err(_) => {
                    if slot.recent_errors.len() >= MAX_RECENT_ERRORS {
                        slot.recent_errors.pop_front();
                    }
                    slot.recent_errors.push_back("analysis timed out".to_string());
                    warn!(strategy = slot.strategy.id(), "strategy analysis timed out");
                }
            }
        }

        self.aggregate(&candle.symbol, signals)
    }

    fn aggregate(&self, symbol: &str, signals: Vec<SignalEntry>) -> Option<AggregatedSignal> {
        if signals.is_empty() {
            return None;
        }
        let resolved = self.resolve_conflicts(signals);
        if resolved.is_empty() {
            return None;
        }

        match self.aggregation_method {
            SignalAggregationMethod::FirstWins => resolved
                .into_iter()
                .min_by_key(|e| e.signal.timestamp)
                .map(|e| to_aggregated(symbol, &[e.signal], "first_wins")),
            SignalAggregationMethod::HighestConfidence => resolved
                .into_iter()
                .max_by(|a, b| a.signal.confidence.partial_cmp(&b.signal.confidence).unwrap())
                .map(|e| to_aggregated(symbol, &[e.signal], "highest_confidence")),
            SignalAggregationMethod::WeightedAverage => Some(weighted_average(symbol, &resolved, "weighted_average", |e| e.signal.confidence)),
            SignalAggregationMethod::RiskAdjusted => Some(weighted_average(symbol, &resolved, "risk_adjusted", |e| {
                (e.signal.confidence * e.risk_multiplier).min(1.0)
            })),
            SignalAggregationMethod::Consensus => consensus(symbol, &resolved),
        }
    }

    /// Applies the conflict-resolution mode to same-symbol signals that
    /// disagree in direction before aggregation runs.
    fn resolve_conflicts(&self, signals: Vec<SignalEntry>) -> Vec<SignalEntry> {
        let buys: Vec<&SignalEntry> = signals.iter().filter(|e| e.signal.side == OrderSide::Buy).collect();
        let sells: Vec<&SignalEntry> = signals.iter().filter(|e| e.signal.side == OrderSide::Sell).collect();
        if buys.is_empty() || sells.is_empty() {
            return signals;
        }

        match self.conflict_mode {
            ConflictResolutionMode::CancelAll => Vec::new(),
            ConflictResolutionMode::NetPosition => {
                let buy_confidence: f64 = buys.iter().map(|e| e.signal.confidence).sum();
                let sell_confidence: f64 = sells.iter().map(|e| e.signal.confidence).sum();
                if buy_confidence == sell_confidence {
                    Vec::new()
                } else if buy_confidence > sell_confidence {
                    signals.into_iter().filter(|e| e.signal.side == OrderSide::Buy).collect()
                } else {
                    signals.into_iter().filter(|e| e.signal.side == OrderSide::Sell).collect()
                }
            }
            ConflictResolutionMode::HighestConfidence => {
                let winner = signals
                    .iter()
                    .max_by(|a, b| a.signal.confidence.partial_cmp(&b.signal.confidence).unwrap())
                    .map(|e| e.signal.side);
                signals.into_iter().filter(|e| Some(e.signal.side) == winner).collect()
            }
            ConflictResolutionMode::StrategyPriority => {
                let winner_priority = signals.iter().map(|e| e.priority).min().unwrap_or(0);
                let winner_side = signals.iter().find(|e| e.priority == winner_priority).map(|e| e.signal.side);
                signals.into_iter().filter(|e| Some(e.signal.side) == winner_side).collect()
            }
        }
    }
}

fn to_aggregated(symbol: &str, signals: &[Signal], method: &str) -> AggregatedSignal {
    AggregatedSignal {
        symbol: symbol.to_string(),
        side: signals[0].side,
        confidence: signals[0].confidence,
        price: signals[0].price,
        qty: Decimal::ZERO,
        contributing_strategies: signals.iter().map(|s| s.strategy_id.clone()).collect(),
        method: method.to_string(),
        metadata: signals[0].metadata.clone(),
        reason: signals[0].reason.clone(),
    }
}

/// Spec `WeightedAverage`: side = argmax of summed effective weight among
/// {Buy, Sell}; confidence/price are then the weight-weighted mean over
/// only the winning side's signals. `confidence_of` lets `RiskAdjusted`
/// reuse this core with a risk-adjusted confidence instead of the raw one.
fn weighted_average(symbol: &str, entries: &[SignalEntry], method: &str, confidence_of: impl Fn(&SignalEntry) -> f64) -> AggregatedSignal {
    let buy_weight: f64 = entries.iter().filter(|e| e.signal.side == OrderSide::Buy).map(|e| e.weight).sum();
    let sell_weight: f64 = entries.iter().filter(|e| e.signal.side == OrderSide::Sell).map(|e| e.weight).sum();
    let side = if sell_weight > buy_weight { OrderSide::Sell } else { OrderSide::Buy };

    let winning: Vec<&SignalEntry> = entries.iter().filter(|e| e.signal.side == side).collect();
    let total_weight: f64 = winning.iter().map(|e| e.weight).sum();

    let (confidence, price) = if total_weight > 0.0 {
        let confidence = winning.iter().map(|e| e.weight * confidence_of(e)).sum::<f64>() / total_weight;
        let price_sum: Decimal = winning
            .iter()
            .map(|e| e.signal.price * Decimal::try_from(e.weight).unwrap_or_default())
            .sum();
        let total_weight_dec = Decimal::try_from(total_weight).unwrap_or(Decimal::ONE);
        (confidence, price_sum / total_weight_dec)
    } else {
        let n = winning.len().max(1) as f64;
        let confidence = winning.iter().map(|e| confidence_of(e)).sum::<f64>() / n;
        let price = winning.first().map(|e| e.signal.price).unwrap_or(Decimal::ZERO);
        (confidence, price)
    };

    AggregatedSignal {
        symbol: symbol.to_string(),
        side,
        confidence,
        price,
        qty: Decimal::ZERO,
        contributing_strategies: winning.iter().map(|e| e.signal.strategy_id.clone()).collect(),
        method: method.to_string(),
        metadata: HashMap::new(),
        reason: format!("{} of {} signals", method, winning.len()),
    }
}

/// Spec `Consensus`: requires a strict majority (> 50%) of signals agreeing
/// on side; otherwise no signal is produced. The majority subset is then
/// aggregated via `WeightedAverage`.
fn consensus(symbol: &str, entries: &[SignalEntry]) -> Option<AggregatedSignal> {
    if entries.len() < 2 {
        return None;
    }
    let buy_count = entries.iter().filter(|e| e.signal.side == OrderSide::Buy).count();
    let sell_count = entries.iter().filter(|e| e.signal.side == OrderSide::Sell).count();
    let total = entries.len();

    let majority_side = if buy_count * 2 > total {
        OrderSide::Buy
    } else if sell_count * 2 > total {
        OrderSide::Sell
    } else {
        return None;
    };

    let majority: Vec<SignalEntry> = entries.iter().filter(|e| e.signal.side == majority_side).cloned().collect();
    let mut aggregated = weighted_average(symbol, &majority, "consensus", |e| e.signal.confidence);
    aggregated.reason = format!("consensus of {} of {} strategies", majority.len(), total);
    Some(aggregated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::strategies::momentum::StatisticalMomentumStrategy;
    use crate::infrastructure::event_bus::EventBusConfig;
    use rust_decimal_macros::dec;

    fn candle(close: rust_decimal::Decimal) -> Candle {
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

    fn entry(strategy_id: &str, side: OrderSide, confidence: f64, price: Decimal, weight: f64) -> SignalEntry {
        let signal = match side {
            OrderSide::Buy => Signal::buy(strategy_id, "AAPL", "test"),
            OrderSide::Sell => Signal::sell(strategy_id, "AAPL", "test"),
        }
        .with_confidence(confidence)
        .with_price(price);
        SignalEntry {
            signal,
            weight,
            priority: 0,
            risk_multiplier: 1.0,
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_strategy_errors() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::FirstWins,
            ConflictResolutionMode::CancelAll,
            Duration::from_millis(100),
            bus,
        );
        let strategy = Box::new(StatisticalMomentumStrategy::new("m1", 3, dec!(0.01)));
        manager
            .register_strategy(strategy, StrategyAllocation::new("m1", 0.1))
            .await
            .unwrap();

        let dup = Box::new(StatisticalMomentumStrategy::new("m1", 3, dec!(0.01)));
        let result = manager.register_strategy(dup, StrategyAllocation::new("m1", 0.1)).await;
        assert!(matches!(result, Err(StrategyError::AlreadyRegistered { .. })));
    }

    #[tokio::test]
    async fn test_on_market_data_generates_aggregated_signal() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::HighestConfidence,
            ConflictResolutionMode::HighestConfidence,
            Duration::from_millis(100),
            bus,
        );
        let strategy = Box::new(StatisticalMomentumStrategy::new("m1", 2, dec!(0.01)));
        manager
            .register_strategy(strategy, StrategyAllocation::new("m1", 0.1))
            .await
            .unwrap();
        manager.start_strategy("m1").await.unwrap();

        manager.on_market_data(candle(dec!(100))).await;
        manager.on_market_data(candle(dec!(100))).await;
        let signal = manager.on_market_data(candle(dec!(110))).await;

        assert!(signal.is_some());
    }

    #[tokio::test]
    async fn test_cancel_all_resolves_conflicting_signals_to_none() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::FirstWins,
            ConflictResolutionMode::CancelAll,
            Duration::from_millis(100),
            bus,
        );
        let buy = entry("a", OrderSide::Buy, 0.8, dec!(150), 1.0);
        let sell = entry("b", OrderSide::Sell, 0.6, dec!(150), 1.0);
        let resolved = manager.resolve_conflicts(vec![buy, sell]);
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_strategy_priority_picks_lowest_priority_number() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::HighestConfidence,
            ConflictResolutionMode::StrategyPriority,
            Duration::from_millis(100),
            bus,
        );
        let mut buy = entry("a", OrderSide::Buy, 0.5, dec!(150), 1.0);
        buy.priority = 2;
        let mut sell = entry("b", OrderSide::Sell, 0.9, dec!(150), 1.0);
        sell.priority = 1;
        let resolved = manager.resolve_conflicts(vec![buy, sell]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].signal.side, OrderSide::Sell);
    }

    #[test]
    fn test_weighted_average_matches_spec_scenario() {
        let entries = vec![
            entry("s1", OrderSide::Buy, 0.8, dec!(150), 0.6),
            entry("s2", OrderSide::Buy, 0.6, dec!(150.2), 0.3),
            entry("s3", OrderSide::Sell, 0.7, dec!(149.8), 0.1),
        ];
        let aggregated = weighted_average("AAPL", &entries, "weighted_average", |e| e.signal.confidence);
        assert_eq!(aggregated.side, OrderSide::Buy);
        assert!((aggregated.confidence - 0.733).abs() < 0.001);
        let price = aggregated.price.to_f64().unwrap();
        assert!((price - 150.067).abs() < 0.001);
    }

    #[test]
    fn test_consensus_requires_strict_majority() {
        let tied = vec![
            entry("s1", OrderSide::Buy, 0.8, dec!(150), 1.0),
            entry("s2", OrderSide::Sell, 0.6, dec!(150), 1.0),
        ];
        assert!(consensus("AAPL", &tied).is_none());

        let majority = vec![
            entry("s1", OrderSide::Buy, 0.8, dec!(150), 1.0),
            entry("s2", OrderSide::Buy, 0.6, dec!(150), 1.0),
            entry("s3", OrderSide::Sell, 0.9, dec!(150), 1.0),
        ];
        let aggregated = consensus("AAPL", &majority).expect("2-of-3 is a strict majority");
        assert_eq!(aggregated.side, OrderSide::Buy);
        assert_eq!(aggregated.contributing_strategies.len(), 2);
    }

    #[test]
    fn test_first_wins_picks_earliest_timestamp() {
        let mut early = entry("late-registered", OrderSide::Buy, 0.5, dec!(150), 1.0);
        early.signal.timestamp = Utc::now() - chrono::Duration::seconds(60);
        let late = entry("early-registered", OrderSide::Sell, 0.9, dec!(150), 1.0);

        let resolved = vec![late, early];
        let winner = resolved.into_iter().min_by_key(|e| e.signal.timestamp).unwrap();
        assert_eq!(winner.signal.strategy_id, "late-registered");
    }

    #[tokio::test]
    async fn test_restart_strategy_reactivates_and_clears_errors() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::FirstWins,
            ConflictResolutionMode::CancelAll,
            Duration::from_millis(100),
            bus,
        );
        let strategy = Box::new(StatisticalMomentumStrategy::new("m1", 3, dec!(0.01)));
        manager.register_strategy(strategy, StrategyAllocation::new("m1", 0.1)).await.unwrap();
        manager.stop_strategy("m1").await.unwrap();
        manager.restart_strategy("m1").await.unwrap();

        let strategies = manager.strategies.read().await;
        assert_eq!(strategies.get("m1").unwrap().lifecycle, StrategyLifecycle::Active);
    }

    #[tokio::test]
    async fn test_create_group_splits_weight_evenly() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::FirstWins,
            ConflictResolutionMode::CancelAll,
            Duration::from_millis(100),
            bus,
        );
        manager
            .register_strategy(Box::new(StatisticalMomentumStrategy::new("m1", 3, dec!(0.01))), StrategyAllocation::new("m1", 1.0))
            .await
            .unwrap();
        manager
            .register_strategy(Box::new(StatisticalMomentumStrategy::new("m2", 3, dec!(0.01))), StrategyAllocation::new("m2", 1.0))
            .await
            .unwrap();

        manager.create_group("momentum-pair", &["m1".to_string(), "m2".to_string()], 0.4).await.unwrap();

        let strategies = manager.strategies.read().await;
        assert_eq!(strategies.get("m1").unwrap().allocation.weight, 0.2);
        assert_eq!(strategies.get("m2").unwrap().allocation.weight, 0.2);
    }

    #[tokio::test]
    async fn test_rebalance_favors_better_performing_strategy() {
        let bus = EventBus::new(EventBusConfig::default());
        let manager = StrategyManager::new(
            SignalAggregationMethod::FirstWins,
            ConflictResolutionMode::CancelAll,
            Duration::from_millis(100),
            bus,
        );
        manager
            .register_strategy(Box::new(StatisticalMomentumStrategy::new("winner", 3, dec!(0.01))), StrategyAllocation::new("winner", 0.5))
            .await
            .unwrap();
        manager
            .register_strategy(Box::new(StatisticalMomentumStrategy::new("loser", 3, dec!(0.01))), StrategyAllocation::new("loser", 0.5))
            .await
            .unwrap();

        manager.record_trade_result("winner", dec!(5_000), true, 0.05).await;
        manager.record_trade_result("loser", dec!(-2_000), false, -0.02).await;

        manager.rebalance(dec!(100_000)).await;

        let strategies = manager.strategies.read().await;
        let winner_weight = strategies.get("winner").unwrap().allocation.performance_weight;
        let loser_weight = strategies.get("loser").unwrap().allocation.performance_weight;
        assert!(winner_weight > loser_weight);
    }
}
