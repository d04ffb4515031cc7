use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    DoneForDay,
    Canceled,
    Cancelled, // Alias for Canceled
    Replaced,
    PendingCancel,
    Stopped,
    Rejected,
    Suspended,
    PendingNew,
    Calculated,
    Expired,
    Accepted,
    PendingReplace,
    Pending, // Added to match usage
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    Quote {
        symbol: String,
        price: Decimal,
        quantity: Decimal,
        timestamp: i64,
    },
    Candle(Candle),
    SymbolSubscription {
        symbol: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Time-in-force for an order sent to a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

/// A proposed trade produced by signal aggregation, before risk sizing.
#[derive(Debug, Clone)]
pub struct TradeProposal {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub reason: String,
    pub timestamp: i64,
}

/// An order as tracked through its full lifecycle by `OrderManager`.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub broker_order_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub stop_price: Option<Decimal>,
    pub quantity: Decimal,
    pub filled_qty: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub commission: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub strategy_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        order_type: OrderType,
        price: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("ORD_{}", Uuid::new_v4().simple().to_string()[..12].to_uppercase()),
            broker_order_id: None,
            symbol: symbol.into(),
            side,
            price,
            stop_price: None,
            quantity,
            filled_qty: Decimal::ZERO,
            avg_fill_price: None,
            commission: Decimal::ZERO,
            order_type,
            status: OrderStatus::PendingNew,
            time_in_force: TimeInForce::Day,
            strategy_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::New
                | OrderStatus::PendingNew
                | OrderStatus::Accepted
                | OrderStatus::PartiallyFilled
                | OrderStatus::PendingCancel
                | OrderStatus::PendingReplace
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::DoneForDay
        )
    }

    /// Applies a partial or full fill, updating the volume-weighted average
    /// fill price and subtracting commission from neither side here (cash
    /// handling is PortfolioManager's job, not Order's).
    pub fn apply_fill(&mut self, fill_qty: Decimal, fill_price: Decimal, commission: Decimal) {
        let prior_notional = self.filled_qty * self.avg_fill_price.unwrap_or(Decimal::ZERO);
        let new_filled = self.filled_qty + fill_qty;
        if new_filled > Decimal::ZERO {
            self.avg_fill_price = Some((prior_notional + fill_qty * fill_price) / new_filled);
        }
        self.filled_qty = new_filled;
        self.commission += commission;
        self.status = if self.filled_qty >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = Utc::now();
    }
}

/// Represents a completed round-trip trade with profit/loss information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub quantity: Decimal,
    pub pnl: Decimal, // Realized profit/loss
    pub entry_timestamp: i64,
    pub exit_timestamp: Option<i64>,
    pub strategy_used: Option<String>,
    pub regime_detected: Option<String>,
    pub entry_reason: Option<String>,
    pub exit_reason: Option<String>,
    pub slippage: Option<Decimal>,
    pub fees: Decimal,
}

impl Trade {
    /// Create a new trade from an opening order
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            entry_price: order.avg_fill_price.unwrap_or(order.price),
            exit_price: None,
            quantity: order.quantity,
            pnl: Decimal::ZERO,
            entry_timestamp: order.created_at.timestamp_millis(),
            exit_timestamp: None,
            strategy_used: order.strategy_id.clone(),
            regime_detected: None,
            entry_reason: None,
            exit_reason: None,
            slippage: None,
            fees: order.commission,
        }
    }

    /// Close the trade and calculate P&L
    pub fn close(&mut self, exit_price: Decimal, exit_timestamp: i64) {
        self.exit_price = Some(exit_price);
        self.exit_timestamp = Some(exit_timestamp);

        // Calculate P&L: (exit - entry) * quantity for buy, (entry - exit) * quantity for sell
        self.pnl = match self.side {
            OrderSide::Buy => (exit_price - self.entry_price) * self.quantity,
            OrderSide::Sell => (self.entry_price - exit_price) * self.quantity,
        } - self.fees;
    }
}

/// A trading signal produced by a single strategy.
#[derive(Debug, Clone)]
pub struct Signal {
    pub strategy_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub confidence: f64,
    pub reason: String,
    pub price: Decimal,
    pub target_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Signal {
    pub fn buy(strategy_id: impl Into<String>, symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side: OrderSide::Buy,
            confidence: 0.5,
            reason: reason.into(),
            price: Decimal::ZERO,
            target_price: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn sell(strategy_id: impl Into<String>, symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side: OrderSide::Sell,
            confidence: 0.5,
            reason: reason.into(),
            price: Decimal::ZERO,
            target_price: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_target_price(mut self, price: Decimal) -> Self {
        self.target_price = Some(price);
        self
    }

    /// Sets the price the signal was generated against — the reference price
    /// aggregation averages over, distinct from `target_price` (a desired
    /// limit price some strategies request).
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The result of combining one or more `Signal`s for the same symbol via a
/// `SignalAggregationMethod`.
#[derive(Debug, Clone)]
pub struct AggregatedSignal {
    pub symbol: String,
    pub side: OrderSide,
    pub confidence: f64,
    pub price: Decimal,
    pub qty: Decimal,
    pub contributing_strategies: Vec<String>,
    pub method: String,
    pub metadata: HashMap<String, String>,
    pub reason: String,
}

/// Per-strategy capital allocation and weighting, managed by `StrategyManager`.
#[derive(Debug, Clone)]
pub struct StrategyAllocation {
    pub strategy_id: String,
    /// Aggregation weight in `[0,1]`; effective weight used by the aggregator
    /// is `weight * performance_weight`. Sum across strategies need not be 1.
    pub weight: f64,
    pub max_capital: Decimal,
    /// Fraction of total capital this strategy may risk on one position.
    pub risk_limit: f64,
    /// Lower number = higher priority, used by `StrategyPriority` conflict
    /// resolution.
    pub priority: i32,
    pub performance_weight: f64,
    pub max_positions: usize,
    pub enabled: bool,
}

impl StrategyAllocation {
    pub fn new(strategy_id: impl Into<String>, weight: f64) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            weight,
            max_capital: Decimal::from(20_000),
            risk_limit: 0.02,
            priority: 0,
            performance_weight: 1.0,
            max_positions: 10,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_capital(mut self, max_capital: Decimal) -> Self {
        self.max_capital = max_capital;
        self
    }

    pub fn with_risk_limit(mut self, risk_limit: f64) -> Self {
        self.risk_limit = risk_limit;
        self
    }
}

/// Portfolio-wide risk limits enforced by `RiskManager`.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_position_pct: f64,
    pub max_portfolio_exposure_pct: f64,
    pub max_daily_loss_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_sector_exposure_pct: f64,
    pub max_correlation: f64,
    pub max_day_trades: u64,
    pub min_equity_for_day_trading: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_pct: 10.0,
            max_portfolio_exposure_pct: 80.0,
            max_daily_loss_pct: 3.0,
            max_drawdown_pct: 15.0,
            max_sector_exposure_pct: 30.0,
            max_correlation: 0.85,
            max_day_trades: 3,
            min_equity_for_day_trading: Decimal::from(25_000),
        }
    }
}

/// Static configuration for a single registered broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub name: String,
    pub priority: u32,
    pub max_failover_attempts: u32,
    pub request_timeout: Duration,
}

/// A point-in-time health snapshot for a broker, as produced by
/// `BrokerHealthMonitor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerHealth {
    pub broker: String,
    pub status: String,
    pub avg_response_time_ms: f64,
    pub uptime_pct: f64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}
