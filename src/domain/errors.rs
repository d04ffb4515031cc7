use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the event bus: publication, dispatch, and handler execution.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("event queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("handler '{handler}' timed out after {timeout_ms}ms on event {event_type}")]
    HandlerTimeout {
        handler: String,
        event_type: String,
        timeout_ms: u64,
    },

    #[error("handler '{handler}' failed on event {event_type} after {attempts} attempts: {reason}")]
    HandlerFailed {
        handler: String,
        event_type: String,
        attempts: u32,
        reason: String,
    },

    #[error("event bus is not running")]
    NotRunning,
}

/// Errors raised while registering, starting, or dispatching to strategies.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy '{id}' is already registered")]
    AlreadyRegistered { id: String },

    #[error("strategy '{id}' not found")]
    NotFound { id: String },

    #[error("strategy '{id}' timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    #[error("strategy '{id}' panicked or errored: {reason}")]
    ExecutionFailed { id: String, reason: String },

    #[error("invalid strategy allocation for '{id}': {reason}")]
    InvalidAllocation { id: String, reason: String },
}

/// Errors related to risk validation and position sizing.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("trading halted: emergency stop is active")]
    EmergencyStopActive,

    #[error("position size limit exceeded for {symbol}: {current_pct:.2}% > {max_pct:.2}%")]
    PositionSizeLimit {
        symbol: String,
        current_pct: f64,
        max_pct: f64,
    },

    #[error("daily loss limit breached: {loss_pct:.2}% > {limit_pct:.2}%")]
    DailyLossLimit { loss_pct: f64, limit_pct: f64 },

    #[error("maximum drawdown exceeded: {drawdown_pct:.2}% > {max_pct:.2}%")]
    MaxDrawdown { drawdown_pct: f64, max_pct: f64 },

    #[error("sector exposure limit for {sector}: {current_pct:.2}% > {max_pct:.2}%")]
    SectorExposureLimit {
        sector: String,
        current_pct: f64,
        max_pct: f64,
    },

    #[error("correlation limit exceeded between {symbol_a} and {symbol_b}: {correlation:.2}")]
    CorrelationLimit {
        symbol_a: String,
        symbol_b: String,
        correlation: f64,
    },

    #[error("insufficient buying power: need ${need}, available ${available}")]
    InsufficientBuyingPower { need: Decimal, available: Decimal },

    #[error("pattern day trading protection: {day_trades} day trades with equity ${equity} < $25,000")]
    PdtProtection { day_trades: u64, equity: Decimal },

    #[error("portfolio exposure limit exceeded: {current_pct:.2}% > {max_pct:.2}%")]
    PortfolioExposureLimit { current_pct: f64, max_pct: f64 },
}

/// Errors related to order submission and lifecycle.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order submission rate limit exceeded ({limit} per minute)")]
    RateLimited { limit: u32 },

    #[error("daily order limit of {limit} reached")]
    DailyLimitReached { limit: u32 },

    #[error("order {order_id} not found")]
    NotFound { order_id: String },

    #[error("order {order_id} cannot be cancelled in status {status}")]
    NotCancellable { order_id: String, status: String },

    #[error("all brokers rejected order {order_id}: {reason}")]
    AllBrokersFailed { order_id: String, reason: String },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },
}

/// Errors surfaced by broker adapters and the broker router.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker '{broker}' is unreachable: {reason}")]
    Unreachable { broker: String, reason: String },

    #[error("broker '{broker}' rejected the request: {reason}")]
    Rejected { broker: String, reason: String },

    #[error("no healthy broker available for routing")]
    NoHealthyBroker,

    #[error("circuit open for broker '{broker}'")]
    CircuitOpen { broker: String },

    #[error("broker '{broker}' request timed out after {timeout_ms}ms")]
    Timeout { broker: String, timeout_ms: u64 },
}

/// Errors related to market data ingestion and connectivity.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("invalid OHLCV data for {symbol}: {reason}")]
    InvalidCandle { symbol: String, reason: String },

    #[error("service timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_error_formatting() {
        let err = RiskError::PositionSizeLimit {
            symbol: "AAPL".to_string(),
            current_pct: 15.5,
            max_pct: 10.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("15.50%"));
        assert!(msg.contains("10.00%"));
    }

    #[test]
    fn test_bus_error_formatting() {
        let err = BusError::HandlerTimeout {
            handler: "risk_manager".to_string(),
            event_type: "SignalGenerated".to_string(),
            timeout_ms: 5000,
        };
        let msg = err.to_string();
        assert!(msg.contains("risk_manager"));
        assert!(msg.contains("5000"));
    }

    #[test]
    fn test_order_error_formatting() {
        let err = OrderError::DailyLimitReached { limit: 1000 };
        assert!(err.to_string().contains("1000"));
    }
}
