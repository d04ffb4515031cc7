//! Environment-driven configuration, organized by domain the way the
//! teacher's `config/` submodules split broker/strategy/risk/observability
//! concerns. `EngineConfig::from_env()` is the single entry point used by
//! the engine binary.

use crate::domain::trading::types::RiskLimits;
use crate::infrastructure::broker_router::RoutingPolicy;
use crate::infrastructure::event_bus::EventBusConfig;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value.parse::<T>().map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct RiskLimitsConfig {
    pub limits: RiskLimits,
}

impl RiskLimitsConfig {
    pub fn from_env() -> Result<Self> {
        let mut limits = RiskLimits::default();
        limits.max_position_pct = parse_env("RISK_MAX_POSITION_PCT", limits.max_position_pct)?;
        limits.max_portfolio_exposure_pct = parse_env("RISK_MAX_PORTFOLIO_EXPOSURE_PCT", limits.max_portfolio_exposure_pct)?;
        limits.max_daily_loss_pct = parse_env("RISK_MAX_DAILY_LOSS_PCT", limits.max_daily_loss_pct)?;
        limits.max_drawdown_pct = parse_env("RISK_MAX_DRAWDOWN_PCT", limits.max_drawdown_pct)?;
        limits.max_sector_exposure_pct = parse_env("RISK_MAX_SECTOR_EXPOSURE_PCT", limits.max_sector_exposure_pct)?;
        limits.max_correlation = parse_env("RISK_MAX_CORRELATION", limits.max_correlation)?;
        limits.max_day_trades = parse_env("RISK_MAX_DAY_TRADES", limits.max_day_trades)?;
        Ok(Self { limits })
    }
}

#[derive(Debug, Clone)]
pub struct BrokerRouterConfig {
    pub policy: RoutingPolicy,
    pub max_failover_attempts: u32,
}

impl BrokerRouterConfig {
    pub fn from_env() -> Result<Self> {
        let policy = match env_or("BROKER_ROUTING_POLICY", "priority").to_lowercase().as_str() {
            "priority" => RoutingPolicy::PriorityBased,
            "round_robin" => RoutingPolicy::RoundRobin,
            "health" => RoutingPolicy::HealthBased,
            "performance" => RoutingPolicy::PerformanceBased,
            other => anyhow::bail!("invalid BROKER_ROUTING_POLICY: {other}"),
        };
        Ok(Self {
            policy,
            max_failover_attempts: parse_env("BROKER_MAX_FAILOVER_ATTEMPTS", 3u32)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub check_interval: Duration,
    pub history_retention_hours: u64,
    pub auto_recovery_enabled: bool,
}

impl HealthMonitorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            check_interval: Duration::from_secs(parse_env("BROKER_HEALTH_CHECK_INTERVAL_SECS", 30u64)?),
            history_retention_hours: parse_env("BROKER_HEALTH_HISTORY_RETENTION_HOURS", 24u64)?,
            auto_recovery_enabled: parse_env("BROKER_HEALTH_AUTO_RECOVERY", true)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StrategyEngineConfig {
    pub dispatch_timeout: Duration,
    pub symbols: Vec<String>,
}

impl StrategyEngineConfig {
    pub fn from_env() -> Result<Self> {
        let symbols = env_or("SYMBOLS", "AAPL,MSFT")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(Self {
            dispatch_timeout: Duration::from_millis(parse_env("STRATEGY_DISPATCH_TIMEOUT_MS", 250u64)?),
            symbols,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OrderExecutionConfig {
    pub max_orders_per_minute: u32,
    pub max_daily_orders: u32,
    pub order_timeout: Duration,
}

impl OrderExecutionConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_orders_per_minute: parse_env("MAX_ORDERS_PER_MINUTE", 60u32)?,
            max_daily_orders: parse_env("MAX_DAILY_ORDERS", 1000u32)?,
            order_timeout: Duration::from_secs(parse_env("ORDER_TIMEOUT_SECS", 3600u64)?),
        })
    }
}

/// Top-level configuration aggregating every domain's environment-derived
/// settings, composed the way the teacher's `Config::from_env()` merges its
/// sub-configs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_cash: Decimal,
    pub event_bus: EventBusConfig,
    pub risk: RiskLimitsConfig,
    pub broker_router: BrokerRouterConfig,
    pub health_monitor: HealthMonitorConfig,
    pub strategy: StrategyEngineConfig,
    pub order_execution: OrderExecutionConfig,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let initial_cash_str = env_or("INITIAL_CASH", "100000");
        let initial_cash = Decimal::from_str(&initial_cash_str).context("invalid INITIAL_CASH")?;

        let mut event_bus = EventBusConfig::default();
        event_bus.max_queue_size = parse_env("EVENT_BUS_MAX_QUEUE_SIZE", event_bus.max_queue_size)?;
        event_bus.max_concurrent_handlers = parse_env("EVENT_BUS_MAX_CONCURRENT_HANDLERS", event_bus.max_concurrent_handlers)?;

        Ok(Self {
            initial_cash,
            event_bus,
            risk: RiskLimitsConfig::from_env()?,
            broker_router: BrokerRouterConfig::from_env()?,
            health_monitor: HealthMonitorConfig::from_env()?,
            strategy: StrategyEngineConfig::from_env()?,
            order_execution: OrderExecutionConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_limits_config_defaults_without_env() {
        let config = RiskLimitsConfig::from_env().unwrap();
        assert_eq!(config.limits.max_position_pct, RiskLimits::default().max_position_pct);
    }

    #[test]
    fn test_broker_router_config_defaults_to_priority() {
        let config = BrokerRouterConfig::from_env().unwrap();
        assert_eq!(config.policy, RoutingPolicy::PriorityBased);
    }

    #[test]
    fn test_strategy_config_parses_symbol_list() {
        std::env::set_var("SYMBOLS", "AAPL, MSFT, GOOG");
        let config = StrategyEngineConfig::from_env().unwrap();
        std::env::remove_var("SYMBOLS");
        assert_eq!(config.symbols, vec!["AAPL", "MSFT", "GOOG"]);
    }
}
