//! Per-broker health tracking with EMA-smoothed response times, rolling
//! uptime, and predictive trend alerts. Line-for-line grounded on the
//! Python original's `orders/brokers/broker_health_monitor.py`.

use crate::domain::ports::BrokerAdapter;
use crate::domain::trading::types::BrokerHealth;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

const RESPONSE_TIME_WARNING_MS: f64 = 1000.0;
const RESPONSE_TIME_CRITICAL_MS: f64 = 5000.0;
const UPTIME_WARNING_PCT: f64 = 95.0;
const UPTIME_CRITICAL_PCT: f64 = 85.0;
const CONSECUTIVE_FAILURES_WARNING: u32 = 3;
const CONSECUTIVE_FAILURES_CRITICAL: u32 = 5;
const AUTO_RECOVERY_THRESHOLD: u32 = 2;
const EMA_ALPHA: f64 = 0.1;
const RESPONSE_HISTORY_CAPACITY: usize = 100;
const TREND_SLOPE_SAMPLE: usize = 10;
const TREND_SLOPE_ALERT_THRESHOLD: f64 = 50.0;
const SYSTEM_HEALTH_CRITICAL_RATIO: f64 = 0.5;
const SYSTEM_HEALTH_WARNING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Offline,
    Unknown,
}

struct BrokerState {
    adapter: Arc<dyn BrokerAdapter>,
    avg_response_time_ms: f64,
    response_history: VecDeque<f64>,
    uptime_history: VecDeque<bool>,
    consecutive_failures: u32,
    last_error: Option<String>,
    status: HealthStatus,
}

pub struct BrokerHealthMonitor {
    brokers: RwLock<HashMap<String, BrokerState>>,
    check_interval: Duration,
    history_retention: usize,
    auto_recovery_enabled: bool,
}

impl BrokerHealthMonitor {
    pub fn new(check_interval: Duration, history_retention_hours: u64, auto_recovery_enabled: bool) -> Self {
        let history_retention = ((history_retention_hours * 3600) / check_interval.as_secs().max(1)) as usize;
        Self {
            brokers: RwLock::new(HashMap::new()),
            check_interval,
            history_retention: history_retention.max(1),
            auto_recovery_enabled,
        }
    }

    pub async fn register(&self, adapter: Arc<dyn BrokerAdapter>) {
        let name = adapter.name().to_string();
        self.brokers.write().await.insert(
            name,
            BrokerState {
                adapter,
                avg_response_time_ms: 0.0,
                response_history: VecDeque::new(),
                uptime_history: VecDeque::new(),
                consecutive_failures: 0,
                last_error: None,
                status: HealthStatus::Unknown,
            },
        );
    }

    pub async fn unregister(&self, broker: &str) {
        self.brokers.write().await.remove(broker);
    }

    /// Runs a check against every registered broker once. Intended to be
    /// called from a `tokio::time::interval` loop owned by the caller.
    pub async fn check_all(&self) {
        let names: Vec<String> = self.brokers.read().await.keys().cloned().collect();
        for name in names {
            self.check_broker(&name).await;
        }
    }

    async fn check_broker(&self, name: &str) {
        let adapter = {
            let brokers = self.brokers.read().await;
            match brokers.get(name) {
                Some(state) => Arc::clone(&state.adapter),
                None => return,
            }
        };

        let start = Instant::now();
        let result = adapter.ping().await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut brokers = self.brokers.write().await;
        let Some(state) = brokers.get_mut(name) else { return };

        state.avg_response_time_ms = state.avg_response_time_ms * (1.0 - EMA_ALPHA) + elapsed_ms * EMA_ALPHA;
        if state.response_history.len() >= RESPONSE_HISTORY_CAPACITY {
            state.response_history.pop_front();
        }
        state.response_history.push_back(elapsed_ms);

        let healthy = result.is_ok();
        if healthy {
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
            state.last_error = result.err().map(|e| e.to_string());
        }
        if state.uptime_history.len() >= self.history_retention {
            state.uptime_history.pop_front();
        }
        state.uptime_history.push_back(healthy);

        let uptime_pct = uptime_percent(&state.uptime_history);
        state.status = classify_status(state.consecutive_failures, uptime_pct, state.avg_response_time_ms, healthy);

        if state.consecutive_failures >= AUTO_RECOVERY_THRESHOLD && self.auto_recovery_enabled {
            info!(broker = name, "attempting broker auto-recovery");
            let _ = adapter.ping().await;
        }

        match state.status {
            HealthStatus::Critical => warn!(broker = name, uptime_pct, "broker health critical"),
            HealthStatus::Warning => warn!(broker = name, uptime_pct, "broker health degraded"),
            _ => {}
        }
    }

    pub async fn report(&self, broker: &str) -> Option<BrokerHealth> {
        let brokers = self.brokers.read().await;
        brokers.get(broker).map(|state| BrokerHealth {
            broker: broker.to_string(),
            status: format!("{:?}", state.status),
            avg_response_time_ms: state.avg_response_time_ms,
            uptime_pct: uptime_percent(&state.uptime_history),
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error.clone(),
        })
    }

    /// Linear-regression slope over the last `TREND_SLOPE_SAMPLE` response
    /// times; a slope above the threshold predicts imminent degradation.
    pub async fn predictive_alert(&self, broker: &str) -> Option<String> {
        let brokers = self.brokers.read().await;
        let state = brokers.get(broker)?;
        if state.response_history.len() < TREND_SLOPE_SAMPLE {
            return None;
        }
        let recent: Vec<f64> = state
            .response_history
            .iter()
            .rev()
            .take(TREND_SLOPE_SAMPLE)
            .rev()
            .copied()
            .collect();
        let slope = trend_slope(&recent);
        if slope > TREND_SLOPE_ALERT_THRESHOLD {
            Some(format!("response time trending upward (slope {:.1}ms/check)", slope))
        } else {
            None
        }
    }

    /// Fraction of registered brokers currently healthy, with a system-wide
    /// alert level when that ratio drops below threshold.
    pub async fn system_health_summary(&self) -> (f64, Option<&'static str>) {
        let brokers = self.brokers.read().await;
        if brokers.is_empty() {
            return (1.0, None);
        }
        let healthy = brokers
            .values()
            .filter(|s| matches!(s.status, HealthStatus::Healthy))
            .count();
        let ratio = healthy as f64 / brokers.len() as f64;
        let level = if ratio < SYSTEM_HEALTH_CRITICAL_RATIO {
            Some("critical")
        } else if ratio < SYSTEM_HEALTH_WARNING_RATIO {
            Some("warning")
        } else {
            None
        };
        (ratio, level)
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }
}

fn uptime_percent(history: &VecDeque<bool>) -> f64 {
    if history.is_empty() {
        return 100.0;
    }
    let healthy = history.iter().filter(|h| **h).count();
    healthy as f64 / history.len() as f64 * 100.0
}

fn classify_status(consecutive_failures: u32, uptime_pct: f64, avg_response_ms: f64, last_ok: bool) -> HealthStatus {
    if !last_ok && consecutive_failures >= CONSECUTIVE_FAILURES_CRITICAL {
        return HealthStatus::Offline;
    }
    if consecutive_failures >= CONSECUTIVE_FAILURES_CRITICAL
        || uptime_pct < UPTIME_CRITICAL_PCT
        || avg_response_ms > RESPONSE_TIME_CRITICAL_MS
    {
        return HealthStatus::Critical;
    }
    if consecutive_failures >= CONSECUTIVE_FAILURES_WARNING
        || uptime_pct < UPTIME_WARNING_PCT
        || avg_response_ms > RESPONSE_TIME_WARNING_MS
    {
        return HealthStatus::Warning;
    }
    HealthStatus::Healthy
}

/// Manual least-squares slope over evenly-spaced samples (x = 0..n-1).
fn trend_slope(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    let sum_x: f64 = (0..samples.len()).map(|i| i as f64).sum();
    let sum_y: f64 = samples.iter().sum();
    let sum_xy: f64 = samples.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..samples.len()).map(|i| (i as f64).powi(2)).sum();

    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::portfolio::Portfolio;
    use crate::infrastructure::mock::MockBroker;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_register_and_check_reports_healthy() {
        let monitor = BrokerHealthMonitor::new(Duration::from_secs(30), 24, true);
        let portfolio = Arc::new(RwLock::new(Portfolio::with_starting_cash(dec!(10000))));
        monitor.register(Arc::new(MockBroker::new("mock", portfolio))).await;

        monitor.check_all().await;

        let report = monitor.report("mock").await.unwrap();
        assert_eq!(report.status, "Healthy");
        assert_eq!(report.consecutive_failures, 0);
    }

    #[test]
    fn test_trend_slope_detects_upward_trend() {
        let samples: Vec<f64> = (0..10).map(|i| 100.0 + i as f64 * 80.0).collect();
        let slope = trend_slope(&samples);
        assert!(slope > TREND_SLOPE_ALERT_THRESHOLD);
    }

    #[test]
    fn test_trend_slope_flat_series_is_zero() {
        let samples = vec![100.0; 10];
        let slope = trend_slope(&samples);
        assert!(slope.abs() < 1e-9);
    }

    #[test]
    fn test_classify_status_critical_on_low_uptime() {
        let status = classify_status(0, 80.0, 100.0, true);
        assert_eq!(status, HealthStatus::Critical);
    }

    #[test]
    fn test_classify_status_healthy_default() {
        let status = classify_status(0, 100.0, 50.0, true);
        assert_eq!(status, HealthStatus::Healthy);
    }
}
