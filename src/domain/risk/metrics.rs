use rust_decimal::Decimal;

/// Portfolio-level risk metrics, recomputed periodically by `RiskManager`
/// and published as a `RiskMetrics` event.
#[derive(Debug, Clone, Default)]
pub struct RiskMetrics {
    pub volatility_annualized: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub var_95: Decimal,
    pub var_99: Decimal,
    pub expected_shortfall_95: Decimal,
    pub skewness: f64,
    pub kurtosis: f64,
    pub calmar_ratio: Option<f64>,
    pub herfindahl_index: f64,
    pub current_drawdown_pct: f64,
    pub max_drawdown_pct: f64,
}

/// Computes risk metrics from a series of periodic returns (as fractions,
/// e.g. 0.01 for 1%) and the position weights backing the Herfindahl index.
/// Grounded on the original's `risk/manager.py::calculate_risk_metrics`.
pub fn compute_risk_metrics(returns: &[f64], position_weights: &[f64], risk_free_rate: f64) -> RiskMetrics {
    if returns.is_empty() {
        return RiskMetrics::default();
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n.max(1.0);
    let stdev = variance.sqrt();

    let volatility_annualized = stdev * (252f64).sqrt();

    let sharpe_ratio = if stdev > 0.0 {
        Some(((mean - risk_free_rate / 252.0) / stdev) * (252f64).sqrt())
    } else {
        None
    };

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let sortino_ratio = if !downside.is_empty() {
        let downside_var = downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64;
        let downside_dev = downside_var.sqrt();
        if downside_dev > 0.0 {
            Some(((mean - risk_free_rate / 252.0) / downside_dev) * (252f64).sqrt())
        } else {
            None
        }
    } else {
        None
    };

    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let var_95 = percentile(&sorted, 0.05);
    let var_99 = percentile(&sorted, 0.01);
    let tail: Vec<f64> = sorted.iter().copied().filter(|r| *r <= var_95).collect();
    let expected_shortfall_95 = if tail.is_empty() {
        var_95
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };

    let skewness = if stdev > 0.0 {
        returns.iter().map(|r| ((r - mean) / stdev).powi(3)).sum::<f64>() / n
    } else {
        0.0
    };
    let kurtosis = if stdev > 0.0 {
        returns.iter().map(|r| ((r - mean) / stdev).powi(4)).sum::<f64>() / n - 3.0
    } else {
        0.0
    };

    let herfindahl_index = position_weights.iter().map(|w| w * w).sum::<f64>();

    RiskMetrics {
        volatility_annualized,
        sharpe_ratio,
        sortino_ratio,
        var_95: Decimal::try_from(var_95).unwrap_or_default(),
        var_99: Decimal::try_from(var_99).unwrap_or_default(),
        expected_shortfall_95: Decimal::try_from(expected_shortfall_95).unwrap_or_default(),
        skewness,
        kurtosis,
        calmar_ratio: None,
        herfindahl_index,
        current_drawdown_pct: 0.0,
        max_drawdown_pct: 0.0,
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_risk_metrics_empty_returns_default() {
        let metrics = compute_risk_metrics(&[], &[], 0.0);
        assert_eq!(metrics.var_95, Decimal::ZERO);
    }

    #[test]
    fn test_compute_risk_metrics_flat_returns_zero_vol() {
        let returns = vec![0.0; 30];
        let metrics = compute_risk_metrics(&returns, &[0.5, 0.5], 0.0);
        assert_eq!(metrics.volatility_annualized, 0.0);
        assert!((metrics.herfindahl_index - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_compute_risk_metrics_detects_volatility() {
        let returns = vec![0.02, -0.015, 0.01, -0.02, 0.03, -0.01];
        let metrics = compute_risk_metrics(&returns, &[1.0], 0.0);
        assert!(metrics.volatility_annualized > 0.0);
    }
}
