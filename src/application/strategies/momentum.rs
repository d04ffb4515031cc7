use super::traits::{AnalysisContext, Strategy};
use crate::domain::trading::types::Signal;
use rust_decimal::Decimal;

/// Buys when the latest close exceeds the lookback close by more than
/// `momentum_threshold`, sells on the symmetric downside move. Grounded on
/// the teacher's `StatisticalMomentumStrategy` (`analyze` contract and the
/// `Signal::buy().with_confidence()` builder).
pub struct StatisticalMomentumStrategy {
    id: String,
    pub lookback_period: usize,
    pub momentum_threshold: Decimal,
}

impl StatisticalMomentumStrategy {
    pub fn new(id: impl Into<String>, lookback_period: usize, momentum_threshold: Decimal) -> Self {
        Self {
            id: id.into(),
            lookback_period,
            momentum_threshold,
        }
    }
}

impl Strategy for StatisticalMomentumStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_market_data(&mut self, ctx: &AnalysisContext) -> Option<Signal> {
        if ctx.recent_candles.len() < self.lookback_period {
            return None;
        }

        let lookback_close = ctx.recent_candles[ctx.recent_candles.len() - self.lookback_period].close;
        if lookback_close.is_zero() {
            return None;
        }
        let change_pct = (ctx.candle.close - lookback_close) / lookback_close;

        if change_pct > self.momentum_threshold {
            let confidence = ((change_pct / self.momentum_threshold).min(Decimal::from(2)) / Decimal::from(2))
                .to_string()
                .parse::<f64>()
                .unwrap_or(0.5)
                .min(0.95);
            return Some(
                Signal::buy(&self.id, ctx.symbol, format!("momentum {:.4} over {} bars", change_pct, self.lookback_period))
                    .with_confidence(confidence)
                    .with_price(ctx.candle.close),
            );
        }

        if change_pct < -self.momentum_threshold {
            let confidence = ((-change_pct / self.momentum_threshold).min(Decimal::from(2)) / Decimal::from(2))
                .to_string()
                .parse::<f64>()
                .unwrap_or(0.5)
                .min(0.95);
            return Some(
                Signal::sell(&self.id, ctx.symbol, format!("momentum {:.4} over {} bars", change_pct, self.lookback_period))
                    .with_confidence(confidence)
                    .with_price(ctx.candle.close),
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::Candle;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn candle(close: Decimal) -> Candle {
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

    #[test]
    fn test_buy_signal_on_upward_momentum() {
        let mut strategy = StatisticalMomentumStrategy::new("momentum", 3, dec!(0.02));
        let history = vec![candle(dec!(100)), candle(dec!(100)), candle(dec!(100))];
        let latest = candle(dec!(105));
        let indicators = HashMap::new();
        let ctx = AnalysisContext {
            symbol: "AAPL",
            candle: &latest,
            recent_candles: &history,
            indicators: &indicators,
            position: Default::default(),
        };

        let signal = strategy.on_market_data(&ctx).expect("expected a buy signal");
        assert_eq!(signal.side, crate::domain::trading::types::OrderSide::Buy);
    }

    #[test]
    fn test_no_signal_below_threshold() {
        let mut strategy = StatisticalMomentumStrategy::new("momentum", 3, dec!(0.05));
        let history = vec![candle(dec!(100)), candle(dec!(100)), candle(dec!(100))];
        let latest = candle(dec!(101));
        let indicators = HashMap::new();
        let ctx = AnalysisContext {
            symbol: "AAPL",
            candle: &latest,
            recent_candles: &history,
            indicators: &indicators,
            position: Default::default(),
        };

        assert!(strategy.on_market_data(&ctx).is_none());
    }

    #[test]
    fn test_insufficient_history_yields_no_signal() {
        let mut strategy = StatisticalMomentumStrategy::new("momentum", 5, dec!(0.02));
        let history = vec![candle(dec!(100))];
        let latest = candle(dec!(110));
        let indicators = HashMap::new();
        let ctx = AnalysisContext {
            symbol: "AAPL",
            candle: &latest,
            recent_candles: &history,
            indicators: &indicators,
            position: Default::default(),
        };

        assert!(strategy.on_market_data(&ctx).is_none());
    }
}
