use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub positions: HashMap<String, Position>,
    pub realized_pnl: Decimal,
    pub trade_history: Vec<crate::domain::trading::types::Trade>,
    pub starting_cash: Decimal,
    pub max_equity: Decimal,
    pub day_trades_count: u64,
    pub synchronized: bool,
}

/// A single symbol's holding. `quantity` is signed: positive is long,
/// negative is short, zero means the symbol has no open position.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub first_acquired_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: Decimal, average_price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            symbol: symbol.into(),
            quantity,
            average_price,
            market_value: quantity * average_price,
            unrealized_pnl: Decimal::ZERO,
            first_acquired_at: now,
            last_update: now,
        }
    }

    pub fn mark(&mut self, current_price: Decimal) {
        self.market_value = self.quantity * current_price;
        self.unrealized_pnl = (current_price - self.average_price) * self.quantity;
        self.last_update = Utc::now();
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl Portfolio {
    pub fn new() -> Self {
        Self {
            cash: Decimal::ZERO,
            positions: HashMap::new(),
            realized_pnl: Decimal::ZERO,
            trade_history: Vec::new(),
            starting_cash: Decimal::ZERO,
            max_equity: Decimal::ZERO,
            day_trades_count: 0,
            synchronized: false,
        }
    }

    pub fn with_starting_cash(cash: Decimal) -> Self {
        Self {
            cash,
            starting_cash: cash,
            max_equity: cash,
            ..Self::new()
        }
    }
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new()
    }
}

impl Portfolio {
    /// Calculate total value: cash plus the mark-to-market value of every
    /// position, falling back to average cost when no current price is known.
    pub fn total_value(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        let mut value = self.cash;
        for (symbol, position) in &self.positions {
            if let Some(&current_price) = current_prices.get(symbol) {
                value += position.quantity * current_price;
            } else {
                value += position.market_value;
            }
        }
        value
    }

    /// Retained for backward call-sites; identical to `total_value`.
    pub fn total_equity(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        self.total_value(current_prices)
    }

    pub fn unrealized_pnl(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        let mut unrealized = Decimal::ZERO;
        for (symbol, position) in &self.positions {
            if let Some(&current_price) = current_prices.get(symbol) {
                unrealized += (current_price - position.average_price) * position.quantity;
            } else {
                unrealized += position.unrealized_pnl;
            }
        }
        unrealized
    }

    pub fn record_trade(&mut self, trade: crate::domain::trading::types::Trade) {
        self.realized_pnl += trade.pnl;
        self.trade_history.push(trade);
    }

    pub fn total_pnl(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        self.realized_pnl + self.unrealized_pnl(current_prices)
    }

    pub fn total_return_pct(&self, current_prices: &HashMap<String, Decimal>) -> f64 {
        if self.starting_cash.is_zero() {
            return 0.0;
        }
        let value = self.total_value(current_prices);
        ((value - self.starting_cash) / self.starting_cash * Decimal::from(100))
            .to_string()
            .parse()
            .unwrap_or(0.0)
    }

    /// Applies a fill: updates cash by the signed notional minus commission,
    /// and updates (or closes, or flips) the affected position using
    /// weighted-average cost basis. Crossing through zero realizes P&L on the
    /// portion that closes the prior position and opens a new one on the rest.
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: crate::domain::trading::types::OrderSide,
        fill_qty: Decimal,
        fill_price: Decimal,
        commission: Decimal,
    ) -> Decimal {
        use crate::domain::trading::types::OrderSide;

        let signed_qty = match side {
            OrderSide::Buy => fill_qty,
            OrderSide::Sell => -fill_qty,
        };

        self.cash -= signed_qty * fill_price;
        self.cash -= commission;

        let realized = {
            let position = self
                .positions
                .entry(symbol.to_string())
                .or_insert_with(|| Position::new(symbol, Decimal::ZERO, fill_price));

            let prior_qty = position.quantity;
            let mut realized_here = Decimal::ZERO;

            let same_direction = prior_qty.is_zero()
                || (prior_qty > Decimal::ZERO && signed_qty > Decimal::ZERO)
                || (prior_qty < Decimal::ZERO && signed_qty < Decimal::ZERO);

            if same_direction {
                let new_qty = prior_qty + signed_qty;
                let prior_notional = prior_qty.abs() * position.average_price;
                let add_notional = signed_qty.abs() * fill_price;
                position.average_price = if new_qty.is_zero() {
                    fill_price
                } else {
                    (prior_notional + add_notional) / new_qty.abs()
                };
                position.quantity = new_qty;
            } else {
                let closing_qty = signed_qty.abs().min(prior_qty.abs());
                realized_here = match prior_qty > Decimal::ZERO {
                    true => (fill_price - position.average_price) * closing_qty,
                    false => (position.average_price - fill_price) * closing_qty,
                };
                let new_qty = prior_qty + signed_qty;
                position.quantity = new_qty;
                if new_qty.is_zero() {
                    position.average_price = Decimal::ZERO;
                } else if new_qty.signum() != prior_qty.signum() {
                    // flipped through zero, remaining quantity opens at fill price
                    position.average_price = fill_price;
                }
            }
            position.mark(fill_price);
            realized_here
        };

        self.realized_pnl += realized;
        if self.positions.get(symbol).map(|p| p.is_flat()).unwrap_or(false) {
            self.positions.remove(symbol);
        }
        realized
    }
}
