// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

/// Market Data Structures
#[derive(Debug, Clone, Default)]
pub struct Candlestick {
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Rolling candle window for one symbol, oldest first.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candlestick>,
}

impl PriceHistory {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            candles: Vec::new(),
        }
    }

    pub fn close_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn high_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.high.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn low_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.low.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.volume.to_f64().unwrap_or_default())
            .collect()
    }
}

/// Everything one engine cycle reads from the exchange. Rebuilt every cycle,
/// never persisted.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub history: PriceHistory,
    pub taken_at: DateTime<Utc>,
}

/// Trading Decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
            TradeAction::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorValue {
    pub name: String,
    pub value: f64,
}

/// Output of one strategy evaluation: the action plus the indicator values
/// that justified it, carried along for reporting.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: TradeAction,
    pub indicators: Vec<IndicatorValue>,
}

impl Decision {
    pub fn hold() -> Self {
        Self {
            action: TradeAction::Hold,
            indicators: Vec::new(),
        }
    }
}

/// Which strategy produced the cycle's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Main,
    Fallback,
    /// Both strategies failed; the cycle degraded to Hold.
    Failed,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecisionSource::Main => write!(f, "main"),
            DecisionSource::Fallback => write!(f, "fallback"),
            DecisionSource::Failed => write!(f, "none (all strategies failed)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Confirmed execution of a market order. Quantity is what actually filled,
/// which the engine adopts even when it differs from the request.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Position State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PositionState::Flat => write!(f, "Flat"),
            PositionState::Long => write!(f, "Long"),
        }
    }
}

/// Position owned by exactly one trading engine. Mutated only after a
/// confirmed fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub state: PositionState,
    pub entry_price: Decimal,
    pub entry_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub tiers_triggered: Vec<bool>,
}

impl Position {
    pub fn flat(tier_count: usize) -> Self {
        Self {
            state: PositionState::Flat,
            entry_price: Decimal::ZERO,
            entry_quantity: Decimal::ZERO,
            remaining_quantity: Decimal::ZERO,
            entry_time: DateTime::<Utc>::MIN_UTC,
            tiers_triggered: vec![false; tier_count],
        }
    }

    pub fn is_long(&self) -> bool {
        self.state == PositionState::Long
    }

    /// Record an entry fill and re-arm every take-profit tier.
    pub fn open(&mut self, fill: &OrderFill) {
        self.state = PositionState::Long;
        self.entry_price = fill.price;
        self.entry_quantity = fill.quantity;
        self.remaining_quantity = fill.quantity;
        self.entry_time = fill.timestamp;
        for triggered in self.tiers_triggered.iter_mut() {
            *triggered = false;
        }
    }

    /// Subtract an exit fill; the position flattens when nothing remains.
    pub fn reduce(&mut self, quantity: Decimal) {
        self.remaining_quantity -= quantity;
        if self.remaining_quantity <= Decimal::ZERO {
            self.remaining_quantity = Decimal::ZERO;
            self.state = PositionState::Flat;
        }
    }

    /// Percent move of `price` against the entry price.
    pub fn variation_pct(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED
    }
}

/// What the engine actually did this cycle. Exactly one outcome per cycle.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Entered a long position.
    Entered { fill: OrderFill },
    /// Stop-loss force-exited the entire remaining quantity.
    StopLossExit { fill: OrderFill },
    /// One take-profit tier fired.
    TookProfit { tier: usize, fill: OrderFill },
    /// Strategy sell signal exited the remaining quantity.
    StrategyExit { fill: OrderFill },
    /// Strategy said sell but price sat below the acceptable-loss floor.
    HeldBelowFloor { floor: Decimal },
    /// Buy signal skipped: quote balance cannot cover the order.
    InsufficientFunds { needed: Decimal, available: Decimal },
    /// Nothing to do.
    Held,
}

impl CycleOutcome {
    /// True when an order hit the exchange, which switches the next sleep to
    /// the post-order delay.
    pub fn order_executed(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Entered { .. }
                | CycleOutcome::StopLossExit { .. }
                | CycleOutcome::TookProfit { .. }
                | CycleOutcome::StrategyExit { .. }
        )
    }
}

/// Next untriggered take-profit tier, precomputed for reporting.
#[derive(Debug, Clone)]
pub enum NextTier {
    Pending {
        index: usize,
        trigger_price: Decimal,
        amount_pct: Decimal,
    },
    Exhausted,
}

/// Position as seen at the end of a cycle. The Long variant carries every
/// derived threshold so the report needs no access to risk configuration.
#[derive(Debug, Clone)]
pub enum PositionView {
    Flat,
    Long {
        entry_price: Decimal,
        entry_quantity: Decimal,
        remaining_quantity: Decimal,
        entry_time: DateTime<Utc>,
        stop_loss: Decimal,
        sell_floor: Decimal,
        next_tier: NextTier,
        variation_pct: Decimal,
    },
}

/// Full account of one engine cycle, consumed by the notification formatter.
/// Every field is computed by the cycle itself; a cycle that cannot populate
/// the report fails instead.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub stock_code: String,
    pub symbol: String,
    pub taken_at: DateTime<Utc>,
    pub price: Decimal,
    pub strategy_name: String,
    pub decision_source: DecisionSource,
    pub decision: Decision,
    pub outcome: CycleOutcome,
    pub position: PositionView,
    pub time_to_sleep: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(price: Decimal, quantity: Decimal) -> OrderFill {
        OrderFill {
            price,
            quantity,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_open_rearms_tiers() {
        let mut position = Position::flat(3);
        position.tiers_triggered = vec![true, true, false];
        position.open(&fill(dec!(100), dec!(10)));

        assert!(position.is_long());
        assert_eq!(position.entry_price, dec!(100));
        assert_eq!(position.remaining_quantity, dec!(10));
        assert_eq!(position.tiers_triggered, vec![false, false, false]);
    }

    #[test]
    fn test_reduce_flattens_on_exhaustion() {
        let mut position = Position::flat(1);
        position.open(&fill(dec!(100), dec!(10)));

        position.reduce(dec!(4));
        assert!(position.is_long());
        assert_eq!(position.remaining_quantity, dec!(6));

        position.reduce(dec!(6));
        assert_eq!(position.state, PositionState::Flat);
        assert_eq!(position.remaining_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_variation_pct() {
        let mut position = Position::flat(0);
        position.open(&fill(dec!(200), dec!(1)));
        assert_eq!(position.variation_pct(dec!(210)), dec!(5));
        assert_eq!(position.variation_pct(dec!(190)), dec!(-5));
    }

    #[test]
    fn test_order_executed_outcomes() {
        assert!(CycleOutcome::Entered {
            fill: fill(dec!(1), dec!(1))
        }
        .order_executed());
        assert!(!CycleOutcome::Held.order_executed());
        assert!(!CycleOutcome::HeldBelowFloor { floor: dec!(99) }.order_executed());
    }
}
