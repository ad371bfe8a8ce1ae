// src/domain/mod.rs
pub mod errors;
pub mod models;

// Re-export common types for convenience
pub use errors::{
    AnalysisError, AnalysisResult, AppError, AppResult, ExchangeError, ExchangeResult,
    NotificationError, NotificationResult, StrategyError, StrategyResult,
};
pub use models::{
    Candlestick, CycleOutcome, CycleReport, Decision, DecisionSource, IndicatorValue,
    MarketSnapshot, NextTier, OrderFill, OrderSide, Position, PositionState, PositionView,
    PriceHistory, TradeAction,
};
