// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Response parse error: {0}")]
    Parse(String),
}

impl ExchangeError {
    /// Transient failures are retried on the next scheduled cycle; the rest
    /// indicate a request the exchange rejected outright.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExchangeError::Network(_) | ExchangeError::Api(_))
    }
}

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Insufficient candle history: {0}")]
    InsufficientHistory(String),

    #[error("Computation failed: {0}")]
    Computation(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data for analysis: {0}")]
    InsufficientData(String),

    #[error("Indicator calculation error: {0}")]
    IndicatorCalculation(String),
}

impl From<AnalysisError> for StrategyError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::InsufficientData(msg) => StrategyError::InsufficientHistory(msg),
            AnalysisError::IndicatorCalculation(msg) => StrategyError::Computation(msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

// Result type aliases for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type StrategyResult<T> = Result<T, StrategyError>;
pub type AnalysisResult<T> = Result<T, AnalysisError>;
pub type NotificationResult<T> = Result<T, NotificationError>;
