// src/exchange/client.rs
use crate::domain::errors::ExchangeResult;
use crate::domain::models::{OrderFill, PriceHistory};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Read side of the exchange: candles, prices, balances.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Fetch the last `lookback` closed candles for `symbol`, oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        lookback: usize,
    ) -> ExchangeResult<PriceHistory>;

    /// Latest traded price for `symbol`.
    async fn get_price(&self, symbol: &str) -> ExchangeResult<Decimal>;

    /// Free balance for one asset.
    async fn get_balance(&self, asset: &str) -> ExchangeResult<Balance>;
}

/// Write side of the exchange: order placement. Market orders only; the
/// engine never rests limit orders on the book.
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn market_buy(&self, symbol: &str, quantity: Decimal) -> ExchangeResult<OrderFill>;

    async fn market_sell(&self, symbol: &str, quantity: Decimal) -> ExchangeResult<OrderFill>;
}

#[derive(Debug, Clone)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn new(asset: &str, free: Decimal, locked: Decimal) -> Self {
        Self {
            asset: asset.to_string(),
            free,
            locked,
        }
    }
}
