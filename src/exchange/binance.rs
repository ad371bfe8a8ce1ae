// src/exchange/binance.rs
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{Candlestick, OrderFill, OrderSide, PriceHistory};
use crate::exchange::client::{Balance, MarketDataClient, OrderClient};
use async_trait::async_trait;
use binance_spot_connector_rust::{
    http::Credentials,
    hyper::BinanceHttpClient,
    market,
    market::klines::KlineInterval,
    trade,
    trade::order::Side,
};
use hyper::client::HttpConnector;
use hyper_tls::HttpsConnector;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Binance spot adapter over the official connector. Thin boundary: request,
/// parse, map errors; no trading logic lives here.
pub struct BinanceSpotClient {
    client: BinanceHttpClient<HttpsConnector<HttpConnector>>,
}

impl BinanceSpotClient {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        let credentials = Credentials::from_hmac(api_key.to_string(), api_secret.to_string());
        Self {
            client: BinanceHttpClient::default().credentials(credentials),
        }
    }

    fn map_interval(interval: &str) -> ExchangeResult<KlineInterval> {
        match interval {
            "1m" => Ok(KlineInterval::Minutes1),
            "3m" => Ok(KlineInterval::Minutes3),
            "5m" => Ok(KlineInterval::Minutes5),
            "15m" => Ok(KlineInterval::Minutes15),
            "30m" => Ok(KlineInterval::Minutes30),
            "1h" => Ok(KlineInterval::Hours1),
            "4h" => Ok(KlineInterval::Hours4),
            "1d" => Ok(KlineInterval::Days1),
            _ => Err(ExchangeError::Api(format!(
                "Unsupported candle interval: {}",
                interval
            ))),
        }
    }

    /// The connector surfaces HTTP failures as one opaque error type; exchange
    /// rejections carry the Binance error code in the body. -2010 is the
    /// insufficient-balance rejection.
    fn map_send_error(context: &str, err: impl std::fmt::Debug) -> ExchangeError {
        let detail = format!("{:?}", err);
        if detail.contains("-2010") || detail.contains("insufficient balance") {
            ExchangeError::InsufficientFunds(format!("{}: {}", context, detail))
        } else if detail.contains("-1121") {
            ExchangeError::InvalidSymbol(format!("{}: {}", context, detail))
        } else if detail.contains("-1013") || detail.contains("LOT_SIZE") {
            ExchangeError::InvalidQuantity(format!("{}: {}", context, detail))
        } else {
            ExchangeError::Network(format!("{}: {}", context, detail))
        }
    }

    fn parse_decimal(value: &serde_json::Value, field: &str) -> ExchangeResult<Decimal> {
        value
            .as_str()
            .ok_or_else(|| ExchangeError::Parse(format!("Invalid {} format", field)))
            .and_then(|s| {
                s.parse::<Decimal>()
                    .map_err(|e| ExchangeError::Parse(format!("Invalid {}: {}", field, e)))
            })
    }

    fn parse_kline_row(row: &[serde_json::Value]) -> ExchangeResult<Candlestick> {
        if row.len() < 7 {
            return Err(ExchangeError::Parse(format!(
                "Invalid kline row length: expected at least 7 elements, got {}",
                row.len()
            )));
        }

        let open_time = row[0]
            .as_i64()
            .ok_or_else(|| ExchangeError::Parse("Invalid open_time format".to_string()))?;
        let close_time = row[6]
            .as_i64()
            .ok_or_else(|| ExchangeError::Parse("Invalid close_time format".to_string()))?;

        Ok(Candlestick {
            open_time,
            close_time,
            open: Self::parse_decimal(&row[1], "open")?,
            high: Self::parse_decimal(&row[2], "high")?,
            low: Self::parse_decimal(&row[3], "low")?,
            close: Self::parse_decimal(&row[4], "close")?,
            volume: Self::parse_decimal(&row[5], "volume")?,
        })
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ExchangeResult<OrderFill> {
        if quantity <= Decimal::ZERO {
            return Err(ExchangeError::InvalidQuantity(format!(
                "Market {} for {} with non-positive quantity {}",
                side.as_str(),
                symbol,
                quantity
            )));
        }

        let connector_side = match side {
            OrderSide::Buy => Side::Buy,
            OrderSide::Sell => Side::Sell,
        };

        let data = self
            .client
            .send(trade::new_order(symbol, connector_side, "MARKET").quantity(quantity))
            .await
            .map_err(|e| Self::map_send_error("new_order", e))?
            .into_body_str()
            .await
            .map_err(|e| Self::map_send_error("new_order body", e))?;

        let response: NewOrderResponse = serde_json::from_str(&data)
            .map_err(|e| ExchangeError::Parse(format!("Invalid order response: {}", e)))?;

        let executed_qty = response
            .executed_qty
            .parse::<Decimal>()
            .map_err(|e| ExchangeError::Parse(format!("Invalid executedQty: {}", e)))?;
        let quote_qty = response
            .cummulative_quote_qty
            .parse::<Decimal>()
            .map_err(|e| ExchangeError::Parse(format!("Invalid cummulativeQuoteQty: {}", e)))?;

        if executed_qty <= Decimal::ZERO {
            return Err(ExchangeError::Api(format!(
                "Market {} for {} reported zero fill (status {})",
                side.as_str(),
                symbol,
                response.status
            )));
        }

        let timestamp = DateTime::<Utc>::from_timestamp_millis(response.transact_time)
            .unwrap_or_else(Utc::now);

        Ok(OrderFill {
            price: quote_qty / executed_qty,
            quantity: executed_qty,
            timestamp,
        })
    }
}

#[async_trait]
impl MarketDataClient for BinanceSpotClient {
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        lookback: usize,
    ) -> ExchangeResult<PriceHistory> {
        let kline_interval = Self::map_interval(interval)?;
        let request = market::klines(symbol, kline_interval).limit(lookback as u32);

        let data = self
            .client
            .send(request)
            .await
            .map_err(|e| Self::map_send_error("klines", e))?
            .into_body_str()
            .await
            .map_err(|e| Self::map_send_error("klines body", e))?;

        let raw_klines: Vec<Vec<serde_json::Value>> = serde_json::from_str(&data)
            .map_err(|e| ExchangeError::Parse(format!("Invalid klines response: {}", e)))?;

        let mut history = PriceHistory::new(symbol, interval);
        history.candles = raw_klines
            .iter()
            .map(|row| Self::parse_kline_row(row))
            .collect::<ExchangeResult<Vec<_>>>()?;

        // Binance answers oldest-first already; enforce the ordering anyway.
        history.candles.sort_by_key(|c| c.open_time);

        Ok(history)
    }

    async fn get_price(&self, symbol: &str) -> ExchangeResult<Decimal> {
        let data = self
            .client
            .send(market::ticker_price().symbol(symbol))
            .await
            .map_err(|e| Self::map_send_error("ticker_price", e))?
            .into_body_str()
            .await
            .map_err(|e| Self::map_send_error("ticker_price body", e))?;

        let ticker: TickerPriceResponse = serde_json::from_str(&data)
            .map_err(|e| ExchangeError::Parse(format!("Invalid ticker response: {}", e)))?;

        ticker
            .price
            .parse::<Decimal>()
            .map_err(|e| ExchangeError::Parse(format!("Invalid ticker price: {}", e)))
    }

    async fn get_balance(&self, asset: &str) -> ExchangeResult<Balance> {
        let data = self
            .client
            .send(trade::account())
            .await
            .map_err(|e| Self::map_send_error("account", e))?
            .into_body_str()
            .await
            .map_err(|e| Self::map_send_error("account body", e))?;

        let account: AccountResponse = serde_json::from_str(&data)
            .map_err(|e| ExchangeError::Parse(format!("Invalid account response: {}", e)))?;

        let entry = account
            .balances
            .iter()
            .find(|b| b.asset == asset)
            .ok_or_else(|| ExchangeError::InvalidSymbol(format!("No balance entry for {}", asset)))?;

        let free = entry
            .free
            .parse::<Decimal>()
            .map_err(|e| ExchangeError::Parse(format!("Invalid free balance: {}", e)))?;
        let locked = entry
            .locked
            .parse::<Decimal>()
            .map_err(|e| ExchangeError::Parse(format!("Invalid locked balance: {}", e)))?;

        Ok(Balance::new(asset, free, locked))
    }
}

#[async_trait]
impl OrderClient for BinanceSpotClient {
    async fn market_buy(&self, symbol: &str, quantity: Decimal) -> ExchangeResult<OrderFill> {
        self.place_market_order(symbol, OrderSide::Buy, quantity).await
    }

    async fn market_sell(&self, symbol: &str, quantity: Decimal) -> ExchangeResult<OrderFill> {
        self.place_market_order(symbol, OrderSide::Sell, quantity).await
    }
}

#[derive(Debug, Deserialize)]
struct NewOrderResponse {
    #[serde(rename = "executedQty")]
    executed_qty: String,
    #[serde(rename = "cummulativeQuoteQty")]
    cummulative_quote_qty: String,
    #[serde(rename = "transactTime")]
    transact_time: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
    locked: String,
}
