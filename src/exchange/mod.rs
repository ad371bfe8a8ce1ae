// src/exchange/mod.rs
pub mod binance;
pub mod client;

pub use binance::BinanceSpotClient;
pub use client::{Balance, MarketDataClient, OrderClient};
