// src/trading/balance.rs
use crate::config::ReserveConfig;
use crate::domain::errors::AppResult;
use crate::domain::models::OrderFill;
use crate::exchange::client::{MarketDataClient, OrderClient};
use rust_decimal::Decimal;
use std::sync::Arc;

const QUANTITY_DECIMALS: u32 = 8;

/// What one maintenance pass concluded.
#[derive(Debug, Clone)]
pub enum TopUpOutcome {
    /// Reserve balance already at or above the configured minimum.
    ReserveSufficient { balance: Decimal },
    /// Reserve is low but quote holdings sit at or under the safety floor.
    QuoteBelowFloor { balance: Decimal },
    /// Submitted a market buy for the reserve asset.
    Purchased { fill: OrderFill, spent: Decimal },
}

/// Keeps the fee-payment asset stocked by periodically buying it with a
/// fixed slice of the free quote balance. Runs decoupled from the per-asset
/// engines; its failures never reach them.
pub struct BalanceMaintainer {
    config: ReserveConfig,
    market: Arc<dyn MarketDataClient>,
    orders: Arc<dyn OrderClient>,
}

impl BalanceMaintainer {
    pub fn new(
        config: ReserveConfig,
        market: Arc<dyn MarketDataClient>,
        orders: Arc<dyn OrderClient>,
    ) -> Self {
        Self {
            config,
            market,
            orders,
        }
    }

    pub fn config(&self) -> &ReserveConfig {
        &self.config
    }

    /// One maintenance pass: check, and top up when warranted.
    pub async fn run_once(&self) -> AppResult<TopUpOutcome> {
        let reserve = self.market.get_balance(&self.config.reserve_asset).await?;
        if reserve.free >= self.config.min_reserve {
            return Ok(TopUpOutcome::ReserveSufficient {
                balance: reserve.free,
            });
        }

        let quote = self.market.get_balance(&self.config.quote_asset).await?;
        if quote.free <= self.config.quote_floor {
            log::warn!(
                "Reserve {} low ({}) but quote {} balance {} is at the floor; skipping top-up",
                self.config.reserve_asset,
                reserve.free,
                self.config.quote_asset,
                quote.free
            );
            return Ok(TopUpOutcome::QuoteBelowFloor {
                balance: quote.free,
            });
        }

        let spend = quote.free * self.config.buy_fraction_pct / Decimal::ONE_HUNDRED;
        let symbol = self.config.symbol();
        let price = self.market.get_price(&symbol).await?;
        let quantity = (spend / price).round_dp(QUANTITY_DECIMALS);

        let fill = self.orders.market_buy(&symbol, quantity).await?;
        log::info!(
            "Topped up {}: bought {} at {} (~{} {})",
            self.config.reserve_asset,
            fill.quantity,
            fill.price,
            spend,
            self.config.quote_asset
        );

        Ok(TopUpOutcome::Purchased { fill, spent: spend })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ExchangeError;
    use crate::domain::models::PriceHistory;
    use crate::exchange::client::Balance;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubAccount {
        balances: HashMap<String, Decimal>,
        price: Decimal,
        buys: Mutex<Vec<(String, Decimal)>>,
    }

    impl StubAccount {
        fn new(reserve: Decimal, quote: Decimal, price: Decimal) -> Arc<Self> {
            let mut balances = HashMap::new();
            balances.insert("BNB".to_string(), reserve);
            balances.insert("USDT".to_string(), quote);
            Arc::new(Self {
                balances,
                price,
                buys: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MarketDataClient for StubAccount {
        async fn get_candles(
            &self,
            symbol: &str,
            interval: &str,
            _lookback: usize,
        ) -> Result<PriceHistory, ExchangeError> {
            Ok(PriceHistory::new(symbol, interval))
        }

        async fn get_price(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
            Ok(self.price)
        }

        async fn get_balance(&self, asset: &str) -> Result<Balance, ExchangeError> {
            let free = self
                .balances
                .get(asset)
                .copied()
                .ok_or_else(|| ExchangeError::InvalidSymbol(asset.to_string()))?;
            Ok(Balance::new(asset, free, Decimal::ZERO))
        }
    }

    #[async_trait]
    impl OrderClient for StubAccount {
        async fn market_buy(
            &self,
            symbol: &str,
            quantity: Decimal,
        ) -> Result<OrderFill, ExchangeError> {
            self.buys
                .lock()
                .unwrap()
                .push((symbol.to_string(), quantity));
            Ok(OrderFill {
                price: self.price,
                quantity,
                timestamp: Utc::now(),
            })
        }

        async fn market_sell(
            &self,
            _symbol: &str,
            _quantity: Decimal,
        ) -> Result<OrderFill, ExchangeError> {
            unreachable!("maintainer never sells")
        }
    }

    fn reserve_config() -> ReserveConfig {
        ReserveConfig {
            enabled: true,
            reserve_asset: "BNB".to_string(),
            quote_asset: "USDT".to_string(),
            min_reserve: dec!(0.01),
            quote_floor: dec!(50),
            buy_fraction_pct: dec!(5),
            check_interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_low_reserve_buys_fraction_of_quote() {
        // Reserve 0.005 under the 0.01 minimum, 500 USDT free: spend 5% = 25.
        let account = StubAccount::new(dec!(0.005), dec!(500), dec!(500));
        let maintainer = BalanceMaintainer::new(
            reserve_config(),
            account.clone() as Arc<dyn MarketDataClient>,
            account.clone() as Arc<dyn OrderClient>,
        );

        let outcome = maintainer.run_once().await.unwrap();

        match outcome {
            TopUpOutcome::Purchased { spent, .. } => assert_eq!(spent, dec!(25)),
            other => panic!("expected purchase, got {:?}", other),
        }
        let buys = account.buys.lock().unwrap();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].0, "BNBUSDT");
        // 25 USDT at price 500 buys 0.05 BNB.
        assert_eq!(buys[0].1, dec!(0.05));
    }

    #[tokio::test]
    async fn test_sufficient_reserve_is_a_no_op() {
        let account = StubAccount::new(dec!(0.5), dec!(500), dec!(500));
        let maintainer = BalanceMaintainer::new(
            reserve_config(),
            account.clone() as Arc<dyn MarketDataClient>,
            account.clone() as Arc<dyn OrderClient>,
        );

        let outcome = maintainer.run_once().await.unwrap();

        assert!(matches!(outcome, TopUpOutcome::ReserveSufficient { .. }));
        assert!(account.buys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quote_floor_blocks_top_up() {
        let account = StubAccount::new(dec!(0.005), dec!(40), dec!(500));
        let maintainer = BalanceMaintainer::new(
            reserve_config(),
            account.clone() as Arc<dyn MarketDataClient>,
            account.clone() as Arc<dyn OrderClient>,
        );

        let outcome = maintainer.run_once().await.unwrap();

        assert!(matches!(outcome, TopUpOutcome::QuoteBelowFloor { .. }));
        assert!(account.buys.lock().unwrap().is_empty());
    }
}
