// src/orchestrator.rs
use crate::config::{ConcurrencyMode, Config};
use crate::domain::errors::AppResult;
use crate::exchange::client::{MarketDataClient, OrderClient};
use crate::notifier::{format, Notifier};
use crate::trading::balance::{BalanceMaintainer, TopUpOutcome};
use crate::trading::engine::TradingEngine;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Owns the worker fleet: one long-lived task per traded asset plus the
/// reserve maintainer. In serialized mode every worker takes one shared lock
/// around its exchange-facing cycle, totally ordering exchange I/O across
/// assets; in parallel mode workers run free.
pub struct Orchestrator {
    market: Arc<dyn MarketDataClient>,
    orders: Arc<dyn OrderClient>,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        market: Arc<dyn MarketDataClient>,
        orders: Arc<dyn OrderClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            market,
            orders,
            notifier,
        }
    }

    /// Build one engine per asset and spawn every worker. Configuration has
    /// already been validated; an engine construction failure here is still
    /// fatal because no worker has started yet.
    pub fn spawn(
        &self,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> AppResult<Vec<JoinHandle<()>>> {
        let lock = match config.orchestrator.mode {
            ConcurrencyMode::Serialized => Some(Arc::new(Mutex::new(()))),
            ConcurrencyMode::Parallel => None,
        };

        let mut handles = Vec::with_capacity(config.assets.len() + 1);

        for asset in &config.assets {
            let engine =
                TradingEngine::new(asset.clone(), self.market.clone(), self.orders.clone())?;
            handles.push(tokio::spawn(asset_worker(
                engine,
                lock.clone(),
                self.notifier.clone(),
                shutdown.clone(),
            )));
        }

        if config.reserve.enabled {
            let maintainer = BalanceMaintainer::new(
                config.reserve.clone(),
                self.market.clone(),
                self.orders.clone(),
            );
            handles.push(tokio::spawn(reserve_worker(
                maintainer,
                self.notifier.clone(),
                shutdown.clone(),
            )));
        }

        Ok(handles)
    }
}

/// One asset's endless cycle-and-sleep loop. Every cycle error is absorbed
/// here: logged, reported, and followed by a normal sleep — nothing
/// propagates to sibling workers.
async fn asset_worker(
    mut engine: TradingEngine,
    lock: Option<Arc<Mutex<()>>>,
    notifier: Arc<dyn Notifier>,
    mut shutdown: watch::Receiver<bool>,
) {
    let stock_code = engine.asset().stock_code.clone();
    let symbol = engine.asset().symbol.clone();
    let normal_interval = engine.asset().cycle_interval();

    log::info!("[{}] Worker started", symbol);

    while !*shutdown.borrow() {
        let cycle_result = match &lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                engine.run_cycle().await
            }
            None => engine.run_cycle().await,
        };

        let sleep_for = match cycle_result {
            Ok(report) => {
                log::info!(
                    "[{}][{}] {} -> sleeping {:.2} min",
                    symbol,
                    report.cycle,
                    report.decision.action,
                    report.time_to_sleep.as_secs_f64() / 60.0
                );
                let sleep_for = report.time_to_sleep;
                deliver(&notifier, format::cycle_message(&report)).await;
                sleep_for
            }
            Err(e) => {
                log::error!("[{}] Cycle {} failed: {}", symbol, engine.cycles_run(), e);
                deliver(
                    &notifier,
                    format::error_message(&stock_code, &symbol, engine.cycles_run(), &e.to_string()),
                )
                .await;
                normal_interval
            }
        };

        tokio::select! {
            _ = sleep(sleep_for) => {}
            _ = shutdown.changed() => {}
        }
    }

    log::info!("[{}] Worker stopped", symbol);
}

/// Reserve top-up loop, same supervision contract as the asset workers.
async fn reserve_worker(
    maintainer: BalanceMaintainer,
    notifier: Arc<dyn Notifier>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = maintainer.config().check_interval();
    let reserve_asset = maintainer.config().reserve_asset.clone();

    log::info!("[reserve:{}] Worker started", reserve_asset);

    while !*shutdown.borrow() {
        match maintainer.run_once().await {
            Ok(TopUpOutcome::Purchased { fill, spent }) => {
                deliver(
                    &notifier,
                    format!(
                        "💱 <b>Reserve top-up:</b> bought {} {} at {} (~{} spent)",
                        fill.quantity, reserve_asset, fill.price, spent
                    ),
                )
                .await;
            }
            Ok(outcome) => {
                log::debug!("[reserve:{}] {:?}", reserve_asset, outcome);
            }
            Err(e) => {
                log::error!("[reserve:{}] Check failed: {}", reserve_asset, e);
                deliver(
                    &notifier,
                    format!("<b>⚠️ Reserve top-up check failed:</b> {}", e),
                )
                .await;
            }
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => {}
        }
    }

    log::info!("[reserve:{}] Worker stopped", reserve_asset);
}

/// Delivery failure is logged and swallowed; reporting never blocks trading.
async fn deliver(notifier: &Arc<dyn Notifier>, message: impl AsRef<str>) {
    if let Err(e) = notifier.send(message.as_ref()).await {
        log::warn!("Notification delivery failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AssetConfig, ExchangeConfig, LoggingConfig, OrchestratorConfig, ReserveConfig,
        TelegramConfig, TradeAmount,
    };
    use crate::domain::errors::{ExchangeError, NotificationResult};
    use crate::domain::models::{Candlestick, OrderFill, PriceHistory};
    use crate::exchange::client::Balance;
    use crate::trading::strategies::StrategyConfig;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Exchange double that tracks how many calls are in flight at once.
    /// Every call parks inside a virtual sleep so overlapping workers are
    /// actually observed overlapping.
    struct ConcurrencyProbe {
        active: AtomicUsize,
        max_active: AtomicUsize,
        fail_symbols: Vec<String>,
        orders: StdMutex<Vec<String>>,
    }

    impl ConcurrencyProbe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                fail_symbols: Vec::new(),
                orders: StdMutex::new(Vec::new()),
            })
        }

        fn failing_for(symbols: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                fail_symbols: symbols.iter().map(|s| s.to_string()).collect(),
                orders: StdMutex::new(Vec::new()),
            })
        }

        async fn enter(&self) -> CallGuard<'_> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(25)).await;
            CallGuard { probe: self }
        }

        fn max_observed(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }
    }

    struct CallGuard<'a> {
        probe: &'a ConcurrencyProbe,
    }

    impl Drop for CallGuard<'_> {
        fn drop(&mut self) {
            self.probe.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MarketDataClient for ConcurrencyProbe {
        async fn get_candles(
            &self,
            symbol: &str,
            interval: &str,
            lookback: usize,
        ) -> Result<PriceHistory, ExchangeError> {
            let _guard = self.enter().await;
            if self.fail_symbols.iter().any(|s| s == symbol) {
                return Err(ExchangeError::Network("probe outage".to_string()));
            }
            let mut history = PriceHistory::new(symbol, interval);
            // Rising series so the default strategies produce a Buy.
            history.candles = (0..lookback)
                .map(|i| {
                    let close = Decimal::from_usize(100 + i).unwrap();
                    Candlestick {
                        open_time: i as i64 * 300_000,
                        close_time: (i as i64 + 1) * 300_000 - 1,
                        open: close,
                        high: close + dec!(0.5),
                        low: close - dec!(0.5),
                        close,
                        volume: Decimal::ONE_HUNDRED,
                    }
                })
                .collect();
            Ok(history)
        }

        async fn get_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
            let _guard = self.enter().await;
            if self.fail_symbols.iter().any(|s| s == symbol) {
                return Err(ExchangeError::Network("probe outage".to_string()));
            }
            Ok(dec!(200))
        }

        async fn get_balance(&self, asset: &str) -> Result<Balance, ExchangeError> {
            let _guard = self.enter().await;
            Ok(Balance::new(asset, dec!(1000000), Decimal::ZERO))
        }
    }

    #[async_trait]
    impl OrderClient for ConcurrencyProbe {
        async fn market_buy(
            &self,
            symbol: &str,
            quantity: Decimal,
        ) -> Result<OrderFill, ExchangeError> {
            let _guard = self.enter().await;
            self.orders.lock().unwrap().push(symbol.to_string());
            Ok(OrderFill {
                price: dec!(200),
                quantity,
                timestamp: Utc::now(),
            })
        }

        async fn market_sell(
            &self,
            symbol: &str,
            quantity: Decimal,
        ) -> Result<OrderFill, ExchangeError> {
            let _guard = self.enter().await;
            self.orders.lock().unwrap().push(symbol.to_string());
            Ok(OrderFill {
                price: dec!(200),
                quantity,
                timestamp: Utc::now(),
            })
        }
    }

    struct RecordingNotifier {
        messages: StdMutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
                fail: true,
            })
        }

        fn count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> NotificationResult<()> {
            self.messages.lock().unwrap().push(message.to_string());
            if self.fail {
                return Err(crate::domain::errors::NotificationError::Rejected(
                    "recorded and rejected".to_string(),
                ));
            }
            Ok(())
        }
    }

    fn asset(symbol: &str) -> AssetConfig {
        AssetConfig {
            stock_code: symbol.trim_end_matches("USDT").to_string(),
            symbol: symbol.to_string(),
            quote_asset: "USDT".to_string(),
            trade_amount: TradeAmount::Fixed(dec!(1)),
            candle_interval: "5m".to_string(),
            cycle_interval_secs: 60,
            post_order_delay_secs: 60,
            acceptable_loss_pct: dec!(0),
            stop_loss_pct: dec!(2),
            take_profit_triggers: vec![dec!(1), dec!(2)],
            take_profit_amounts: vec![dec!(50), dec!(100)],
            fallback_enabled: true,
            main_strategy: StrategyConfig::Vortex { period: 14 },
            fallback_strategy: StrategyConfig::MovingAverageCross {
                fast_period: 9,
                slow_period: 21,
            },
        }
    }

    fn config(mode: ConcurrencyMode, symbols: &[&str], reserve_enabled: bool) -> Config {
        Config {
            exchange: ExchangeConfig {
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            },
            telegram: TelegramConfig {
                bot_token: "token".to_string(),
                chat_id: "chat".to_string(),
            },
            orchestrator: OrchestratorConfig { mode },
            reserve: ReserveConfig {
                enabled: reserve_enabled,
                reserve_asset: "BNB".to_string(),
                quote_asset: "USDT".to_string(),
                min_reserve: dec!(10000000),
                quote_floor: dec!(50),
                buy_fraction_pct: dec!(5),
                check_interval_secs: 3600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
            assets: symbols.iter().map(|s| asset(s)).collect(),
        }
    }

    async fn run_fleet(
        probe: Arc<ConcurrencyProbe>,
        notifier: Arc<RecordingNotifier>,
        config: Config,
        run_for: Duration,
    ) {
        let orchestrator = Orchestrator::new(
            probe.clone() as Arc<dyn MarketDataClient>,
            probe.clone() as Arc<dyn OrderClient>,
            notifier.clone() as Arc<dyn Notifier>,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = orchestrator.spawn(&config, shutdown_rx).unwrap();

        sleep(run_for).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_serialized_mode_never_overlaps_exchange_calls() {
        let probe = ConcurrencyProbe::new();
        let notifier = RecordingNotifier::new();
        let config = config(
            ConcurrencyMode::Serialized,
            &["AAAUSDT", "BBBUSDT", "CCCUSDT"],
            false,
        );

        run_fleet(probe.clone(), notifier, config, Duration::from_secs(90)).await;

        assert!(!probe.orders.lock().unwrap().is_empty());
        assert_eq!(probe.max_observed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_mode_overlaps_exchange_calls() {
        let probe = ConcurrencyProbe::new();
        let notifier = RecordingNotifier::new();
        let config = config(
            ConcurrencyMode::Parallel,
            &["AAAUSDT", "BBBUSDT", "CCCUSDT"],
            false,
        );

        run_fleet(probe.clone(), notifier, config, Duration::from_secs(90)).await;

        assert!(probe.max_observed() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_asset_never_stops_its_sibling() {
        let probe = ConcurrencyProbe::failing_for(&["BADUSDT"]);
        let notifier = RecordingNotifier::new();
        let config = config(ConcurrencyMode::Parallel, &["BADUSDT", "GOODUSDT"], false);

        // Several cycle intervals: the failing worker keeps erroring and the
        // healthy one keeps trading.
        run_fleet(probe.clone(), notifier.clone(), config, Duration::from_secs(200)).await;

        let messages = notifier.messages.lock().unwrap();
        let errors = messages.iter().filter(|m| m.contains("failed for BAD")).count();
        let cycles = messages.iter().filter(|m| m.contains("GOODUSDT")).count();
        // More than one error proves the failing worker kept cycling.
        assert!(errors > 1, "expected repeated error reports, got {}", errors);
        assert!(cycles > 1, "expected the healthy worker to keep reporting");
        assert!(probe.orders.lock().unwrap().iter().all(|s| s == "GOODUSDT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifier_failure_never_stops_trading() {
        let probe = ConcurrencyProbe::new();
        let notifier = RecordingNotifier::failing();
        let config = config(ConcurrencyMode::Serialized, &["AAAUSDT"], false);

        run_fleet(probe.clone(), notifier.clone(), config, Duration::from_secs(200)).await;

        // Delivery failed every time, yet cycles kept coming.
        assert!(notifier.count() > 1);
        assert!(!probe.orders.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_worker_reports_purchases() {
        let probe = ConcurrencyProbe::new();
        let notifier = RecordingNotifier::new();
        // min_reserve is huge in the fixture, so the maintainer always buys.
        let config = config(ConcurrencyMode::Parallel, &[], true);

        run_fleet(probe.clone(), notifier.clone(), config, Duration::from_secs(30)).await;

        let messages = notifier.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.contains("Reserve top-up")));
        assert!(probe.orders.lock().unwrap().iter().any(|s| s == "BNBUSDT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_all_workers() {
        let probe = ConcurrencyProbe::new();
        let notifier = RecordingNotifier::new();
        let config = config(ConcurrencyMode::Serialized, &["AAAUSDT", "BBBUSDT"], true);

        let orchestrator = Orchestrator::new(
            probe.clone() as Arc<dyn MarketDataClient>,
            probe.clone() as Arc<dyn OrderClient>,
            notifier.clone() as Arc<dyn Notifier>,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = orchestrator.spawn(&config, shutdown_rx).unwrap();
        assert_eq!(handles.len(), 3);

        sleep(Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            // Workers exit between sleeps; a hang here would time the test out.
            handle.await.unwrap();
        }
    }
}
