// src/trading/engine.rs
use crate::config::{AssetConfig, TradeAmount};
use crate::domain::errors::{AppError, AppResult, ExchangeError};
use crate::domain::models::{
    CycleOutcome, CycleReport, Decision, DecisionSource, MarketSnapshot, OrderFill, Position,
    PositionView, PriceHistory,
};
use crate::domain::TradeAction;
use crate::exchange::client::{MarketDataClient, OrderClient};
use crate::trading::risk::{RiskAction, RiskManager};
use crate::trading::strategies::TradingStrategy;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Base-asset quantities are submitted with this precision.
const QUANTITY_DECIMALS: u32 = 8;

/// Per-asset trading state machine. Owns its Position exclusively; one
/// `run_cycle` call per scheduling tick performs the full
/// read -> decide -> risk-check -> order -> report sequence.
pub struct TradingEngine {
    asset: AssetConfig,
    market: Arc<dyn MarketDataClient>,
    orders: Arc<dyn OrderClient>,
    risk: RiskManager,
    main_strategy: Box<dyn TradingStrategy>,
    fallback_strategy: Option<Box<dyn TradingStrategy>>,
    lookback: usize,
    position: Position,
    cycle: u64,
}

impl TradingEngine {
    pub fn new(
        asset: AssetConfig,
        market: Arc<dyn MarketDataClient>,
        orders: Arc<dyn OrderClient>,
    ) -> AppResult<Self> {
        let main_strategy = asset.main_strategy.build();
        let fallback_strategy = if asset.fallback_enabled {
            Some(asset.fallback_strategy.build())
        } else {
            None
        };
        Self::with_strategies(asset, market, orders, main_strategy, fallback_strategy)
    }

    /// Build with explicit strategy instances instead of the configured
    /// variants.
    pub fn with_strategies(
        asset: AssetConfig,
        market: Arc<dyn MarketDataClient>,
        orders: Arc<dyn OrderClient>,
        main_strategy: Box<dyn TradingStrategy>,
        fallback_strategy: Option<Box<dyn TradingStrategy>>,
    ) -> AppResult<Self> {
        let risk = RiskManager::new(
            asset.stop_loss_pct,
            asset.acceptable_loss_pct,
            asset.take_profit_tiers(),
        )
        .map_err(AppError::Config)?;

        let lookback = main_strategy
            .lookback()
            .max(fallback_strategy.as_ref().map_or(0, |s| s.lookback()));
        let position = Position::flat(risk.tier_count());

        Ok(Self {
            asset,
            market,
            orders,
            risk,
            main_strategy,
            fallback_strategy,
            lookback,
            position,
            cycle: 0,
        })
    }

    pub fn asset(&self) -> &AssetConfig {
        &self.asset
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Cycles attempted so far, including failed ones.
    pub fn cycles_run(&self) -> u64 {
        self.cycle
    }

    /// Run one full cycle. An exchange failure surfaces as an error without
    /// touching position state; the caller treats it as a no-op Hold and
    /// retries on its next scheduled cycle.
    pub async fn run_cycle(&mut self) -> AppResult<CycleReport> {
        self.cycle += 1;

        let snapshot = self.fetch_snapshot().await?;
        let (decision, source) = self.decide(&snapshot.history).await;
        let outcome = self.act(&snapshot, &decision).await?;

        let time_to_sleep = if outcome.order_executed() {
            self.asset.post_order_delay()
        } else {
            self.asset.cycle_interval()
        };

        let strategy_name = match source {
            DecisionSource::Fallback => self
                .fallback_strategy
                .as_ref()
                .map_or_else(|| self.main_strategy.name(), |s| s.name()),
            _ => self.main_strategy.name(),
        };

        Ok(CycleReport {
            cycle: self.cycle,
            stock_code: self.asset.stock_code.clone(),
            symbol: self.asset.symbol.clone(),
            taken_at: snapshot.taken_at,
            price: snapshot.price,
            strategy_name: strategy_name.to_string(),
            decision_source: source,
            decision,
            outcome,
            position: self.position_view(snapshot.price),
            time_to_sleep,
        })
    }

    async fn fetch_snapshot(&self) -> AppResult<MarketSnapshot> {
        let history = self
            .market
            .get_candles(&self.asset.symbol, &self.asset.candle_interval, self.lookback)
            .await?;
        let price = self.market.get_price(&self.asset.symbol).await?;

        Ok(MarketSnapshot {
            price,
            history,
            taken_at: Utc::now(),
        })
    }

    /// Main strategy first; its failure (not a Hold) falls back to the
    /// secondary. When both fail the cycle degrades to Hold and says so.
    async fn decide(&self, history: &PriceHistory) -> (Decision, DecisionSource) {
        match self.main_strategy.evaluate(history).await {
            Ok(decision) => (decision, DecisionSource::Main),
            Err(main_err) => {
                log::warn!(
                    "[{}] Main strategy '{}' failed: {}",
                    self.asset.symbol,
                    self.main_strategy.name(),
                    main_err
                );
                match &self.fallback_strategy {
                    Some(fallback) => match fallback.evaluate(history).await {
                        Ok(decision) => (decision, DecisionSource::Fallback),
                        Err(fallback_err) => {
                            log::error!(
                                "[{}] Fallback strategy '{}' failed after main: {}",
                                self.asset.symbol,
                                fallback.name(),
                                fallback_err
                            );
                            (Decision::hold(), DecisionSource::Failed)
                        }
                    },
                    None => (Decision::hold(), DecisionSource::Failed),
                }
            }
        }
    }

    /// Apply the tie-break order: stop-loss, then take-profit tiers, then
    /// the strategy's own signal.
    async fn act(&mut self, snapshot: &MarketSnapshot, decision: &Decision) -> AppResult<CycleOutcome> {
        if self.position.is_long() {
            match self.risk.assess(snapshot.price, &self.position) {
                RiskAction::ForceExit => {
                    let fill = self.sell(self.position.remaining_quantity).await?;
                    self.position.reduce(fill.quantity);
                    log::info!(
                        "[{}] Stop-loss exit at {} (entry {})",
                        self.asset.symbol,
                        fill.price,
                        self.position.entry_price
                    );
                    return Ok(CycleOutcome::StopLossExit { fill });
                }
                RiskAction::PartialExit { tier, amount_pct } => {
                    let quantity = (self.position.remaining_quantity * amount_pct
                        / Decimal::ONE_HUNDRED)
                        .round_dp(QUANTITY_DECIMALS);
                    let fill = self.sell(quantity).await?;
                    self.position.tiers_triggered[tier] = true;
                    self.position.reduce(fill.quantity);
                    log::info!(
                        "[{}] Take-profit tier {} filled {} at {}",
                        self.asset.symbol,
                        tier + 1,
                        fill.quantity,
                        fill.price
                    );
                    return Ok(CycleOutcome::TookProfit { tier, fill });
                }
                RiskAction::None => {}
            }

            return match decision.action {
                TradeAction::Sell => {
                    let floor = self.risk.sell_floor(self.position.entry_price);
                    if snapshot.price < floor {
                        log::info!(
                            "[{}] Sell signal held: price {} below acceptable-loss floor {}",
                            self.asset.symbol,
                            snapshot.price,
                            floor
                        );
                        return Ok(CycleOutcome::HeldBelowFloor { floor });
                    }
                    let fill = self.sell(self.position.remaining_quantity).await?;
                    self.position.reduce(fill.quantity);
                    Ok(CycleOutcome::StrategyExit { fill })
                }
                // Already long; a Buy cannot pyramid.
                TradeAction::Buy | TradeAction::Hold => Ok(CycleOutcome::Held),
            };
        }

        match decision.action {
            TradeAction::Buy => self.enter(snapshot.price).await,
            TradeAction::Sell | TradeAction::Hold => Ok(CycleOutcome::Held),
        }
    }

    async fn enter(&mut self, price: Decimal) -> AppResult<CycleOutcome> {
        let balance = self.market.get_balance(&self.asset.quote_asset).await?;

        let quantity = match self.asset.trade_amount {
            TradeAmount::Fixed(quantity) => quantity,
            TradeAmount::QuoteFraction(pct) => {
                (balance.free * pct / Decimal::ONE_HUNDRED / price).round_dp(QUANTITY_DECIMALS)
            }
        };
        let needed = quantity * price;

        if balance.free < needed {
            log::warn!(
                "[{}] Buy signal skipped: need {} {}, have {}",
                self.asset.symbol,
                needed,
                self.asset.quote_asset,
                balance.free
            );
            return Ok(CycleOutcome::InsufficientFunds {
                needed,
                available: balance.free,
            });
        }

        match self.orders.market_buy(&self.asset.symbol, quantity).await {
            Ok(fill) => {
                if fill.quantity != quantity {
                    log::warn!(
                        "[{}] Buy fill mismatch: requested {}, filled {}; adopting the fill",
                        self.asset.symbol,
                        quantity,
                        fill.quantity
                    );
                }
                self.position.open(&fill);
                log::info!(
                    "[{}] Entered long: {} at {}",
                    self.asset.symbol,
                    fill.quantity,
                    fill.price
                );
                Ok(CycleOutcome::Entered { fill })
            }
            // The exchange can still reject on balance even after the
            // pre-check (price moved, fees). Same non-fatal outcome.
            Err(ExchangeError::InsufficientFunds(msg)) => {
                log::warn!("[{}] Buy rejected by exchange: {}", self.asset.symbol, msg);
                Ok(CycleOutcome::InsufficientFunds {
                    needed,
                    available: balance.free,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sell(&self, quantity: Decimal) -> AppResult<OrderFill> {
        let fill = self.orders.market_sell(&self.asset.symbol, quantity).await?;
        if fill.quantity != quantity {
            log::warn!(
                "[{}] Sell fill mismatch: requested {}, filled {}; adopting the fill",
                self.asset.symbol,
                quantity,
                fill.quantity
            );
        }
        Ok(fill)
    }

    fn position_view(&self, price: Decimal) -> PositionView {
        if !self.position.is_long() {
            return PositionView::Flat;
        }
        PositionView::Long {
            entry_price: self.position.entry_price,
            entry_quantity: self.position.entry_quantity,
            remaining_quantity: self.position.remaining_quantity,
            entry_time: self.position.entry_time,
            stop_loss: self.risk.stop_loss_threshold(self.position.entry_price),
            sell_floor: self.risk.sell_floor(self.position.entry_price),
            next_tier: self.risk.next_tier(&self.position),
            variation_pct: self.position.variation_pct(price),
        }
    }
}
