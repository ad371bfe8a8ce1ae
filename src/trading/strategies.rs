// src/trading/strategies.rs
use crate::analysis::indicators;
use crate::domain::errors::{StrategyError, StrategyResult};
use crate::domain::models::{Decision, IndicatorValue, PriceHistory, TradeAction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trading strategy contract. Implementations are pure functions of the
/// candle window and their own parameters; a quiet market is a `Hold`
/// decision, never an error.
#[async_trait]
pub trait TradingStrategy: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Candles one evaluation needs.
    fn lookback(&self) -> usize;

    async fn evaluate(&self, history: &PriceHistory) -> StrategyResult<Decision>;
}

/// Closed set of configurable strategies. Configuration picks a variant tag
/// plus its parameter record; `build` turns it into a live strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    MovingAverageCross {
        fast_period: usize,
        slow_period: usize,
    },
    MovingAverageAnticipation {
        fast_period: usize,
        slow_period: usize,
        volatility_factor: f64,
    },
    MovingAverageRsiVolume {
        fast_period: usize,
        slow_period: usize,
        rsi_period: usize,
        rsi_overbought: f64,
        rsi_oversold: f64,
        volume_multiplier: f64,
    },
    Rsi {
        period: usize,
        overbought: f64,
        oversold: f64,
    },
    Vortex {
        period: usize,
    },
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn TradingStrategy> {
        match *self {
            StrategyConfig::MovingAverageCross {
                fast_period,
                slow_period,
            } => Box::new(MovingAverageCrossStrategy::new(fast_period, slow_period)),
            StrategyConfig::MovingAverageAnticipation {
                fast_period,
                slow_period,
                volatility_factor,
            } => Box::new(MovingAverageAnticipationStrategy::new(
                fast_period,
                slow_period,
                volatility_factor,
            )),
            StrategyConfig::MovingAverageRsiVolume {
                fast_period,
                slow_period,
                rsi_period,
                rsi_overbought,
                rsi_oversold,
                volume_multiplier,
            } => Box::new(MovingAverageRsiVolumeStrategy::new(
                fast_period,
                slow_period,
                rsi_period,
                rsi_overbought,
                rsi_oversold,
                volume_multiplier,
            )),
            StrategyConfig::Rsi {
                period,
                overbought,
                oversold,
            } => Box::new(RsiStrategy::new(period, overbought, oversold)),
            StrategyConfig::Vortex { period } => Box::new(VortexStrategy::new(period)),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match *self {
            StrategyConfig::MovingAverageCross {
                fast_period,
                slow_period,
            }
            | StrategyConfig::MovingAverageAnticipation {
                fast_period,
                slow_period,
                ..
            } => {
                if fast_period < 2 {
                    return Err(format!("Fast period must be >= 2, got {}", fast_period));
                }
                if slow_period <= fast_period {
                    return Err(format!(
                        "Slow period must be > fast period ({} <= {})",
                        slow_period, fast_period
                    ));
                }
                if let StrategyConfig::MovingAverageAnticipation {
                    volatility_factor, ..
                } = *self
                {
                    if volatility_factor <= 0.0 {
                        return Err(format!(
                            "Volatility factor must be positive, got {}",
                            volatility_factor
                        ));
                    }
                }
                Ok(())
            }
            StrategyConfig::MovingAverageRsiVolume {
                fast_period,
                slow_period,
                rsi_period,
                rsi_overbought,
                rsi_oversold,
                volume_multiplier,
            } => {
                if fast_period < 2 {
                    return Err(format!("Fast period must be >= 2, got {}", fast_period));
                }
                if slow_period <= fast_period {
                    return Err(format!(
                        "Slow period must be > fast period ({} <= {})",
                        slow_period, fast_period
                    ));
                }
                if rsi_period < 2 {
                    return Err(format!("RSI period must be >= 2, got {}", rsi_period));
                }
                if !(0.0..=100.0).contains(&rsi_oversold)
                    || !(0.0..=100.0).contains(&rsi_overbought)
                {
                    return Err("RSI thresholds must lie in [0, 100]".to_string());
                }
                if rsi_oversold >= rsi_overbought {
                    return Err(format!(
                        "RSI oversold threshold must be < overbought ({} >= {})",
                        rsi_oversold, rsi_overbought
                    ));
                }
                if volume_multiplier <= 0.0 {
                    return Err(format!(
                        "Volume multiplier must be positive, got {}",
                        volume_multiplier
                    ));
                }
                Ok(())
            }
            StrategyConfig::Rsi {
                period,
                overbought,
                oversold,
            } => {
                if period < 2 {
                    return Err(format!("RSI period must be >= 2, got {}", period));
                }
                if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
                    return Err("RSI thresholds must lie in [0, 100]".to_string());
                }
                if oversold >= overbought {
                    return Err(format!(
                        "RSI oversold threshold must be < overbought ({} >= {})",
                        oversold, overbought
                    ));
                }
                Ok(())
            }
            StrategyConfig::Vortex { period } => {
                if period < 2 {
                    return Err(format!("Vortex period must be >= 2, got {}", period));
                }
                Ok(())
            }
        }
    }
}

/// Fast/slow SMA comparison. Decisive by design so it can serve as the
/// fallback: above means Buy, below means Sell.
pub struct MovingAverageCrossStrategy {
    name: String,
    fast_period: usize,
    slow_period: usize,
}

impl MovingAverageCrossStrategy {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            name: "Moving Average".to_string(),
            fast_period,
            slow_period,
        }
    }
}

#[async_trait]
impl TradingStrategy for MovingAverageCrossStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow_period + 2
    }

    async fn evaluate(&self, history: &PriceHistory) -> StrategyResult<Decision> {
        let prices = history.close_prices();
        if prices.len() < self.slow_period {
            return Err(StrategyError::InsufficientHistory(format!(
                "Moving average needs {} candles, got {}",
                self.slow_period,
                prices.len()
            )));
        }

        let fast_sma = indicators::calculate_sma(&prices, self.fast_period)?;
        let slow_sma = indicators::calculate_sma(&prices, self.slow_period)?;

        let fast_current = *fast_sma.last().ok_or_else(|| {
            StrategyError::Computation("Empty fast SMA series".to_string())
        })?;
        let slow_current = *slow_sma.last().ok_or_else(|| {
            StrategyError::Computation("Empty slow SMA series".to_string())
        })?;

        let action = if fast_current > slow_current {
            TradeAction::Buy
        } else if fast_current < slow_current {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        };

        Ok(Decision {
            action,
            indicators: vec![
                IndicatorValue {
                    name: "fast_ma".to_string(),
                    value: fast_current,
                },
                IndicatorValue {
                    name: "slow_ma".to_string(),
                    value: slow_current,
                },
            ],
        })
    }
}

/// SMA pair filtered through a volatility band: the gap between the averages
/// must clear `volatility_factor` standard deviations before it counts as a
/// signal. Inside the band the market is treated as noise.
pub struct MovingAverageAnticipationStrategy {
    name: String,
    fast_period: usize,
    slow_period: usize,
    volatility_factor: f64,
}

impl MovingAverageAnticipationStrategy {
    pub fn new(fast_period: usize, slow_period: usize, volatility_factor: f64) -> Self {
        Self {
            name: "Moving Average Anticipation".to_string(),
            fast_period,
            slow_period,
            volatility_factor,
        }
    }
}

#[async_trait]
impl TradingStrategy for MovingAverageAnticipationStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow_period * 2
    }

    async fn evaluate(&self, history: &PriceHistory) -> StrategyResult<Decision> {
        let prices = history.close_prices();
        if prices.len() < self.slow_period {
            return Err(StrategyError::InsufficientHistory(format!(
                "Anticipation needs {} candles, got {}",
                self.slow_period,
                prices.len()
            )));
        }

        let fast_sma = indicators::calculate_sma(&prices, self.fast_period)?;
        let slow_sma = indicators::calculate_sma(&prices, self.slow_period)?;
        let stddev = indicators::calculate_rolling_stddev(&prices, self.slow_period)?;

        let fast_current = *fast_sma.last().ok_or_else(|| {
            StrategyError::Computation("Empty fast SMA series".to_string())
        })?;
        let slow_current = *slow_sma.last().ok_or_else(|| {
            StrategyError::Computation("Empty slow SMA series".to_string())
        })?;
        let volatility = *stddev.last().ok_or_else(|| {
            StrategyError::Computation("Empty stddev series".to_string())
        })?;

        let gap = fast_current - slow_current;
        let band = self.volatility_factor * volatility;

        let action = if gap > 0.0 && gap >= band {
            TradeAction::Buy
        } else if gap < 0.0 && -gap >= band {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        };

        Ok(Decision {
            action,
            indicators: vec![
                IndicatorValue {
                    name: "fast_ma".to_string(),
                    value: fast_current,
                },
                IndicatorValue {
                    name: "slow_ma".to_string(),
                    value: slow_current,
                },
                IndicatorValue {
                    name: "volatility".to_string(),
                    value: volatility,
                },
            ],
        })
    }
}

/// EMA trend filtered by RSI and volume: a fast/slow EMA trend only counts
/// when RSI still has room in the trend's direction and the latest candle's
/// volume clears `volume_multiplier` times the recent average. Thin-volume
/// moves are treated as noise.
pub struct MovingAverageRsiVolumeStrategy {
    name: String,
    fast_period: usize,
    slow_period: usize,
    rsi_period: usize,
    rsi_overbought: f64,
    rsi_oversold: f64,
    volume_multiplier: f64,
}

impl MovingAverageRsiVolumeStrategy {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        rsi_period: usize,
        rsi_overbought: f64,
        rsi_oversold: f64,
        volume_multiplier: f64,
    ) -> Self {
        Self {
            name: "Moving Average RSI Volume".to_string(),
            fast_period,
            slow_period,
            rsi_period,
            rsi_overbought,
            rsi_oversold,
            volume_multiplier,
        }
    }
}

#[async_trait]
impl TradingStrategy for MovingAverageRsiVolumeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow_period.max(self.rsi_period) * 3
    }

    async fn evaluate(&self, history: &PriceHistory) -> StrategyResult<Decision> {
        let prices = history.close_prices();
        let volumes = history.volumes();
        let needed = self.slow_period.max(self.rsi_period + 1);
        if prices.len() < needed {
            return Err(StrategyError::InsufficientHistory(format!(
                "MA/RSI/volume needs {} candles, got {}",
                needed,
                prices.len()
            )));
        }

        let fast_ema = indicators::calculate_ema(&prices, self.fast_period)?;
        let slow_ema = indicators::calculate_ema(&prices, self.slow_period)?;
        let rsi = indicators::calculate_rsi(&prices, self.rsi_period)?;
        let volume_sma = indicators::calculate_sma(&volumes, self.slow_period)?;

        let fast_current = *fast_ema.last().ok_or_else(|| {
            StrategyError::Computation("Empty fast EMA series".to_string())
        })?;
        let slow_current = *slow_ema.last().ok_or_else(|| {
            StrategyError::Computation("Empty slow EMA series".to_string())
        })?;
        let average_volume = *volume_sma.last().ok_or_else(|| {
            StrategyError::Computation("Empty volume SMA series".to_string())
        })?;
        let last_volume = *volumes.last().ok_or_else(|| {
            StrategyError::Computation("Empty volume series".to_string())
        })?;

        let gap = fast_current - slow_current;
        let volume_confirmed = last_volume >= self.volume_multiplier * average_volume;
        let volume_ratio = if average_volume > 0.0 {
            last_volume / average_volume
        } else {
            0.0
        };

        let action = if gap > 0.0 && rsi < self.rsi_overbought && volume_confirmed {
            TradeAction::Buy
        } else if gap < 0.0 && rsi > self.rsi_oversold && volume_confirmed {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        };

        Ok(Decision {
            action,
            indicators: vec![
                IndicatorValue {
                    name: "fast_ema".to_string(),
                    value: fast_current,
                },
                IndicatorValue {
                    name: "slow_ema".to_string(),
                    value: slow_current,
                },
                IndicatorValue {
                    name: "rsi".to_string(),
                    value: rsi,
                },
                IndicatorValue {
                    name: "volume_ratio".to_string(),
                    value: volume_ratio,
                },
            ],
        })
    }
}

/// RSI overbought/oversold reversal.
pub struct RsiStrategy {
    name: String,
    period: usize,
    overbought: f64,
    oversold: f64,
}

impl RsiStrategy {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        Self {
            name: "RSI".to_string(),
            period,
            overbought,
            oversold,
        }
    }
}

#[async_trait]
impl TradingStrategy for RsiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period * 3
    }

    async fn evaluate(&self, history: &PriceHistory) -> StrategyResult<Decision> {
        let prices = history.close_prices();
        if prices.len() <= self.period {
            return Err(StrategyError::InsufficientHistory(format!(
                "RSI needs {} candles, got {}",
                self.period + 1,
                prices.len()
            )));
        }

        let rsi = indicators::calculate_rsi(&prices, self.period)?;

        let action = if rsi <= self.oversold {
            TradeAction::Buy
        } else if rsi >= self.overbought {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        };

        Ok(Decision {
            action,
            indicators: vec![IndicatorValue {
                name: "rsi".to_string(),
                value: rsi,
            }],
        })
    }
}

/// Vortex directional pair: VI+ above VI- is a long market, below is not.
pub struct VortexStrategy {
    name: String,
    period: usize,
}

impl VortexStrategy {
    pub fn new(period: usize) -> Self {
        Self {
            name: "Vortex".to_string(),
            period,
        }
    }
}

#[async_trait]
impl TradingStrategy for VortexStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period * 2 + 2
    }

    async fn evaluate(&self, history: &PriceHistory) -> StrategyResult<Decision> {
        let highs = history.high_prices();
        let lows = history.low_prices();
        let closes = history.close_prices();

        let (vi_plus, vi_minus) =
            indicators::calculate_vortex(&highs, &lows, &closes, self.period)?;

        let plus_current = *vi_plus.last().ok_or_else(|| {
            StrategyError::Computation("Empty VI+ series".to_string())
        })?;
        let minus_current = *vi_minus.last().ok_or_else(|| {
            StrategyError::Computation("Empty VI- series".to_string())
        })?;

        let action = if plus_current > minus_current {
            TradeAction::Buy
        } else if plus_current < minus_current {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        };

        Ok(Decision {
            action,
            indicators: vec![
                IndicatorValue {
                    name: "vi_plus".to_string(),
                    value: plus_current,
                },
                IndicatorValue {
                    name: "vi_minus".to_string(),
                    value: minus_current,
                },
            ],
        })
    }
}
