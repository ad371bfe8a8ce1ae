// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::trading::risk::{RiskManager, TakeProfitTier};
use crate::trading::strategies::StrategyConfig;
use dotenv::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Trading bot configuration. Built once at startup and passed by reference;
/// nothing here mutates after `main` constructs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Exchange API credentials
    pub exchange: ExchangeConfig,

    /// Telegram notification channel
    pub telegram: TelegramConfig,

    /// Worker scheduling
    pub orchestrator: OrchestratorConfig,

    /// Reserve-asset maintenance
    pub reserve: ReserveConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Traded assets
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Whether asset workers contend for one lock around exchange I/O or run
/// their cycles fully in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    Serialized,
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub mode: ConcurrencyMode,
}

/// Keeps a fee-payment asset topped up from quote holdings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub enabled: bool,
    /// Asset to keep stocked (fees are paid in it).
    pub reserve_asset: String,
    pub quote_asset: String,
    pub min_reserve: Decimal,
    /// Quote balance below this is left untouched.
    pub quote_floor: Decimal,
    /// Percentage of free quote balance spent per top-up.
    pub buy_fraction_pct: Decimal,
    pub check_interval_secs: u64,
}

impl ReserveConfig {
    pub fn symbol(&self) -> String {
        format!("{}{}", self.reserve_asset, self.quote_asset)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    pub to_file: bool,

    pub file_path: Option<String>,
}

/// How much to buy when entering a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TradeAmount {
    /// Absolute base-asset quantity.
    Fixed(Decimal),
    /// Percentage of the free quote balance at entry time.
    QuoteFraction(Decimal),
}

/// Immutable per-asset trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Base asset ticker, e.g. "XRP".
    pub stock_code: String,
    /// Trading pair, e.g. "XRPUSDT".
    pub symbol: String,
    /// Quote asset the pair settles in, e.g. "USDT".
    pub quote_asset: String,
    pub trade_amount: TradeAmount,
    /// Candle interval, e.g. "5m".
    pub candle_interval: String,
    /// Seconds between strategy evaluations.
    pub cycle_interval_secs: u64,
    /// Seconds to wait after an executed order before the next cycle.
    pub post_order_delay_secs: u64,
    pub acceptable_loss_pct: Decimal,
    pub stop_loss_pct: Decimal,
    /// Take-profit triggers, percent above entry, ascending.
    pub take_profit_triggers: Vec<Decimal>,
    /// Per-tier sell amounts, percent of the remaining quantity.
    pub take_profit_amounts: Vec<Decimal>,
    pub fallback_enabled: bool,
    pub main_strategy: StrategyConfig,
    pub fallback_strategy: StrategyConfig,
}

impl AssetConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn post_order_delay(&self) -> Duration {
        Duration::from_secs(self.post_order_delay_secs)
    }

    pub fn take_profit_tiers(&self) -> Vec<TakeProfitTier> {
        self.take_profit_triggers
            .iter()
            .zip(self.take_profit_amounts.iter())
            .map(|(&trigger_pct, &amount_pct)| TakeProfitTier {
                trigger_pct,
                amount_pct,
            })
            .collect()
    }

    /// All misconfigurations are fatal here, before any worker spawns.
    pub fn validate(&self) -> Result<(), String> {
        if self.stock_code.is_empty() || self.symbol.is_empty() || self.quote_asset.is_empty() {
            return Err("Asset symbols must not be empty".to_string());
        }
        if self.take_profit_triggers.len() != self.take_profit_amounts.len() {
            return Err(format!(
                "{}: take-profit triggers and amounts differ in length ({} vs {})",
                self.symbol,
                self.take_profit_triggers.len(),
                self.take_profit_amounts.len()
            ));
        }
        match self.trade_amount {
            TradeAmount::Fixed(quantity) => {
                if quantity <= Decimal::ZERO {
                    return Err(format!("{}: traded quantity must be positive", self.symbol));
                }
            }
            TradeAmount::QuoteFraction(pct) => {
                if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                    return Err(format!(
                        "{}: traded balance fraction must lie in (0, 100]",
                        self.symbol
                    ));
                }
            }
        }
        if self.cycle_interval_secs == 0 {
            return Err(format!("{}: cycle interval must be positive", self.symbol));
        }
        if self.post_order_delay_secs == 0 {
            return Err(format!("{}: post-order delay must be positive", self.symbol));
        }
        self.main_strategy
            .validate()
            .map_err(|e| format!("{}: main strategy: {}", self.symbol, e))?;
        if self.fallback_enabled {
            self.fallback_strategy
                .validate()
                .map_err(|e| format!("{}: fallback strategy: {}", self.symbol, e))?;
        }
        // Tier arithmetic shares the RiskManager's constructor checks.
        RiskManager::new(
            self.stop_loss_pct,
            self.acceptable_loss_pct,
            self.take_profit_tiers(),
        )
        .map_err(|e| format!("{}: {}", self.symbol, e))?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables. An `ASSETS_FILE`
    /// pointing at a JSON list overrides the built-in asset profiles.
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let exchange = ExchangeConfig {
            api_key: env::var("API_KEY")
                .map_err(|_| AppError::Config("Missing API_KEY environment variable".to_string()))?,
            api_secret: env::var("API_SECRET").map_err(|_| {
                AppError::Config("Missing API_SECRET environment variable".to_string())
            })?,
        };

        let telegram = TelegramConfig {
            bot_token: env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
                AppError::Config("Missing TELEGRAM_BOT_TOKEN environment variable".to_string())
            })?,
            chat_id: env::var("TELEGRAM_CHAT_ID").map_err(|_| {
                AppError::Config("Missing TELEGRAM_CHAT_ID environment variable".to_string())
            })?,
        };

        let serialized = env::var("SERIALIZED_TRADING")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let orchestrator = OrchestratorConfig {
            mode: if serialized {
                ConcurrencyMode::Serialized
            } else {
                ConcurrencyMode::Parallel
            },
        };

        let reserve = ReserveConfig {
            enabled: env::var("RESERVE_TOPUP_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            reserve_asset: env::var("RESERVE_ASSET").unwrap_or_else(|_| "BNB".to_string()),
            quote_asset: env::var("RESERVE_QUOTE_ASSET").unwrap_or_else(|_| "USDT".to_string()),
            min_reserve: env::var("RESERVE_MIN_BALANCE")
                .unwrap_or_else(|_| "0.01".to_string())
                .parse()
                .unwrap_or(dec!(0.01)),
            quote_floor: env::var("RESERVE_QUOTE_FLOOR")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(dec!(50)),
            buy_fraction_pct: env::var("RESERVE_BUY_FRACTION_PCT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(dec!(5)),
            check_interval_secs: env::var("RESERVE_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let assets = match env::var("ASSETS_FILE") {
            Ok(path) => Self::assets_from_file(path)?,
            Err(_) => Self::default_assets(),
        };

        Ok(Config {
            exchange,
            telegram,
            orchestrator,
            reserve,
            logging,
            assets,
        })
    }

    fn assets_from_file<P: AsRef<Path>>(path: P) -> AppResult<Vec<AssetConfig>> {
        let mut file = File::open(&path)
            .map_err(|e| AppError::Config(format!("Failed to open assets file: {}", e)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AppError::Config(format!("Failed to read assets file: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse assets file: {}", e)))
    }

    /// The deployment's standing portfolio: Vortex as the main strategy with
    /// a plain moving-average fallback, 5-minute candles, tiered take-profit
    /// at +1/+2/+4 percent.
    pub fn default_assets() -> Vec<AssetConfig> {
        let main_strategy = StrategyConfig::Vortex { period: 14 };
        let fallback_strategy = StrategyConfig::MovingAverageCross {
            fast_period: 9,
            slow_period: 21,
        };

        let profile = |stock_code: &str, symbol: &str, quantity: Decimal| AssetConfig {
            stock_code: stock_code.to_string(),
            symbol: symbol.to_string(),
            quote_asset: "USDT".to_string(),
            trade_amount: TradeAmount::Fixed(quantity),
            candle_interval: "5m".to_string(),
            cycle_interval_secs: 300,
            post_order_delay_secs: 300,
            acceptable_loss_pct: Decimal::ZERO,
            stop_loss_pct: dec!(2.0),
            take_profit_triggers: vec![dec!(1), dec!(2), dec!(4)],
            take_profit_amounts: vec![dec!(50), dec!(50), dec!(100)],
            fallback_enabled: true,
            main_strategy: main_strategy.clone(),
            fallback_strategy: fallback_strategy.clone(),
        };

        vec![
            profile("XRP", "XRPUSDT", dec!(3)),
            profile("SOL", "SOLUSDT", dec!(0.1)),
            profile("ADA", "ADAUSDT", dec!(10)),
            profile("BTC", "BTCUSDT", dec!(0.001)),
        ]
    }

    /// Load full configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| AppError::Config(format!("Failed to open config file: {}", e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Validate everything that must hold before workers spawn.
    pub fn validate(&self) -> AppResult<()> {
        if self.assets.is_empty() {
            return Err(AppError::Config("No assets configured".to_string()));
        }
        for asset in &self.assets {
            asset.validate().map_err(AppError::Config)?;
        }
        if self.reserve.enabled {
            if self.reserve.min_reserve <= Decimal::ZERO {
                return Err(AppError::Config(
                    "Reserve minimum balance must be positive".to_string(),
                ));
            }
            if self.reserve.buy_fraction_pct <= Decimal::ZERO
                || self.reserve.buy_fraction_pct > Decimal::ONE_HUNDRED
            {
                return Err(AppError::Config(
                    "Reserve buy fraction must lie in (0, 100]".to_string(),
                ));
            }
            if self.reserve.check_interval_secs == 0 {
                return Err(AppError::Config(
                    "Reserve check interval must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path)
                    .map_err(|e| AppError::Config(format!("Failed to create log file: {}", e)))?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.init();

        Ok(())
    }
}
