//! Runtime settings
//!
//! Layered the usual way: built-in defaults, then `config/swapbot.toml` (optional),
//! then `SWAPBOT__SECTION__KEY` environment variables. Secrets never live here;
//! API keys are read straight from the environment by the clients that need them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::models::{AnchorPoint, CandleInterval, Direction, TradeMode};
use crate::Result;

pub const DEFAULT_CONFIG_PATH: &str = "config/swapbot.toml";

/// Top-level settings, loaded once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub cycle: CycleSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub watcher: WatcherSettings,
    #[serde(default)]
    pub notifier: NotifierSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    /// Send `x-simulated-trading: 1` (OKX demo account)
    pub simulated: bool,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.okx.com".to_string(),
            simulated: false,
            request_timeout_ms: 5000,
            max_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl ExchangeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleSettings {
    pub interval: CandleInterval,
    /// Bars kept per instrument window
    pub max_len: usize,
    /// Bars fetched right at the boundary
    pub recent_limit: usize,
    pub fetch_timeout_ms: u64,
    pub order_timeout_ms: u64,
    /// Pause between placing orders and re-reading positions
    pub settle_delay_secs: u64,
    pub restart_delay_secs: u64,
    /// Minimum lead time before the next boundary
    pub ahead_secs: i64,
    pub closed_bar_retries: u32,
    pub closed_bar_retry_delay_ms: u64,
    /// Run the trendline monitor alongside the trading cycle
    pub with_monitor: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            interval: CandleInterval::Minutes(15),
            max_len: 1000,
            recent_limit: 10,
            fetch_timeout_ms: 1000,
            order_timeout_ms: 5000,
            settle_delay_secs: 20,
            restart_delay_secs: 20,
            ahead_secs: 5,
            closed_bar_retries: 5,
            closed_bar_retry_delay_ms: 1000,
            with_monitor: false,
        }
    }
}

impl CycleSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_millis(self.order_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn closed_bar_retry_delay(&self) -> Duration {
        Duration::from_millis(self.closed_bar_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval: CandleInterval,
    pub check_interval_secs: u64,
    pub max_candles: usize,
    pub refresh_limit: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: CandleInterval::Minutes(15),
            check_interval_secs: 30,
            max_candles: 1000,
            refresh_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    pub symbols: Vec<String>,
    pub intervals: Vec<CandleInterval>,
    /// Bars fetched per (symbol, interval) scan
    pub limit: usize,
    pub stoch_period: usize,
    pub smooth_period: usize,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            symbols: vec![
                "BTC-USDT-SWAP".to_string(),
                "ETH-USDT-SWAP".to_string(),
                "SOL-USDT-SWAP".to_string(),
            ],
            intervals: vec![
                CandleInterval::Minutes(15),
                CandleInterval::Hours(4),
                CandleInterval::Days(1),
                CandleInterval::Weeks(1),
            ],
            limit: 100,
            stoch_period: 14,
            smooth_period: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    pub dingtalk_url: String,
    /// Minimum spacing between throttled alerts
    pub min_interval_secs: u64,
    pub per_minute: u32,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            dingtalk_url: "https://oapi.dingtalk.com/robot/send".to_string(),
            min_interval_secs: 1800,
            per_minute: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub trendline_path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            trendline_path: PathBuf::from("data/trendlines.json"),
        }
    }
}

/// One traded perpetual swap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentConfig {
    pub instrument_id: String,
    /// Target notional leverage; must stay below the exchange's max
    pub leverage: Decimal,
    #[serde(default)]
    pub trade_mode: TradeMode,
    #[serde(flatten)]
    pub strategy: StrategyConfig,
}

/// Strategy selection, one parameter struct per kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy_id", content = "params", rename_all = "snake_case")]
pub enum StrategyConfig {
    Bollinger {
        n: usize,
        m: f64,
    },
    Trendline {
        start_point: AnchorPoint,
        end_point: AnchorPoint,
        direction: Direction,
    },
    Random,
    None,
}

impl StrategyConfig {
    pub fn id(&self) -> &'static str {
        match self {
            StrategyConfig::Bollinger { .. } => "bollinger",
            StrategyConfig::Trendline { .. } => "trendline",
            StrategyConfig::Random => "random",
            StrategyConfig::None => "none",
        }
    }
}

impl Settings {
    /// Load from the default file location plus environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("SWAPBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        tracing::info!(
            "⚙️  Loaded settings: {} instrument(s), interval {}",
            settings.instruments.len(),
            settings.cycle.interval
        );

        Ok(settings)
    }

    /// Reject settings that could only fail later, mid-cycle
    pub fn validate(&self) -> Result<()> {
        if self.cycle.max_len == 0 || self.cycle.recent_limit == 0 {
            return Err(BotError::Config(
                "cycle.max_len and cycle.recent_limit must be positive".to_string(),
            ));
        }
        if self.cycle.recent_limit > self.cycle.max_len {
            return Err(BotError::Config(format!(
                "cycle.recent_limit ({}) exceeds cycle.max_len ({})",
                self.cycle.recent_limit, self.cycle.max_len
            )));
        }
        if self.monitor.check_interval_secs == 0 {
            return Err(BotError::Config(
                "monitor.check_interval_secs must be positive".to_string(),
            ));
        }

        for instrument in &self.instruments {
            if instrument.instrument_id.trim().is_empty() {
                return Err(BotError::Config("instrument_id must not be empty".to_string()));
            }
            if instrument.leverage <= Decimal::ZERO {
                return Err(BotError::Config(format!(
                    "{}: leverage must be positive, got {}",
                    instrument.instrument_id, instrument.leverage
                )));
            }
        }

        let mut ids: Vec<&str> = self
            .instruments
            .iter()
            .map(|i| i.instrument_id.as_str())
            .collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(BotError::Config("duplicate instrument_id in instruments".to_string()));
        }

        Ok(())
    }
}
