pub mod interval;
pub mod time;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;

pub use interval::CandleInterval;

/// OHLCV bar, keyed by the time the bar opened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub begin_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Directional decision produced by a strategy for one cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Signal {
    Long,
    Short,
    Flat,
    NoAction,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::Long => "LONG",
            Signal::Short => "SHORT",
            Signal::Flat => "FLAT",
            Signal::NoAction => "NO_ACTION",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    None,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
            PositionSide::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// Live account/position snapshot for one instrument
///
/// Always re-fetched from the exchange; never derived locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionState {
    pub inst_id: String,
    /// Available USDT equity
    pub account_balance: Decimal,
    pub side: PositionSide,
    /// Contracts held (always non-negative; direction lives in `side`)
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub unrealized_pnl_ratio: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub mark_price: Decimal,
    pub max_leverage: Decimal,
    /// Contract value in base currency
    pub ct_val: Decimal,
    pub lot_sz: Decimal,
    pub min_sz: Decimal,
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::None || self.size.is_zero()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Margin mode, OKX `tdMode`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    #[default]
    Cross,
    Isolated,
}

impl TradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeMode::Cross => "cross",
            TradeMode::Isolated => "isolated",
        }
    }
}

/// A single market order submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub inst_id: String,
    pub side: OrderSide,
    /// Contracts
    pub size: Decimal,
    pub mode: TradeMode,
    /// Set on closes so a stale plan can never open exposure
    pub reduce_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub inst_id: String,
    pub side: OrderSide,
    pub size: Decimal,
}

/// Trendline breakout direction: `1` watches for an upward cross, `-1` downward
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    Up,
    Down,
}

impl TryFrom<i8> for Direction {
    type Error = BotError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Up),
            -1 => Ok(Direction::Down),
            other => Err(BotError::Config(format!(
                "trendline direction must be 1 or -1, got {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "breakout"),
            Direction::Down => write!(f, "breakdown"),
        }
    }
}

impl From<Direction> for i8 {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// One end of a user-drawn trendline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnchorPoint {
    #[serde(with = "time::gmt8_format")]
    pub time: DateTime<Utc>,
    pub price: f64,
}
