use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Candle bar length, spelled the way OKX spells it (`15m`, `1H`, `1D`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CandleInterval {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
}

impl CandleInterval {
    pub fn seconds(&self) -> i64 {
        match *self {
            CandleInterval::Minutes(n) => n as i64 * 60,
            CandleInterval::Hours(n) => n as i64 * 3600,
            CandleInterval::Days(n) => n as i64 * 86_400,
            CandleInterval::Weeks(n) => n as i64 * 7 * 86_400,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// OKX `bar` query value
    pub fn as_bar(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CandleInterval::Minutes(n) => write!(f, "{}m", n),
            CandleInterval::Hours(n) => write!(f, "{}H", n),
            CandleInterval::Days(n) => write!(f, "{}D", n),
            CandleInterval::Weeks(n) => write!(f, "{}W", n),
        }
    }
}

impl FromStr for CandleInterval {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| BotError::Config(format!("interval '{}' has no unit", s)))?;
        let (digits, unit) = s.split_at(split);
        let n: u32 = digits
            .parse()
            .map_err(|_| BotError::Config(format!("interval '{}' has no count", s)))?;
        if n == 0 {
            return Err(BotError::Config(format!("interval '{}' must be positive", s)));
        }

        match unit {
            "m" => Ok(CandleInterval::Minutes(n)),
            "h" | "H" => Ok(CandleInterval::Hours(n)),
            "d" | "D" => Ok(CandleInterval::Days(n)),
            "w" | "W" => Ok(CandleInterval::Weeks(n)),
            _ => Err(BotError::Config(format!("unsupported interval unit in '{}'", s))),
        }
    }
}

impl TryFrom<String> for CandleInterval {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CandleInterval> for String {
    fn from(value: CandleInterval) -> Self {
        value.to_string()
    }
}
