use thiserror::Error;

/// OKX error codes that mean "try again later" rather than "your request is wrong".
const OKX_TRANSIENT_CODES: &[&str] = &["50001", "50004", "50011", "50013", "50026"];

/// Errors raised anywhere in the bot
///
/// Split along the lines the trading loop cares about: transient I/O is
/// retried, everything else is reported and left for the next cycle.
#[derive(Debug, Error)]
pub enum BotError {
    /// Connection failures, timeouts, 5xx responses
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The exchange understood the request and refused it
    #[error("exchange rejected request ({code}): {message}")]
    Exchange { code: String, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    /// Market data does not support the requested computation
    #[error("data error: {0}")]
    Data(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Whether retrying the same request later can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Network(_) | BotError::RateLimited(_) => true,
            BotError::Exchange { code, .. } => OKX_TRANSIENT_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    pub fn exchange(code: impl Into<String>, message: impl Into<String>) -> Self {
        BotError::Exchange {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                return BotError::RateLimited(e.to_string());
            }
            if status.is_server_error() {
                return BotError::Network(e.to_string());
            }
            return BotError::exchange(status.as_u16().to_string(), e.to_string());
        }

        if e.is_decode() {
            BotError::Decode(e.to_string())
        } else {
            BotError::Network(e.to_string())
        }
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}
