use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Candle, CandleInterval, OrderRequest, OrderResult, PositionState};
use crate::Result;

/// Candle request
#[derive(Debug, Clone, PartialEq)]
pub struct CandleQuery {
    pub inst_id: String,
    pub interval: CandleInterval,
    pub limit: usize,
    /// Only bars that opened strictly before this time (paging backwards)
    pub before: Option<DateTime<Utc>>,
    /// Overrides the client's default request timeout
    pub timeout: Option<Duration>,
}

impl CandleQuery {
    pub fn recent(inst_id: impl Into<String>, interval: CandleInterval, limit: usize) -> Self {
        Self {
            inst_id: inst_id.into(),
            interval,
            limit,
            before: None,
            timeout: None,
        }
    }

    pub fn before(mut self, ts: DateTime<Utc>) -> Self {
        self.before = Some(ts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Everything the bot needs from an exchange
///
/// Implementations must be safe to share between the trading cycle and the
/// trendline monitor; both hold the same `Arc<dyn Exchange>`.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Candles in ascending `begin_time` order. May include the in-progress bar.
    async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>>;

    /// Live balance, position and contract spec for one instrument
    async fn fetch_position(&self, inst_id: &str, timeout: Option<Duration>) -> Result<PositionState>;

    /// Submit one market order
    async fn place_order(&self, order: &OrderRequest, timeout: Option<Duration>) -> Result<OrderResult>;
}
