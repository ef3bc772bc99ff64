use chrono::{DateTime, Utc};

use super::candle_window::merge_candles;
use crate::api::{CandleQuery, Exchange, RetryPolicy};
use crate::models::{Candle, CandleInterval};
use crate::Result;

// One history page is at most 100 bars on OKX; stop well past what max_len needs
const MAX_HISTORY_PAGES: usize = 50;

/// Keep only bars that have fully closed at `now`
pub fn retain_closed(candles: &mut Vec<Candle>, interval: CandleInterval, now: DateTime<Utc>) {
    let span = interval.duration();
    candles.retain(|c| c.begin_time + span <= now);
}

/// Load up to `max_len` closed bars, newest last
///
/// Starts from the most recent page and walks backwards until the window is
/// full or the exchange runs out of history.
pub async fn fetch_history(
    exchange: &dyn Exchange,
    retry: &RetryPolicy,
    inst_id: &str,
    interval: CandleInterval,
    max_len: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Candle>> {
    let first = CandleQuery::recent(inst_id, interval, max_len);
    let mut candles = retry
        .run(&format!("fetch {} candles", inst_id), || exchange.fetch_candles(&first))
        .await?;
    retain_closed(&mut candles, interval, now);

    let mut pages = 0;
    while candles.len() < max_len && pages < MAX_HISTORY_PAGES {
        let oldest = match candles.first() {
            Some(c) => c.begin_time,
            None => break,
        };

        let query = CandleQuery::recent(inst_id, interval, max_len - candles.len()).before(oldest);
        let page = retry
            .run(&format!("fetch {} history", inst_id), || exchange.fetch_candles(&query))
            .await?;

        let before = candles.len();
        candles = merge_candles(&candles, &page, max_len);
        pages += 1;
        if candles.len() == before {
            break;
        }
    }

    tracing::info!(
        instrument = %inst_id,
        "📚 Loaded {} closed {} bars",
        candles.len(),
        interval
    );

    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderRequest, OrderResult, PositionState};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    /// Serves a fixed series the way OKX pages it
    struct SeriesExchange {
        series: Vec<Candle>,
        page: usize,
        queries: Mutex<Vec<CandleQuery>>,
    }

    #[async_trait]
    impl Exchange for SeriesExchange {
        async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>> {
            self.queries.lock().unwrap().push(query.clone());
            let eligible: Vec<Candle> = self
                .series
                .iter()
                .filter(|c| query.before.map_or(true, |b| c.begin_time < b))
                .cloned()
                .collect();
            let take = query.limit.min(self.page);
            Ok(eligible[eligible.len().saturating_sub(take)..].to_vec())
        }

        async fn fetch_position(&self, _inst_id: &str, _timeout: Option<StdDuration>) -> Result<PositionState> {
            unimplemented!()
        }

        async fn place_order(&self, _order: &OrderRequest, _timeout: Option<StdDuration>) -> Result<OrderResult> {
            unimplemented!()
        }
    }

    fn create_test_candles(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Candle {
                begin_time: start + Duration::minutes(15 * i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_retain_closed_drops_in_progress_bar() {
        let mut candles = create_test_candles(4);
        // Bar 3 opened at +45m and closes at +60m
        let now = candles[3].begin_time + Duration::minutes(5);
        retain_closed(&mut candles, CandleInterval::Minutes(15), now);
        assert_eq!(candles.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_history_pages_back() {
        let series = create_test_candles(350);
        let now = series.last().unwrap().begin_time + Duration::minutes(3);
        let exchange = SeriesExchange {
            series,
            page: 100,
            queries: Mutex::new(Vec::new()),
        };

        let candles = fetch_history(
            &exchange,
            &RetryPolicy::none(),
            "SOL-USDT-SWAP",
            CandleInterval::Minutes(15),
            250,
            now,
        )
        .await
        .unwrap();

        // In-progress bar dropped, 250 closed bars kept
        assert_eq!(candles.len(), 250);
        assert_eq!(candles.last().unwrap().close, 100.0 + 348.0);
        for pair in candles.windows(2) {
            assert!(pair[0].begin_time < pair[1].begin_time);
        }
        assert!(exchange.queries.lock().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_fetch_history_stops_when_exhausted() {
        let series = create_test_candles(40);
        let now = series.last().unwrap().begin_time + Duration::minutes(15);
        let exchange = SeriesExchange {
            series,
            page: 100,
            queries: Mutex::new(Vec::new()),
        };

        let candles = fetch_history(
            &exchange,
            &RetryPolicy::none(),
            "SOL-USDT-SWAP",
            CandleInterval::Minutes(15),
            1000,
            now,
        )
        .await
        .unwrap();

        assert_eq!(candles.len(), 40);
    }
}
