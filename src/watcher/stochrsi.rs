use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::api::{CandleQuery, Exchange, RetryPolicy};
use crate::config::WatcherSettings;
use crate::execution::{merge_candles, next_run_time, sleep_until};
use crate::indicators::{calculate_stoch_rsi, volatility_snapshot, VolatilitySnapshot};
use crate::models::{Candle, CandleInterval};
use crate::notify::Notifier;
use crate::Result;

const VOLATILITY_WINDOW: usize = 20;
/// A bottom turn only counts after a previous turn in oversold territory
const OVERSOLD: f64 = 25.0;
const SATURATED: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    /// Lower low in price, higher low in StochRSI
    Bottom,
    /// Higher high in price, lower high in StochRSI
    Top,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::Bottom => write!(f, "dbl"),
            Divergence::Top => write!(f, "tbl"),
        }
    }
}

fn neighbours(k: &[Option<f64>], i: usize) -> Option<(f64, f64, f64)> {
    Some((k[i - 1]?, k[i]?, k[i + 1]?))
}

/// Indices of StochRSI local minima; the last bar can never be one
fn bottom_turns(k: &[Option<f64>]) -> Vec<usize> {
    (1..k.len().saturating_sub(1))
        .filter(|&i| matches!(neighbours(k, i), Some((prev, cur, next)) if cur < prev && cur < next))
        .collect()
}

/// Indices of StochRSI local maxima, plus exits from a 100 plateau
fn top_turns(k: &[Option<f64>]) -> Vec<usize> {
    (1..k.len().saturating_sub(1))
        .filter(|&i| match neighbours(k, i) {
            Some((prev, cur, next)) => {
                (cur > prev && cur > next) || (prev == SATURATED && cur == SATURATED && next < SATURATED)
            }
            None => false,
        })
        .collect()
}

/// The newest qualifying turn is the bar before the last one
fn latest_is_previous_bar(qualifying: Option<usize>, len: usize) -> bool {
    len >= 2 && qualifying == Some(len - 2)
}

/// Bottom divergence on the bar before the last
///
/// Consecutive StochRSI bottoms qualify when the earlier one was oversold and
/// price made a lower close while StochRSI made a higher low.
pub fn is_bottom_divergence(candles: &[Candle], k: &[Option<f64>]) -> bool {
    if candles.len() != k.len() {
        return false;
    }
    let value = |i: usize| k[i].unwrap_or(f64::NAN);

    let latest = bottom_turns(k)
        .windows(2)
        .filter(|w| {
            let (prev, cur) = (w[0], w[1]);
            value(prev) < OVERSOLD && candles[cur].close < candles[prev].close && value(cur) > value(prev)
        })
        .map(|w| w[1])
        .last();

    latest_is_previous_bar(latest, candles.len())
}

/// Top divergence on the bar before the last
///
/// Consecutive StochRSI tops qualify when price made a higher high while
/// StochRSI made a lower one.
pub fn is_top_divergence(candles: &[Candle], k: &[Option<f64>]) -> bool {
    if candles.len() != k.len() {
        return false;
    }
    let value = |i: usize| k[i].unwrap_or(f64::NAN);

    let latest = top_turns(k)
        .windows(2)
        .filter(|w| {
            let (prev, cur) = (w[0], w[1]);
            candles[cur].high > candles[prev].high && value(cur) < value(prev)
        })
        .map(|w| w[1])
        .last();

    latest_is_previous_bar(latest, candles.len())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceAlert {
    pub symbol: String,
    pub interval: CandleInterval,
    pub divergence: Divergence,
    /// StochRSI on the latest bar
    pub stoch_rsi: Option<f64>,
    pub volatility: Option<VolatilitySnapshot>,
}

impl DivergenceAlert {
    pub fn message(&self) -> String {
        let stoch = self
            .stoch_rsi
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        let vol = self
            .volatility
            .map(|v| format!(", volatility {:.4}% ({})", v.current, v.sigma))
            .unwrap_or_default();
        format!(
            "!!! {}, {}, stochrsi {}, {}{}",
            self.symbol, self.interval, stoch, self.divergence, vol
        )
    }
}

/// Divergences on one series; `candles` ends with the in-progress bar
pub fn scan_candles(
    symbol: &str,
    interval: CandleInterval,
    candles: &[Candle],
    settings: &WatcherSettings,
) -> Vec<DivergenceAlert> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let stoch = calculate_stoch_rsi(&closes, settings.stoch_period, settings.smooth_period);
    let volatility = volatility_snapshot(&closes, VOLATILITY_WINDOW);
    let last = stoch.k.last().copied().flatten();

    let mut alerts = Vec::new();
    for (divergence, hit) in [
        (Divergence::Bottom, is_bottom_divergence(candles, &stoch.k)),
        (Divergence::Top, is_top_divergence(candles, &stoch.k)),
    ] {
        if hit {
            alerts.push(DivergenceAlert {
                symbol: symbol.to_string(),
                interval,
                divergence,
                stoch_rsi: last,
                volatility,
            });
        }
    }
    alerts
}

/// Periodic StochRSI divergence scan over `symbols × intervals`
///
/// Alerts go through whatever notifier it is given; callers wrap it in a
/// `ThrottledNotifier` to cap alert frequency.
pub struct StochRsiWatcher {
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
    settings: WatcherSettings,
    retry: RetryPolicy,
}

impl StochRsiWatcher {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        notifier: Arc<dyn Notifier>,
        settings: WatcherSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            exchange,
            notifier,
            settings,
            retry,
        }
    }

    pub async fn scan(&self, symbol: &str, interval: CandleInterval) -> Result<Vec<DivergenceAlert>> {
        let query = CandleQuery::recent(symbol, interval, self.settings.limit);
        let fetched = self
            .retry
            .run(&format!("fetch {} {}", symbol, interval), || self.exchange.fetch_candles(&query))
            .await?;
        let candles = merge_candles(&[], &fetched, usize::MAX);

        let alerts = scan_candles(symbol, interval, &candles, &self.settings);
        tracing::debug!("{} {}: {} bars, {} alert(s)", symbol, interval, candles.len(), alerts.len());
        Ok(alerts)
    }

    /// Scan every pair once and send an alert for each divergence found
    pub async fn scan_all(&self) -> Vec<DivergenceAlert> {
        let mut found = Vec::new();
        for symbol in &self.settings.symbols {
            for &interval in &self.settings.intervals {
                match self.scan(symbol, interval).await {
                    Ok(alerts) => found.extend(alerts),
                    Err(e) => tracing::warn!("⚠️  StochRSI scan {} {} failed: {}", symbol, interval, e),
                }
            }
        }

        for alert in &found {
            let message = alert.message();
            tracing::info!("📈 {}", message);
            self.notifier.notify(&message).await;
        }
        found
    }

    /// Scan now, then on every 15 minute boundary
    pub async fn run(self) {
        let every = CandleInterval::Minutes(15);
        tracing::info!(
            "👀 StochRSI watcher on {} symbol(s) × {} interval(s)",
            self.settings.symbols.len(),
            self.settings.intervals.len()
        );

        loop {
            self.scan_all().await;
            let run_time = next_run_time(Utc::now(), every, chrono::Duration::zero());
            sleep_until(run_time).await;
        }
    }
}
