use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{BreakoutLog, Trendline, TrendlineFilter, TrendlinePatch, TrendlineStatus, TrendlineStore};
use crate::api::{CandleQuery, Exchange, RetryPolicy};
use crate::config::MonitorSettings;
use crate::error::BotError;
use crate::execution::{fetch_history, retain_closed, CandleWindows};
use crate::models::time::format_gmt8;
use crate::notify::Notifier;
use crate::strategy::{detect_breakout, trendline_values, Breakout};
use crate::Result;

/// Result of checking one trendline against its window
#[derive(Debug, Clone, PartialEq)]
pub struct TrendlineCheck {
    pub trendline_id: Uuid,
    pub price: Option<f64>,
    pub trendline_value: Option<f64>,
    /// Any crossing on the last bar, whichever direction
    pub crossing: Option<Breakout>,
    /// The crossing matches the trendline's direction
    pub qualifies: bool,
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub active: usize,
    pub checked: usize,
    pub alerts: Vec<Uuid>,
    pub failures: usize,
}

/// Watches active trendlines and alerts once per breakout
///
/// Owns its own candle windows, separate from the trading cycle. The set of
/// active trendlines is re-read from the store on every tick.
pub struct TrendlineBreakoutMonitor {
    exchange: Arc<dyn Exchange>,
    store: Arc<dyn TrendlineStore>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    retry: RetryPolicy,
    windows: CandleWindows,
}

impl TrendlineBreakoutMonitor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn TrendlineStore>,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
        retry: RetryPolicy,
    ) -> Self {
        let windows = CandleWindows::new(settings.max_candles);
        Self {
            exchange,
            store,
            notifier,
            settings,
            retry,
            windows,
        }
    }

    pub fn windows(&self) -> &CandleWindows {
        &self.windows
    }

    /// Bring the cache in line with `symbols`: drop the unused, warm the new
    async fn sync_symbols(&mut self, symbols: &[String], now: DateTime<Utc>) {
        for dropped in self.windows.retain_only(symbols) {
            tracing::info!("🧹 No active trendlines on {}, dropping its cache", dropped);
        }

        for symbol in symbols {
            if !self.windows.contains(symbol) {
                self.warm(symbol, now).await;
            }
        }
    }

    async fn warm(&mut self, symbol: &str, now: DateTime<Utc>) {
        tracing::info!(
            "🆕 Warming {} {} bars for {}",
            self.settings.max_candles,
            self.settings.interval,
            symbol
        );
        match fetch_history(
            self.exchange.as_ref(),
            &self.retry,
            symbol,
            self.settings.interval,
            self.settings.max_candles,
            now,
        )
        .await
        {
            Ok(candles) => {
                self.windows.merge(symbol, &candles);
            }
            Err(e) => tracing::warn!("⚠️  History for {} failed, retrying next tick: {}", symbol, e),
        }
    }

    /// Merge the latest closed bars into every warmed window
    async fn refresh(&mut self, symbols: &[String], now: DateTime<Utc>) {
        let interval = self.settings.interval;
        for symbol in symbols {
            if !self.windows.contains(symbol) {
                continue;
            }
            let query = CandleQuery::recent(symbol.as_str(), interval, self.settings.refresh_limit);
            let result = self
                .retry
                .run(&format!("refresh {}", symbol), || self.exchange.fetch_candles(&query))
                .await;

            match result {
                Ok(mut candles) => {
                    retain_closed(&mut candles, interval, now);
                    let len = self.windows.merge(symbol, &candles);
                    tracing::debug!("{}: merged {} bars, window {}", symbol, candles.len(), len);
                }
                Err(e) => tracing::warn!("⚠️  Refresh of {} failed, window stale: {}", symbol, e),
            }
        }
    }

    /// Evaluate one trendline against its cached window
    pub fn check(&self, line: &Trendline) -> Result<TrendlineCheck> {
        // Rejects lines edited into an invalid shape outside the store API
        line.strategy()?;

        let candles = self.windows.get(&line.symbol);
        if candles.is_empty() {
            return Err(BotError::Data(format!("no candles cached for {}", line.symbol)));
        }

        let trend = trendline_values(candles, &line.start_point, &line.end_point)?;
        let crossing = detect_breakout(candles, &trend);
        Ok(TrendlineCheck {
            trendline_id: line.id,
            price: candles.last().map(|c| c.close),
            trendline_value: trend.last().copied().flatten(),
            crossing,
            qualifies: crossing.map_or(false, |b| b.direction == line.direction),
        })
    }

    /// Check one trendline on fresh data without alerting or pausing it
    pub async fn check_now(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<TrendlineCheck> {
        let line = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| BotError::Store(format!("trendline {} not found", id)))?;

        let symbols = vec![line.symbol.clone()];
        if self.windows.contains(&line.symbol) {
            self.refresh(&symbols, now).await;
        } else {
            self.warm(&line.symbol, now).await;
        }
        self.check(&line)
    }

    /// Pause the line, then notify and log the breakout
    ///
    /// Nothing is sent unless the pause was stored, so a line alerts at most
    /// once until someone re-activates it.
    async fn alert(&self, line: &Trendline, breakout: Breakout, now: DateTime<Utc>) -> Result<()> {
        self.store
            .update(line.id, TrendlinePatch::status(TrendlineStatus::Paused))
            .await?
            .ok_or_else(|| BotError::Store(format!("trendline {} vanished before pause", line.id)))?;

        let message = format!(
            "🚨 {} {} {}: close {:.4} vs trendline {:.4} ({})",
            line.symbol,
            line.name,
            breakout.direction,
            breakout.price,
            breakout.trendline_value,
            format_gmt8(&now)
        );
        tracing::info!("{}", message);
        self.notifier.notify(&message).await;

        self.store
            .record_breakout(BreakoutLog::new(
                line.id,
                breakout.direction,
                breakout.price,
                breakout.trendline_value,
            ))
            .await
    }

    /// One polling pass over the active trendlines
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickSummary> {
        let active = self.store.list(&TrendlineFilter::active()).await?;
        let symbols: Vec<String> = active
            .iter()
            .map(|l| l.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.sync_symbols(&symbols, now).await;
        if active.is_empty() {
            tracing::debug!("No active trendlines");
            return Ok(TickSummary::default());
        }
        self.refresh(&symbols, now).await;

        let mut summary = TickSummary {
            active: active.len(),
            ..TickSummary::default()
        };

        for line in &active {
            if !self.windows.contains(&line.symbol) {
                continue;
            }
            summary.checked += 1;

            let check = match self.check(line) {
                Ok(check) => check,
                Err(e) => {
                    tracing::warn!("⚠️  Trendline {} ({}) check failed: {}", line.name, line.id, e);
                    summary.failures += 1;
                    continue;
                }
            };

            let breakout = match check.crossing {
                Some(b) if check.qualifies => b,
                _ => continue,
            };

            match self.alert(line, breakout, now).await {
                Ok(()) => summary.alerts.push(line.id),
                Err(e) => {
                    tracing::error!("❌ Breakout on trendline {} not handled: {}", line.id, e);
                    summary.failures += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Poll every `check_interval_secs` until the task is dropped
    pub async fn run(mut self) {
        let period = std::time::Duration::from_secs(self.settings.check_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            "👀 Trendline monitor started ({} bars, checking every {:?})",
            self.settings.interval,
            period
        );

        loop {
            interval.tick().await;
            match self.tick(Utc::now()).await {
                Ok(summary) if !summary.alerts.is_empty() => {
                    tracing::info!("📣 {} trendline alert(s) this tick", summary.alerts.len());
                }
                Ok(_) => {}
                Err(e) => tracing::error!("❌ Monitor tick failed: {}", e),
            }
        }
    }

    /// Cached window sizes per symbol
    pub fn cache_status(&self) -> HashMap<String, usize> {
        self.windows
            .instruments()
            .into_iter()
            .map(|s| {
                let len = self.windows.len(&s);
                (s, len)
            })
            .collect()
    }
}
