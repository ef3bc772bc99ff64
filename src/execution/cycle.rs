use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::candle_window::CandleWindows;
use super::history::{fetch_history, retain_closed};
use super::reconciler::{execute_plan, reconcile};
use super::report::{CycleReport, InstrumentReport};
use super::schedule::{next_run_time, sleep_until};
use crate::api::{CandleQuery, Exchange, RetryPolicy};
use crate::config::{CycleSettings, InstrumentConfig};
use crate::error::BotError;
use crate::models::time::format_gmt8;
use crate::models::{Candle, Signal};
use crate::notify::Notifier;
use crate::strategy::{self, Strategy};
use crate::Result;

/// An instrument with its strategy resolved
pub struct TradedInstrument {
    pub config: InstrumentConfig,
    pub strategy: Box<dyn Strategy>,
}

impl TradedInstrument {
    pub fn from_config(config: InstrumentConfig) -> Result<Self> {
        let strategy = strategy::build(&config.strategy)?;
        Ok(Self { config, strategy })
    }

    pub fn inst_id(&self) -> &str {
        &self.config.instrument_id
    }
}

/// Recent bars fetched at a boundary
struct RecentBars {
    candles: Vec<Candle>,
    /// The bar that closed at the boundary is present
    complete: bool,
}

// ============================================================================
// Execution cycle
// ============================================================================

/// The live trading loop
///
/// Each session warms the windows, then per boundary runs
/// fetch → merge → evaluate → reconcile → execute → notify. A session that
/// fails is reported and restarted from scratch after a cool-down.
#[derive(Clone)]
pub struct ExecutionCycle {
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
    instruments: Arc<Vec<TradedInstrument>>,
    settings: CycleSettings,
    retry: RetryPolicy,
}

impl ExecutionCycle {
    /// Resolve every instrument's strategy; any invalid config fails here
    pub fn new(
        exchange: Arc<dyn Exchange>,
        notifier: Arc<dyn Notifier>,
        instruments: &[InstrumentConfig],
        settings: CycleSettings,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let instruments = instruments
            .iter()
            .cloned()
            .map(TradedInstrument::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            exchange,
            notifier,
            instruments: Arc::new(instruments),
            settings,
            retry,
        })
    }

    pub fn instruments(&self) -> &[TradedInstrument] {
        &self.instruments
    }

    /// Load `max_len` closed bars for every instrument
    ///
    /// Failure here fails the session; there is nothing to trade on yet.
    pub async fn warm_up(&self, now: DateTime<Utc>) -> Result<CandleWindows> {
        let mut windows = CandleWindows::new(self.settings.max_len);

        for inst in self.instruments.iter() {
            let candles = fetch_history(
                self.exchange.as_ref(),
                &self.retry,
                inst.inst_id(),
                self.settings.interval,
                self.settings.max_len,
                now,
            )
            .await?;

            if candles.len() < inst.strategy.min_candles_required() {
                tracing::warn!(
                    instrument = %inst.inst_id(),
                    "⚠️  Only {} bars available, {} needs {}",
                    candles.len(),
                    inst.strategy.name(),
                    inst.strategy.min_candles_required()
                );
            }
            windows.merge(inst.inst_id(), &candles);
        }

        Ok(windows)
    }

    /// Fetch the newest few closed bars, waiting briefly for the bar that
    /// just closed to be published
    async fn fetch_recent(&self, inst_id: &str, run_time: DateTime<Utc>) -> Result<RecentBars> {
        let interval = self.settings.interval;
        let expected = run_time - interval.duration();
        let query = CandleQuery::recent(inst_id, interval, self.settings.recent_limit)
            .with_timeout(self.settings.fetch_timeout());

        let mut attempt = 0;
        loop {
            let mut candles = self
                .retry
                .run(&format!("fetch {} recent candles", inst_id), || {
                    self.exchange.fetch_candles(&query)
                })
                .await?;
            retain_closed(&mut candles, interval, run_time);

            let complete = candles.iter().any(|c| c.begin_time == expected);
            if complete || attempt >= self.settings.closed_bar_retries {
                return Ok(RecentBars { candles, complete });
            }

            attempt += 1;
            tracing::debug!(
                instrument = %inst_id,
                "Bar {} not published yet (attempt {})",
                format_gmt8(&expected),
                attempt
            );
            tokio::time::sleep(self.settings.closed_bar_retry_delay()).await;
        }
    }

    /// One pass at `run_time`: fetch, merge, evaluate, reconcile, execute
    ///
    /// Instrument failures are recorded in the report and do not stop the
    /// others. Returns an error only when no instrument got fresh data.
    pub async fn run_once(&self, windows: &mut CandleWindows, run_time: DateTime<Utc>) -> Result<CycleReport> {
        tracing::info!("📊 Cycle at {} (GMT+8)", format_gmt8(&run_time));

        let mut reports: Vec<InstrumentReport> = Vec::with_capacity(self.instruments.len());
        let mut signals: Vec<Option<Signal>> = Vec::with_capacity(self.instruments.len());
        let mut fresh = 0;

        // Fetch + merge + evaluate
        for inst in self.instruments.iter() {
            let id = inst.inst_id();
            let mut report = InstrumentReport::new(id);

            let recent = match self.fetch_recent(id, run_time).await {
                Ok(recent) => recent,
                Err(e) => {
                    tracing::warn!(instrument = %id, "⚠️  Fetch failed, window stale: {}", e);
                    report.error = Some(format!("fetch failed: {}", e));
                    reports.push(report);
                    signals.push(None);
                    continue;
                }
            };

            let len = windows.merge(id, &recent.candles);
            if !recent.complete {
                tracing::warn!(
                    instrument = %id,
                    "⚠️  Closing bar missing after retries, window stale ({} bars)",
                    len
                );
                report.error = Some("latest bar not published, window stale".to_string());
                reports.push(report);
                signals.push(None);
                continue;
            }
            fresh += 1;

            match inst.strategy.evaluate(windows.get(id)) {
                Ok(signal) => {
                    tracing::info!(instrument = %id, "🎯 {} → {}", inst.strategy.name(), signal);
                    report.signal = Some(signal);
                    signals.push(Some(signal));
                }
                Err(e) => {
                    tracing::error!(instrument = %id, "❌ Evaluation failed: {}", e);
                    report.error = Some(format!("evaluation failed: {}", e));
                    signals.push(None);
                }
            }
            reports.push(report);
        }

        if fresh == 0 && !self.instruments.is_empty() {
            return Err(BotError::Network(
                "no fresh market data for any instrument".to_string(),
            ));
        }

        // Reconcile + execute
        let order_timeout = Some(self.settings.order_timeout());
        let mut submitted = false;

        for ((inst, signal), report) in self.instruments.iter().zip(&signals).zip(reports.iter_mut()) {
            let signal = match signal {
                Some(s) if *s != Signal::NoAction => *s,
                _ => continue,
            };
            let id = inst.inst_id();

            let position = match self
                .retry
                .run(&format!("fetch {} position", id), || {
                    self.exchange.fetch_position(id, order_timeout)
                })
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(instrument = %id, "❌ Position fetch failed: {}", e);
                    report.error = Some(format!("position fetch failed: {}", e));
                    continue;
                }
            };

            let plan = match reconcile(signal, &position, &inst.config) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::error!(instrument = %id, "❌ Reconciliation failed: {}", e);
                    report.error = Some(format!("reconciliation failed: {}", e));
                    continue;
                }
            };

            tracing::info!(instrument = %id, "📋 Plan: {}", plan.reason);
            report.plan = Some(plan.reason.clone());
            if plan.is_noop() {
                continue;
            }

            submitted = true;
            report.orders = execute_plan(self.exchange.as_ref(), &self.retry, &plan, order_timeout).await;
            for outcome in &report.orders {
                tracing::info!(
                    instrument = %id,
                    "💹 {} {} {}: {:?}",
                    outcome.order.kind,
                    outcome.order.side,
                    outcome.order.request.size,
                    outcome.status
                );
            }
        }

        // Re-read positions once orders have had time to settle
        if submitted {
            tokio::time::sleep(self.settings.settle_delay()).await;
        }
        for (inst, report) in self.instruments.iter().zip(reports.iter_mut()) {
            match self.exchange.fetch_position(inst.inst_id(), order_timeout).await {
                Ok(p) => report.position = Some(p),
                Err(e) => tracing::warn!(instrument = %inst.inst_id(), "⚠️  Position refresh failed: {}", e),
            }
        }

        Ok(CycleReport {
            run_time,
            instruments: reports,
        })
    }

    /// Warm up, then run one pass per interval boundary until something fails
    pub async fn run_session(&self) -> Result<()> {
        let mut windows = self.warm_up(Utc::now()).await?;
        let ahead = chrono::Duration::seconds(self.settings.ahead_secs);

        loop {
            let run_time = next_run_time(Utc::now(), self.settings.interval, ahead);
            sleep_until(run_time).await;

            let report = self.run_once(&mut windows, run_time).await?;
            tracing::info!(
                "✅ Cycle done, {} order(s) placed",
                report.orders_placed()
            );
            self.notifier.notify(&report.render()).await;
        }
    }

    /// Run sessions forever; every failure is reported and followed by a
    /// restart after `restart_delay`
    pub async fn run_forever(self) {
        tracing::info!(
            "🚀 Trading {} instrument(s) on {} bars",
            self.instruments.len(),
            self.settings.interval
        );

        loop {
            let session = self.clone();
            let reason = match tokio::spawn(async move { session.run_session().await }).await {
                Ok(Ok(())) => "session ended".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("cycle task aborted: {}", e),
            };

            let delay = self.settings.restart_delay();
            tracing::error!("💥 Cycle crashed: {}, restarting in {:?}", reason, delay);
            self.notifier
                .notify(&format!(
                    "System error, restarting in {}s. Reason: {}",
                    delay.as_secs(),
                    reason
                ))
                .await;
            tokio::time::sleep(delay).await;
        }
    }
}
