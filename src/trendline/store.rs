use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::BotError;
use crate::models::{AnchorPoint, Direction};
use crate::strategy::TrendlineStrategy;
use crate::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrendlineStatus {
    Active,
    Paused,
    Deleted,
}

impl std::fmt::Display for TrendlineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendlineStatus::Active => write!(f, "active"),
            TrendlineStatus::Paused => write!(f, "paused"),
            TrendlineStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// User-defined two-point trendline watched by the monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trendline {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub start_point: AnchorPoint,
    pub end_point: AnchorPoint,
    pub direction: Direction,
    pub status: TrendlineStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trendline {
    pub fn strategy(&self) -> Result<TrendlineStrategy> {
        TrendlineStrategy::new(self.start_point, self.end_point, self.direction)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTrendline {
    pub name: String,
    pub symbol: String,
    pub start_point: AnchorPoint,
    pub end_point: AnchorPoint,
    pub direction: Direction,
}

/// Fields to change; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendlinePatch {
    pub name: Option<String>,
    pub start_point: Option<AnchorPoint>,
    pub end_point: Option<AnchorPoint>,
    pub direction: Option<Direction>,
    pub status: Option<TrendlineStatus>,
}

impl TrendlinePatch {
    pub fn status(status: TrendlineStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendlineFilter {
    /// Exact status; `None` means every status except deleted
    pub status: Option<TrendlineStatus>,
    pub symbol: Option<String>,
}

impl TrendlineFilter {
    pub fn active() -> Self {
        Self {
            status: Some(TrendlineStatus::Active),
            symbol: None,
        }
    }

    fn matches(&self, line: &Trendline) -> bool {
        let status_ok = match self.status {
            Some(status) => line.status == status,
            None => line.status != TrendlineStatus::Deleted,
        };
        status_ok && self.symbol.as_ref().map_or(true, |s| &line.symbol == s)
    }
}

/// One alert fired by the monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakoutLog {
    pub id: Uuid,
    pub trendline_id: Uuid,
    pub direction: Direction,
    pub price: f64,
    pub trendline_value: f64,
    pub detected_at: DateTime<Utc>,
}

impl BreakoutLog {
    pub fn new(trendline_id: Uuid, direction: Direction, price: f64, trendline_value: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            trendline_id,
            direction,
            price,
            trendline_value,
            detected_at: Utc::now(),
        }
    }
}

/// Flat trendline record store keyed by id
///
/// Last write wins; there is no locking across processes.
#[async_trait]
pub trait TrendlineStore: Send + Sync {
    async fn create(&self, new: NewTrendline) -> Result<Trendline>;

    /// Deleted records are not returned
    async fn get(&self, id: Uuid) -> Result<Option<Trendline>>;

    async fn list(&self, filter: &TrendlineFilter) -> Result<Vec<Trendline>>;

    /// Apply `patch`, bump `updated_at`; `None` if the id is unknown
    async fn update(&self, id: Uuid, patch: TrendlinePatch) -> Result<Option<Trendline>>;

    /// Soft delete; returns false if the id is unknown
    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn record_breakout(&self, log: BreakoutLog) -> Result<()>;

    /// Newest first, optionally for one trendline
    async fn breakout_logs(&self, trendline_id: Option<Uuid>, limit: usize) -> Result<Vec<BreakoutLog>>;
}

// ============================================================================
// Shared record logic
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    trendlines: Vec<Trendline>,
    #[serde(default)]
    breakout_logs: Vec<BreakoutLog>,
}

impl StoreData {
    fn create(&mut self, new: NewTrendline) -> Result<Trendline> {
        if new.symbol.trim().is_empty() {
            return Err(BotError::Config("trendline symbol must not be empty".to_string()));
        }
        // Same checks the strategy applies: ordered anchors, positive prices
        TrendlineStrategy::new(new.start_point, new.end_point, new.direction)?;

        let now = Utc::now();
        let line = Trendline {
            id: Uuid::new_v4(),
            name: new.name,
            symbol: new.symbol,
            start_point: new.start_point,
            end_point: new.end_point,
            direction: new.direction,
            status: TrendlineStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.trendlines.push(line.clone());
        Ok(line)
    }

    fn get(&self, id: Uuid) -> Option<Trendline> {
        self.trendlines
            .iter()
            .find(|l| l.id == id && l.status != TrendlineStatus::Deleted)
            .cloned()
    }

    fn list(&self, filter: &TrendlineFilter) -> Vec<Trendline> {
        self.trendlines
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect()
    }

    fn update(&mut self, id: Uuid, patch: TrendlinePatch) -> Result<Option<Trendline>> {
        let line = match self.trendlines.iter_mut().find(|l| l.id == id) {
            Some(line) => line,
            None => return Ok(None),
        };

        let start = patch.start_point.unwrap_or(line.start_point);
        let end = patch.end_point.unwrap_or(line.end_point);
        let direction = patch.direction.unwrap_or(line.direction);
        if patch.start_point.is_some() || patch.end_point.is_some() {
            TrendlineStrategy::new(start, end, direction)?;
        }

        if let Some(name) = patch.name {
            line.name = name;
        }
        line.start_point = start;
        line.end_point = end;
        line.direction = direction;
        if let Some(status) = patch.status {
            line.status = status;
        }
        line.updated_at = Utc::now();
        Ok(Some(line.clone()))
    }

    fn breakout_logs(&self, trendline_id: Option<Uuid>, limit: usize) -> Vec<BreakoutLog> {
        let mut logs: Vec<BreakoutLog> = self
            .breakout_logs
            .iter()
            .filter(|l| trendline_id.map_or(true, |id| l.trendline_id == id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        logs.truncate(limit);
        logs
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryTrendlineStore {
    data: Mutex<StoreData>,
}

impl InMemoryTrendlineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrendlineStore for InMemoryTrendlineStore {
    async fn create(&self, new: NewTrendline) -> Result<Trendline> {
        self.data.lock().await.create(new)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trendline>> {
        Ok(self.data.lock().await.get(id))
    }

    async fn list(&self, filter: &TrendlineFilter) -> Result<Vec<Trendline>> {
        Ok(self.data.lock().await.list(filter))
    }

    async fn update(&self, id: Uuid, patch: TrendlinePatch) -> Result<Option<Trendline>> {
        self.data.lock().await.update(id, patch)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let updated = self
            .data
            .lock()
            .await
            .update(id, TrendlinePatch::status(TrendlineStatus::Deleted))?;
        Ok(updated.is_some())
    }

    async fn record_breakout(&self, log: BreakoutLog) -> Result<()> {
        self.data.lock().await.breakout_logs.push(log);
        Ok(())
    }

    async fn breakout_logs(&self, trendline_id: Option<Uuid>, limit: usize) -> Result<Vec<BreakoutLog>> {
        Ok(self.data.lock().await.breakout_logs(trendline_id, limit))
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Trendlines and breakout logs in one JSON document
///
/// The file is re-read on every call so edits made by another process show
/// up on the monitor's next tick. Writes go to a sibling temp file that is
/// then renamed over the original.
#[derive(Debug)]
pub struct JsonFileTrendlineStore {
    path: PathBuf,
    // Serializes read-modify-write within this process
    write_lock: Mutex<()>,
}

impl JsonFileTrendlineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreData> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(StoreData::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                BotError::Store(format!("{} is not a valid store: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &StoreData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn modify<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T> + Send) -> Result<T>
    where
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        let out = f(&mut data)?;
        self.save(&data).await?;
        Ok(out)
    }
}

#[async_trait]
impl TrendlineStore for JsonFileTrendlineStore {
    async fn create(&self, new: NewTrendline) -> Result<Trendline> {
        let line = self.modify(|data| data.create(new)).await?;
        tracing::info!("📝 Created trendline {} ({}) on {}", line.name, line.id, line.symbol);
        Ok(line)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trendline>> {
        Ok(self.load().await?.get(id))
    }

    async fn list(&self, filter: &TrendlineFilter) -> Result<Vec<Trendline>> {
        Ok(self.load().await?.list(filter))
    }

    async fn update(&self, id: Uuid, patch: TrendlinePatch) -> Result<Option<Trendline>> {
        self.modify(|data| data.update(id, patch)).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let updated = self
            .modify(|data| data.update(id, TrendlinePatch::status(TrendlineStatus::Deleted)))
            .await?;
        Ok(updated.is_some())
    }

    async fn record_breakout(&self, log: BreakoutLog) -> Result<()> {
        self.modify(|data| {
            data.breakout_logs.push(log);
            Ok(())
        })
        .await
    }

    async fn breakout_logs(&self, trendline_id: Option<Uuid>, limit: usize) -> Result<Vec<BreakoutLog>> {
        Ok(self.load().await?.breakout_logs(trendline_id, limit))
    }
}

// ============================================================================
// Export / import
// ============================================================================

/// Write every non-deleted trendline to `path` as a JSON array
pub async fn export_trendlines(store: &dyn TrendlineStore, path: &Path) -> Result<usize> {
    let lines = store.list(&TrendlineFilter::default()).await?;
    tokio::fs::write(path, serde_json::to_vec_pretty(&lines)?).await?;
    Ok(lines.len())
}

/// Create the trendlines in a JSON array export whose ids are not already
/// present; imported lines start active with fresh ids
pub async fn import_trendlines(store: &dyn TrendlineStore, path: &Path) -> Result<usize> {
    let bytes = tokio::fs::read(path).await?;
    let lines: Vec<Trendline> = serde_json::from_slice(&bytes)?;

    let mut imported = 0;
    for line in lines {
        if store.get(line.id).await?.is_some() {
            continue;
        }
        store
            .create(NewTrendline {
                name: line.name,
                symbol: line.symbol,
                start_point: line.start_point,
                end_point: line.end_point,
                direction: line.direction,
            })
            .await?;
        imported += 1;
    }
    Ok(imported)
}
