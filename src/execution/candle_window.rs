use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::models::Candle;

/// Merge a fresh batch into an existing window
///
/// Deduplicates by `begin_time` with the incoming bar winning, sorts
/// ascending and keeps the newest `max_len` bars. An empty batch returns the
/// existing window untouched.
pub fn merge_candles(existing: &[Candle], incoming: &[Candle], max_len: usize) -> Vec<Candle> {
    if incoming.is_empty() {
        return existing.to_vec();
    }

    let mut by_time: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
    for candle in existing.iter().chain(incoming.iter()) {
        by_time.insert(candle.begin_time, candle.clone());
    }

    let skip = by_time.len().saturating_sub(max_len);
    by_time.into_values().skip(skip).collect()
}

/// Per-instrument candle windows
///
/// Owned by exactly one loop; the trading cycle and the trendline monitor
/// each keep their own.
#[derive(Debug, Clone)]
pub struct CandleWindows {
    data: HashMap<String, Vec<Candle>>,
    max_len: usize,
}

impl CandleWindows {
    /// Create empty windows
    ///
    /// # Arguments
    /// * `max_len` - Maximum number of candles to keep per instrument
    pub fn new(max_len: usize) -> Self {
        Self {
            data: HashMap::new(),
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Merge a batch into an instrument's window, returning the new length
    pub fn merge(&mut self, inst_id: &str, incoming: &[Candle]) -> usize {
        let window = self.data.entry(inst_id.to_string()).or_default();
        if !incoming.is_empty() {
            *window = merge_candles(window, incoming, self.max_len);
        }
        window.len()
    }

    /// Get all candles for an instrument (empty if unknown)
    pub fn get(&self, inst_id: &str) -> &[Candle] {
        self.data.get(inst_id).map(|w| w.as_slice()).unwrap_or(&[])
    }

    pub fn last(&self, inst_id: &str) -> Option<&Candle> {
        self.get(inst_id).last()
    }

    pub fn contains(&self, inst_id: &str) -> bool {
        self.data.contains_key(inst_id)
    }

    pub fn len(&self, inst_id: &str) -> usize {
        self.get(inst_id).len()
    }

    /// Get all tracked instruments
    pub fn instruments(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Drop an instrument's window
    pub fn remove(&mut self, inst_id: &str) -> Option<Vec<Candle>> {
        self.data.remove(inst_id)
    }

    /// Keep only the listed instruments
    pub fn retain_only(&mut self, keep: &[String]) -> Vec<String> {
        let dropped: Vec<String> = self
            .data
            .keys()
            .filter(|k| !keep.contains(k))
            .cloned()
            .collect();
        for inst_id in &dropped {
            self.data.remove(inst_id);
        }
        dropped
    }
}
