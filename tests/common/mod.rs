#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use swapbot::api::{CandleQuery, Exchange};
use swapbot::models::{
    Candle, OrderRequest, OrderResult, OrderSide, PositionSide, PositionState,
};
use swapbot::notify::Notifier;
use swapbot::{BotError, Result};

/// In-process exchange: serves fixed candle series and keeps a net position
/// per instrument that orders move
#[derive(Default)]
pub struct SimExchange {
    pub candles: Mutex<HashMap<String, Vec<Candle>>>,
    pub positions: Mutex<HashMap<String, (PositionSide, Decimal)>>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub reject_orders: bool,
    /// Reject only orders that add exposure
    pub reject_opens: bool,
}

impl SimExchange {
    pub fn with_series(series: &[(&str, Vec<Candle>)]) -> Self {
        let exchange = Self::default();
        {
            let mut candles = exchange.candles.lock().unwrap();
            for (inst_id, bars) in series {
                candles.insert(inst_id.to_string(), bars.clone());
            }
        }
        exchange
    }

    pub fn set_position(&self, inst_id: &str, side: PositionSide, size: Decimal) {
        self.positions
            .lock()
            .unwrap()
            .insert(inst_id.to_string(), (side, size));
    }

    pub fn position(&self, inst_id: &str) -> (PositionSide, Decimal) {
        self.positions
            .lock()
            .unwrap()
            .get(inst_id)
            .copied()
            .unwrap_or((PositionSide::None, Decimal::ZERO))
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl Exchange for SimExchange {
    async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>> {
        let candles = self.candles.lock().unwrap();
        let series = candles
            .get(&query.inst_id)
            .ok_or_else(|| BotError::exchange("51001", "Instrument ID does not exist"))?;
        let eligible: Vec<Candle> = series
            .iter()
            .filter(|c| query.before.map_or(true, |b| c.begin_time < b))
            .cloned()
            .collect();
        let start = eligible.len().saturating_sub(query.limit);
        Ok(eligible[start..].to_vec())
    }

    async fn fetch_position(&self, inst_id: &str, _timeout: Option<Duration>) -> Result<PositionState> {
        let mark = {
            let candles = self.candles.lock().unwrap();
            candles
                .get(inst_id)
                .and_then(|s| s.last())
                .and_then(|c| Decimal::from_f64(c.close))
                .unwrap_or(Decimal::ONE)
        };
        let (side, size) = self.position(inst_id);

        Ok(PositionState {
            inst_id: inst_id.to_string(),
            account_balance: Decimal::from(1000),
            side,
            size,
            entry_price: None,
            unrealized_pnl_ratio: None,
            unrealized_pnl: None,
            mark_price: mark,
            max_leverage: Decimal::from(20),
            ct_val: Decimal::ONE,
            lot_sz: Decimal::new(1, 2),
            min_sz: Decimal::new(1, 2),
        })
    }

    async fn place_order(&self, order: &OrderRequest, _timeout: Option<Duration>) -> Result<OrderResult> {
        if self.reject_orders || (self.reject_opens && !order.reduce_only) {
            return Err(BotError::exchange("51008", "Insufficient margin"));
        }

        self.orders.lock().unwrap().push(order.clone());
        if order.reduce_only {
            self.set_position(&order.inst_id, PositionSide::None, Decimal::ZERO);
        } else {
            let side = match order.side {
                OrderSide::Buy => PositionSide::Long,
                OrderSide::Sell => PositionSide::Short,
            };
            self.set_position(&order.inst_id, side, order.size);
        }

        Ok(OrderResult {
            order_id: format!("{}", self.order_count()),
            client_order_id: None,
            inst_id: order.inst_id.clone(),
            side: order.side,
            size: order.size,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// 15 minute bars starting at `start`, one per close
pub fn create_test_candles(start: DateTime<Utc>, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            begin_time: start + chrono::Duration::minutes(15 * i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Alternating 100/101 closes, then `last`
pub fn quiet_then(n: usize, last: f64) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
    closes.push(last);
    closes
}
