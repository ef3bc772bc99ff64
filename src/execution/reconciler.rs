use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::api::{Exchange, RetryPolicy};
use crate::config::InstrumentConfig;
use crate::error::BotError;
use crate::models::{OrderRequest, OrderResult, OrderSide, PositionSide, PositionState, Signal};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Open,
    Close,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Open => write!(f, "open"),
            OrderKind::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOrder {
    pub kind: OrderKind,
    /// Position side this order opens or closes
    pub side: PositionSide,
    pub request: OrderRequest,
}

/// Orders needed to move from the live position to the signalled one
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    /// Submitted in order; a close always precedes an open
    pub orders: Vec<PlannedOrder>,
    pub reason: String,
}

impl OrderPlan {
    fn noop(reason: impl Into<String>) -> Self {
        Self {
            orders: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.orders.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderStatus {
    Placed(OrderResult),
    Failed(String),
    /// Not submitted because an earlier order in the plan failed
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub order: PlannedOrder,
    pub status: OrderStatus,
}

impl OrderOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self.status, OrderStatus::Placed(_))
    }
}

/// Contracts affordable at the configured leverage, floored to the lot size
///
/// `balance × leverage / mark_price / ct_val`
pub fn contracts_for(position: &PositionState, leverage: Decimal) -> Result<Decimal> {
    if position.mark_price <= Decimal::ZERO || position.ct_val <= Decimal::ZERO {
        return Err(BotError::Data(format!(
            "{}: cannot size order (mark {}, ctVal {})",
            position.inst_id, position.mark_price, position.ct_val
        )));
    }

    let raw = position.account_balance * leverage / position.mark_price / position.ct_val;
    if position.lot_sz <= Decimal::ZERO {
        return Ok(raw.max(Decimal::ZERO));
    }

    let lots = (raw / position.lot_sz).round_dp_with_strategy(0, RoundingStrategy::ToZero);
    Ok((lots * position.lot_sz).max(Decimal::ZERO).normalize())
}

fn close_order(position: &PositionState, instrument: &InstrumentConfig) -> PlannedOrder {
    let side = match position.side {
        PositionSide::Short => OrderSide::Buy,
        _ => OrderSide::Sell,
    };
    PlannedOrder {
        kind: OrderKind::Close,
        side: position.side,
        request: OrderRequest {
            inst_id: instrument.instrument_id.clone(),
            side,
            size: position.size,
            mode: instrument.trade_mode,
            reduce_only: true,
        },
    }
}

fn open_order(
    target: PositionSide,
    position: &PositionState,
    instrument: &InstrumentConfig,
) -> Result<std::result::Result<PlannedOrder, String>> {
    if instrument.leverage > position.max_leverage {
        return Err(BotError::Config(format!(
            "{}: leverage {} exceeds exchange max {}",
            instrument.instrument_id, instrument.leverage, position.max_leverage
        )));
    }

    let size = contracts_for(position, instrument.leverage)?;
    if size < position.min_sz || size.is_zero() {
        return Ok(Err(format!(
            "size {} below minimum {} (balance {})",
            size, position.min_sz, position.account_balance
        )));
    }

    let side = match target {
        PositionSide::Short => OrderSide::Sell,
        _ => OrderSide::Buy,
    };
    Ok(Ok(PlannedOrder {
        kind: OrderKind::Open,
        side: target,
        request: OrderRequest {
            inst_id: instrument.instrument_id.clone(),
            side,
            size,
            mode: instrument.trade_mode,
            reduce_only: false,
        },
    }))
}

/// Decide the orders that converge the live position onto `signal`
///
/// | held  | Long        | Short        | Flat  | NoAction |
/// |-------|-------------|--------------|-------|----------|
/// | none  | open long   | open short   | -     | -        |
/// | long  | -           | close + open | close | -        |
/// | short | close + open| -            | close | -        |
pub fn reconcile(
    signal: Signal,
    position: &PositionState,
    instrument: &InstrumentConfig,
) -> Result<OrderPlan> {
    let held = if position.is_flat() {
        PositionSide::None
    } else {
        position.side
    };

    let target = match signal {
        Signal::NoAction => return Ok(OrderPlan::noop("no signal")),
        Signal::Long => PositionSide::Long,
        Signal::Short => PositionSide::Short,
        Signal::Flat => PositionSide::None,
    };

    if held == target {
        let reason = match held {
            PositionSide::None => "already flat".to_string(),
            side => format!("already {}", side),
        };
        return Ok(OrderPlan::noop(reason));
    }

    let mut orders = Vec::new();
    let mut notes = Vec::new();

    if held != PositionSide::None {
        orders.push(close_order(position, instrument));
        notes.push(format!("close {} {}", held, position.size));
    }

    if target != PositionSide::None {
        match open_order(target, position, instrument)? {
            Ok(order) => {
                notes.push(format!("open {} {}", target, order.request.size));
                orders.push(order);
            }
            Err(why) => notes.push(format!("skip open {}: {}", target, why)),
        }
    }

    Ok(OrderPlan {
        orders,
        reason: notes.join(", "),
    })
}

/// Submit a plan's orders one by one
///
/// A failed close stops the plan so a flip never doubles exposure. A failed
/// open is not retried within the cycle; the next cycle re-reads the position.
pub async fn execute_plan(
    exchange: &dyn Exchange,
    retry: &RetryPolicy,
    plan: &OrderPlan,
    timeout: Option<Duration>,
) -> Vec<OrderOutcome> {
    let mut outcomes = Vec::with_capacity(plan.orders.len());
    let mut blocked: Option<String> = None;

    for order in &plan.orders {
        if let Some(why) = &blocked {
            outcomes.push(OrderOutcome {
                order: order.clone(),
                status: OrderStatus::Skipped(why.clone()),
            });
            continue;
        }

        let label = format!("{} {} {}", order.kind, order.side, order.request.inst_id);
        let result = retry
            .run_order(&label, || exchange.place_order(&order.request, timeout))
            .await;

        let status = match result {
            Ok(ack) => OrderStatus::Placed(ack),
            Err(e) => {
                tracing::error!(
                    instrument = %order.request.inst_id,
                    "❌ {} failed: {}",
                    label,
                    e
                );
                if order.kind == OrderKind::Close {
                    blocked = Some(format!("close failed: {}", e));
                }
                OrderStatus::Failed(e.to_string())
            }
        };

        outcomes.push(OrderOutcome {
            order: order.clone(),
            status,
        });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::models::TradeMode;

    fn instrument(leverage: Decimal) -> InstrumentConfig {
        InstrumentConfig {
            instrument_id: "SOL-USDT-SWAP".to_string(),
            leverage,
            trade_mode: TradeMode::Cross,
            strategy: StrategyConfig::None,
        }
    }

    fn position(side: PositionSide, size: Decimal) -> PositionState {
        PositionState {
            inst_id: "SOL-USDT-SWAP".to_string(),
            account_balance: Decimal::from(100),
            side,
            size,
            entry_price: None,
            unrealized_pnl_ratio: None,
            unrealized_pnl: None,
            mark_price: Decimal::from(150),
            max_leverage: Decimal::from(50),
            ct_val: Decimal::ONE,
            lot_sz: Decimal::new(1, 2),
            min_sz: Decimal::new(1, 2),
        }
    }

    fn kinds(plan: &OrderPlan) -> Vec<(OrderKind, OrderSide)> {
        plan.orders
            .iter()
            .map(|o| (o.kind, o.request.side))
            .collect()
    }

    #[test]
    fn test_sizing_floors_to_lot() {
        // 100 * 1.2 / 150 / 1 = 0.8
        let size = contracts_for(&position(PositionSide::None, Decimal::ZERO), Decimal::new(12, 1)).unwrap();
        assert_eq!(size, Decimal::new(8, 1));

        let mut p = position(PositionSide::None, Decimal::ZERO);
        p.account_balance = Decimal::from(101);
        // 0.808 -> 0.80
        assert_eq!(contracts_for(&p, Decimal::new(12, 1)).unwrap(), Decimal::new(8, 1));
    }

    #[test]
    fn test_full_state_table() {
        let inst = instrument(Decimal::new(12, 1));
        let one = Decimal::ONE;
        use OrderKind::{Close, Open};
        use OrderSide::{Buy, Sell};

        let cases = vec![
            (PositionSide::None, Signal::Long, vec![(Open, Buy)]),
            (PositionSide::None, Signal::Short, vec![(Open, Sell)]),
            (PositionSide::None, Signal::Flat, vec![]),
            (PositionSide::Long, Signal::Long, vec![]),
            (PositionSide::Long, Signal::Short, vec![(Close, Sell), (Open, Sell)]),
            (PositionSide::Long, Signal::Flat, vec![(Close, Sell)]),
            (PositionSide::Short, Signal::Long, vec![(Close, Buy), (Open, Buy)]),
            (PositionSide::Short, Signal::Short, vec![]),
            (PositionSide::Short, Signal::Flat, vec![(Close, Buy)]),
        ];

        for (side, signal, expected) in cases {
            let size = if side == PositionSide::None { Decimal::ZERO } else { one };
            let plan = reconcile(signal, &position(side, size), &inst).unwrap();
            assert_eq!(kinds(&plan), expected, "{:?} + {:?}", side, signal);
        }
    }

    #[test]
    fn test_no_action_never_trades() {
        let inst = instrument(Decimal::new(12, 1));
        for side in [PositionSide::None, PositionSide::Long, PositionSide::Short] {
            let plan = reconcile(Signal::NoAction, &position(side, Decimal::ONE), &inst).unwrap();
            assert!(plan.is_noop());
        }
    }

    #[test]
    fn test_close_uses_full_size_reduce_only() {
        let inst = instrument(Decimal::new(12, 1));
        let plan = reconcile(Signal::Flat, &position(PositionSide::Long, Decimal::new(64, 2)), &inst).unwrap();
        let close = &plan.orders[0].request;
        assert_eq!(close.size, Decimal::new(64, 2));
        assert!(close.reduce_only);
    }

    #[test]
    fn test_leverage_above_max_is_error() {
        let inst = instrument(Decimal::from(100));
        let err = reconcile(Signal::Long, &position(PositionSide::None, Decimal::ZERO), &inst).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_tiny_balance_drops_open_keeps_close() {
        let inst = instrument(Decimal::new(12, 1));
        let mut p = position(PositionSide::Long, Decimal::ONE);
        p.account_balance = Decimal::new(1, 2);

        let plan = reconcile(Signal::Short, &p, &inst).unwrap();
        assert_eq!(kinds(&plan), vec![(OrderKind::Close, OrderSide::Sell)]);
        assert!(plan.reason.contains("skip open"));
    }
}
