use chrono::{DateTime, Utc};

use super::reconciler::{OrderOutcome, OrderStatus};
use crate::models::time::format_gmt8;
use crate::models::{PositionSide, PositionState, Signal};

/// What happened to one instrument during a cycle
#[derive(Debug, Clone, Default)]
pub struct InstrumentReport {
    pub inst_id: String,
    /// `None` when the window was stale or evaluation failed
    pub signal: Option<Signal>,
    pub plan: Option<String>,
    pub orders: Vec<OrderOutcome>,
    /// Position re-read after orders settled
    pub position: Option<PositionState>,
    pub error: Option<String>,
}

impl InstrumentReport {
    pub fn new(inst_id: impl Into<String>) -> Self {
        Self {
            inst_id: inst_id.into(),
            ..Self::default()
        }
    }
}

/// Consolidated per-cycle report sent to the notifier
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub run_time: DateTime<Utc>,
    pub instruments: Vec<InstrumentReport>,
}

impl CycleReport {
    pub fn orders_placed(&self) -> usize {
        self.instruments
            .iter()
            .flat_map(|i| i.orders.iter())
            .filter(|o| o.is_placed())
            .count()
    }

    pub fn render(&self) -> String {
        let mut lines = vec![format!("Cycle {} (GMT+8)", format_gmt8(&self.run_time))];

        for inst in &self.instruments {
            lines.push(String::new());
            lines.push(format!("[{}] signal: {}", inst.inst_id, display_opt(&inst.signal)));

            if let Some(plan) = &inst.plan {
                lines.push(format!("  plan: {}", plan));
            }
            lines.extend(inst.orders.iter().map(order_line));
            if let Some(pos) = &inst.position {
                lines.push(position_line(pos));
            }
            if let Some(err) = &inst.error {
                lines.push(format!("  error: {}", err));
            }
        }

        lines.join("\n")
    }
}

fn order_line(outcome: &OrderOutcome) -> String {
    let req = &outcome.order.request;
    let status = match &outcome.status {
        OrderStatus::Placed(ack) => format!("placed #{}", ack.order_id),
        OrderStatus::Failed(e) => format!("FAILED {}", e),
        OrderStatus::Skipped(why) => format!("skipped ({})", why),
    };
    format!(
        "  {} {} {} {}: {}",
        outcome.order.kind,
        outcome.order.side,
        req.side.as_str(),
        req.size,
        status
    )
}

fn position_line(pos: &PositionState) -> String {
    match pos.side {
        PositionSide::None => format!(
            "  position: flat, balance {}, mark {}",
            pos.account_balance, pos.mark_price
        ),
        side => format!(
            "  position: {} {} @ {}, upl {} ({}), balance {}, mark {}",
            side,
            pos.size,
            display_opt(&pos.entry_price),
            display_opt(&pos.unrealized_pnl),
            display_opt(&pos.unrealized_pnl_ratio),
            pos.account_balance,
            pos.mark_price
        ),
    }
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::reconciler::{OrderKind, PlannedOrder};
    use crate::models::time::parse_gmt8;
    use crate::models::{OrderRequest, OrderResult, OrderSide, TradeMode};
    use rust_decimal::Decimal;

    #[test]
    fn test_render_lists_signals_orders_and_errors() {
        let request = OrderRequest {
            inst_id: "SOL-USDT-SWAP".to_string(),
            side: OrderSide::Buy,
            size: Decimal::new(64, 2),
            mode: TradeMode::Cross,
            reduce_only: false,
        };
        let report = CycleReport {
            run_time: parse_gmt8("2025-05-14 06:15:00").unwrap(),
            instruments: vec![
                InstrumentReport {
                    inst_id: "SOL-USDT-SWAP".to_string(),
                    signal: Some(Signal::Long),
                    plan: Some("open long 0.64".to_string()),
                    orders: vec![OrderOutcome {
                        order: PlannedOrder {
                            kind: OrderKind::Open,
                            side: PositionSide::Long,
                            request: request.clone(),
                        },
                        status: OrderStatus::Placed(OrderResult {
                            order_id: "123".to_string(),
                            client_order_id: None,
                            inst_id: request.inst_id.clone(),
                            side: OrderSide::Buy,
                            size: request.size,
                        }),
                    }],
                    position: None,
                    error: None,
                },
                InstrumentReport {
                    error: Some("window stale".to_string()),
                    ..InstrumentReport::new("BTC-USDT-SWAP")
                },
            ],
        };

        let text = report.render();
        assert!(text.starts_with("Cycle 2025-05-14 06:15:00"));
        assert!(text.contains("[SOL-USDT-SWAP] signal: LONG"));
        assert!(text.contains("placed #123"));
        assert!(text.contains("[BTC-USDT-SWAP] signal: -"));
        assert!(text.contains("error: window stale"));
        assert_eq!(report.orders_placed(), 1);
    }

    #[test]
    fn test_render_failed_flip_and_flat_position() {
        let close = OrderRequest {
            inst_id: "ETH-USDT-SWAP".to_string(),
            side: OrderSide::Sell,
            size: Decimal::from(2),
            mode: TradeMode::Cross,
            reduce_only: true,
        };
        let open = OrderRequest {
            reduce_only: false,
            size: Decimal::new(111, 2),
            ..close.clone()
        };
        let report = CycleReport {
            run_time: parse_gmt8("2025-05-14 06:15:00").unwrap(),
            instruments: vec![InstrumentReport {
                signal: Some(Signal::Short),
                orders: vec![
                    OrderOutcome {
                        order: PlannedOrder {
                            kind: OrderKind::Close,
                            side: PositionSide::Long,
                            request: close,
                        },
                        status: OrderStatus::Placed(OrderResult {
                            order_id: "7".to_string(),
                            client_order_id: None,
                            inst_id: "ETH-USDT-SWAP".to_string(),
                            side: OrderSide::Sell,
                            size: Decimal::from(2),
                        }),
                    },
                    OrderOutcome {
                        order: PlannedOrder {
                            kind: OrderKind::Open,
                            side: PositionSide::Short,
                            request: open,
                        },
                        status: OrderStatus::Failed("51008 Insufficient margin".to_string()),
                    },
                ],
                position: Some(PositionState {
                    inst_id: "ETH-USDT-SWAP".to_string(),
                    account_balance: Decimal::from(1000),
                    side: PositionSide::None,
                    size: Decimal::ZERO,
                    entry_price: None,
                    unrealized_pnl_ratio: None,
                    unrealized_pnl: None,
                    mark_price: Decimal::from(90),
                    max_leverage: Decimal::from(20),
                    ct_val: Decimal::ONE,
                    lot_sz: Decimal::new(1, 2),
                    min_sz: Decimal::new(1, 2),
                }),
                ..InstrumentReport::new("ETH-USDT-SWAP")
            }],
        };

        let lines: Vec<String> = report.render().lines().map(str::to_string).collect();
        assert_eq!(lines[2], "[ETH-USDT-SWAP] signal: SHORT");
        assert!(lines[3].ends_with("placed #7"));
        assert!(lines[4].contains("FAILED 51008 Insufficient margin"));
        assert_eq!(lines[5], "  position: flat, balance 1000, mark 90");
        assert_eq!(report.orders_placed(), 1);
    }
}
