// Candle windows, scheduling and the live trading cycle
pub mod candle_window;
pub mod cycle;
pub mod history;
pub mod reconciler;
pub mod report;
pub mod schedule;

pub use candle_window::{merge_candles, CandleWindows};
pub use cycle::{ExecutionCycle, TradedInstrument};
pub use history::{fetch_history, retain_closed};
pub use reconciler::{
    contracts_for, execute_plan, reconcile, OrderKind, OrderOutcome, OrderPlan, OrderStatus,
    PlannedOrder,
};
pub use report::{CycleReport, InstrumentReport};
pub use schedule::{current_bar_start, next_run_time, sleep_until};
