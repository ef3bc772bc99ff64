// User-drawn trendlines: record store and breakout monitor
pub mod monitor;
pub mod store;

pub use monitor::{TickSummary, TrendlineBreakoutMonitor, TrendlineCheck};
pub use store::{
    export_trendlines, import_trendlines, BreakoutLog, InMemoryTrendlineStore,
    JsonFileTrendlineStore, NewTrendline, Trendline, TrendlineFilter, TrendlinePatch,
    TrendlineStatus, TrendlineStore,
};
