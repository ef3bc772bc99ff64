// Auxiliary market watchers
pub mod stochrsi;

pub use stochrsi::{
    is_bottom_divergence, is_top_divergence, scan_candles, Divergence, DivergenceAlert,
    StochRsiWatcher,
};
