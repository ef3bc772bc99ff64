// Signal strategies
pub mod band;
pub mod random;
pub mod trendline;

pub use band::BandReversalStrategy;
pub use random::{NullStrategy, RandomStrategy};
pub use trendline::{detect_breakout, trendline_values, Breakout, TrendlineStrategy};

use crate::config::StrategyConfig;
use crate::models::{Candle, Signal};
use crate::Result;

/// Base trait for all signal strategies
///
/// Parameters are fixed at construction; `evaluate` is a pure function of the
/// window it is handed.
pub trait Strategy: Send + Sync {
    /// Decide on the latest closed bar of `candles` (ascending by time)
    fn evaluate(&self, candles: &[Candle]) -> Result<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}

/// Resolve a strategy from its config, once, at load time
pub fn build(config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    let strategy: Box<dyn Strategy> = match config {
        StrategyConfig::Bollinger { n, m } => Box::new(BandReversalStrategy::new(*n, *m)?),
        StrategyConfig::Trendline {
            start_point,
            end_point,
            direction,
        } => Box::new(TrendlineStrategy::new(*start_point, *end_point, *direction)?),
        StrategyConfig::Random => Box::new(RandomStrategy),
        StrategyConfig::None => Box::new(NullStrategy),
    };

    tracing::debug!("Resolved strategy {}", strategy.name());
    Ok(strategy)
}
