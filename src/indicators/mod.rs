// Technical indicators module
// Implements MA/std, RSI, StochRSI and returns volatility

pub mod moving_average;
pub mod rsi;
pub mod stoch_rsi;
pub mod volatility;

pub use moving_average::{
    calculate_sma, population_std, rolling_mean_opt, rolling_sample_std_opt, sample_std,
};
pub use rsi::{calculate_rsi, calculate_rsi_series};
pub use stoch_rsi::{calculate_stoch_rsi, StochRsi};
pub use volatility::{
    returns_volatility, rolling_volatility, sigma_level, volatility_snapshot, SigmaLevel,
    VolatilitySnapshot,
};
