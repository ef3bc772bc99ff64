use std::fmt;

use super::moving_average::{rolling_sample_std_opt, sample_std};

/// How far the current volatility sits from its own history
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SigmaLevel {
    Normal,
    One,
    Two,
    Three,
}

impl fmt::Display for SigmaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SigmaLevel::Normal => "normal",
            SigmaLevel::One => "1σ",
            SigmaLevel::Two => "2σ",
            SigmaLevel::Three => "3σ",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilitySnapshot {
    /// Latest rolling volatility, percent
    pub current: f64,
    pub historical_mean: f64,
    pub historical_std: f64,
    pub sigma: SigmaLevel,
}

/// Bar-over-bar percentage change, aligned with `closes`
///
/// The first bar and any bar after a zero close have no return.
pub fn pct_change(closes: &[f64]) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            if i == 0 || closes[i - 1] == 0.0 {
                None
            } else {
                Some(closes[i] / closes[i - 1] - 1.0)
            }
        })
        .collect()
}

/// Rolling sample std of returns, in percent, one entry per close
///
/// A window touching a missing return yields `None`.
pub fn rolling_volatility(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_sample_std_opt(&pct_change(closes), window)
        .into_iter()
        .map(|v| v.map(|std| std * 100.0))
        .collect()
}

/// Current returns volatility in percent
///
/// Falls back to the std of all returns when there are fewer than `window`.
pub fn returns_volatility(closes: &[f64], window: usize) -> f64 {
    let returns: Vec<f64> = pct_change(closes).into_iter().flatten().collect();
    if returns.is_empty() {
        return 0.0;
    }

    if returns.len() >= window {
        rolling_volatility(closes, window)
            .last()
            .copied()
            .flatten()
            .unwrap_or(0.0)
    } else {
        sample_std(&returns).map(|v| v * 100.0).unwrap_or(0.0)
    }
}

/// Classify by absolute z-score: >=3, >=2, >=1 sigma
pub fn sigma_level(current: f64, historical_mean: f64, historical_std: f64) -> SigmaLevel {
    if historical_std == 0.0 || !historical_std.is_finite() {
        return SigmaLevel::Normal;
    }

    let z = ((current - historical_mean) / historical_std).abs();
    if z >= 3.0 {
        SigmaLevel::Three
    } else if z >= 2.0 {
        SigmaLevel::Two
    } else if z >= 1.0 {
        SigmaLevel::One
    } else {
        SigmaLevel::Normal
    }
}

/// Latest volatility ranked against the whole rolling series
pub fn volatility_snapshot(closes: &[f64], window: usize) -> Option<VolatilitySnapshot> {
    let series: Vec<f64> = rolling_volatility(closes, window).into_iter().flatten().collect();
    let current = *series.last()?;
    let historical_mean = series.iter().sum::<f64>() / series.len() as f64;
    let historical_std = sample_std(&series).unwrap_or(0.0);

    Some(VolatilitySnapshot {
        current,
        historical_mean,
        historical_std,
        sigma: sigma_level(current, historical_mean, historical_std),
    })
}
