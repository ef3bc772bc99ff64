use super::moving_average::rolling_mean_opt;
use super::rsi::calculate_rsi_series;

/// StochRSI line and its signal line, aligned with the input prices
#[derive(Debug, Clone, PartialEq)]
pub struct StochRsi {
    /// Smoothed StochRSI (0-100), rounded to 2 dp
    pub k: Vec<Option<f64>>,
    /// SMA of `k`, rounded to 2 dp
    pub d: Vec<Option<f64>>,
}

/// Two decimals, halves to even
fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// Calculate StochRSI
///
/// # Arguments
/// * `closes` - close prices, oldest first
/// * `m` - RSI period, also the min/max lookback over RSI
/// * `p` - smoothing period for both lines
pub fn calculate_stoch_rsi(closes: &[f64], m: usize, p: usize) -> StochRsi {
    let rsi = calculate_rsi_series(closes, m);

    let raw: Vec<Option<f64>> = (0..rsi.len())
        .map(|i| {
            if m == 0 || i + 1 < m {
                return None;
            }
            let window = &rsi[i + 1 - m..=i];
            let mut llv = f64::INFINITY;
            let mut hhv = f64::NEG_INFINITY;
            for v in window {
                let v = (*v)?;
                llv = llv.min(v);
                hhv = hhv.max(v);
            }
            let current = rsi[i]?;
            // Flat RSI over the window has no defined position
            if hhv - llv == 0.0 {
                return None;
            }
            Some((current - llv) / (hhv - llv) * 100.0)
        })
        .collect();

    let k: Vec<Option<f64>> = rolling_mean_opt(&raw, p)
        .into_iter()
        .map(|v| v.map(round2))
        .collect();
    let d: Vec<Option<f64>> = rolling_mean_opt(&k, p)
        .into_iter()
        .map(|v| v.map(round2))
        .collect();

    StochRsi { k, d }
}
