/// Calculate Simple Moving Average (SMA) of the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Population standard deviation (ddof = 0)
pub fn population_std(values: &[f64]) -> Option<f64> {
    std_dev(values, 0)
}

/// Sample standard deviation (ddof = 1)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    std_dev(values, 1)
}

fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (n - ddof as f64)).sqrt())
}

/// Trailing-window mean over a series with gaps
///
/// A window containing any `None` yields `None`, so gaps propagate forward
/// for `window - 1` positions.
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_opt(values, window, |w| Some(w.iter().sum::<f64>() / w.len() as f64))
}

/// Trailing-window sample standard deviation over a series with gaps
pub fn rolling_sample_std_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_opt(values, window, sample_std)
}

fn rolling_opt<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = values[i + 1 - window..=i].iter().copied().collect::<Option<Vec<f64>>>()?;
            f(&slice)
        })
        .collect()
}
