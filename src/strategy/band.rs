use super::Strategy;
use crate::error::BotError;
use crate::indicators::{calculate_sma, population_std};
use crate::models::{Candle, Signal};
use crate::Result;

/// Bollinger-style band reversal
///
/// Opens on a close breaking out of the band and exits when price crosses
/// back through the middle line:
/// 1. close crosses above upper band -> Long
/// 2. close crosses below lower band -> Short
/// 3. close crosses below the mean -> Flat
/// 4. close crosses above the mean -> Flat
///
/// Rules are checked in that order and the first match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct BandReversalStrategy {
    /// Lookback for mean and std-dev
    n: usize,
    /// Band width in std-devs
    m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    close: f64,
    mean: f64,
    upper: f64,
    lower: f64,
}

impl BandReversalStrategy {
    pub fn new(n: usize, m: f64) -> Result<Self> {
        if n < 2 {
            return Err(BotError::Config(format!("bollinger n must be >= 2, got {}", n)));
        }
        if !(m.is_finite() && m > 0.0) {
            return Err(BotError::Config(format!("bollinger m must be positive, got {}", m)));
        }
        Ok(Self { n, m })
    }

    /// Band at the bar ending at `end` (inclusive)
    fn band_at(&self, closes: &[f64], end: usize) -> Option<Band> {
        let window = &closes[end + 1 - self.n..=end];
        let mean = calculate_sma(window, self.n)?;
        let std = population_std(window)?;
        Some(Band {
            close: closes[end],
            mean,
            upper: mean + self.m * std,
            lower: mean - self.m * std,
        })
    }
}

impl Strategy for BandReversalStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<Signal> {
        // Warm-up, not an error
        if candles.len() < self.min_candles_required() {
            return Ok(Signal::NoAction);
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let t = closes.len() - 1;
        let (now, prev) = match (self.band_at(&closes, t), self.band_at(&closes, t - 1)) {
            (Some(now), Some(prev)) => (now, prev),
            _ => return Ok(Signal::NoAction),
        };

        let rules = [
            (now.close > now.upper && prev.close <= prev.upper, Signal::Long),
            (now.close < now.lower && prev.close >= prev.lower, Signal::Short),
            (now.close < now.mean && prev.close >= prev.mean, Signal::Flat),
            (now.close > now.mean && prev.close <= prev.mean, Signal::Flat),
        ];

        let matched: Vec<Signal> = rules
            .iter()
            .filter(|(hit, _)| *hit)
            .map(|(_, signal)| *signal)
            .collect();

        if matched.len() > 1 {
            tracing::warn!(
                "⚠️  Band rules overlap on {}: {:?}, taking {}",
                candles[t].begin_time,
                matched,
                matched[0]
            );
        }

        Ok(matched.first().copied().unwrap_or(Signal::NoAction))
    }

    fn name(&self) -> &str {
        "BandReversalStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.n + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                begin_time: start + Duration::minutes(15 * i as i64),
                open: close,
                high: close * 1.001,
                low: close * 0.999,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data_is_no_action() {
        let strategy = BandReversalStrategy::new(5, 2.0).unwrap();
        let candles = create_test_candles(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::NoAction);
    }

    #[test]
    fn test_upper_breakout_goes_long() {
        let strategy = BandReversalStrategy::new(5, 1.0).unwrap();
        let candles = create_test_candles(&[100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 110.0]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Long);
    }

    #[test]
    fn test_lower_breakout_goes_short() {
        let strategy = BandReversalStrategy::new(5, 1.0).unwrap();
        let candles = create_test_candles(&[100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 90.0]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Short);
    }

    #[test]
    fn test_mean_cross_down_is_flat() {
        // Stays inside the band but drops through the mean
        let strategy = BandReversalStrategy::new(4, 3.0).unwrap();
        let candles = create_test_candles(&[100.0, 102.0, 101.0, 103.0, 102.0, 101.0]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Flat);
    }

    #[test]
    fn test_mean_cross_up_is_flat() {
        let strategy = BandReversalStrategy::new(4, 3.0).unwrap();
        let candles = create_test_candles(&[103.0, 101.0, 102.0, 100.0, 101.0, 102.0]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Flat);
    }

    #[test]
    fn test_quiet_market_no_action() {
        let strategy = BandReversalStrategy::new(5, 2.0).unwrap();
        let candles = create_test_candles(&[100.0; 12]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::NoAction);
    }

    #[test]
    fn test_breakout_beats_mean_cross() {
        // Previous close below the mean, current close above the upper band:
        // both rule 1 and rule 4 hold; rule 1 wins
        let strategy = BandReversalStrategy::new(5, 1.0).unwrap();
        let candles = create_test_candles(&[101.0, 100.0, 101.0, 100.0, 101.0, 99.0, 110.0]);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Long);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let strategy = BandReversalStrategy::new(5, 1.5).unwrap();
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
        let candles = create_test_candles(&closes);
        let first = strategy.evaluate(&candles).unwrap();
        for _ in 0..5 {
            assert_eq!(strategy.evaluate(&candles).unwrap(), first);
        }
    }
}
