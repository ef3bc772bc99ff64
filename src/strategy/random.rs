use rand::Rng;

use super::Strategy;
use crate::models::{Candle, Signal};
use crate::Result;

/// Uniform random signal, for dry runs against a demo account
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    fn pick(r: f64) -> Signal {
        if r <= 0.25 {
            Signal::Long
        } else if r <= 0.5 {
            Signal::Short
        } else if r <= 0.75 {
            Signal::Flat
        } else {
            Signal::NoAction
        }
    }
}

impl Strategy for RandomStrategy {
    fn evaluate(&self, _candles: &[Candle]) -> Result<Signal> {
        let r: f64 = rand::thread_rng().gen();
        Ok(Self::pick(r))
    }

    fn name(&self) -> &str {
        "RandomStrategy"
    }

    fn min_candles_required(&self) -> usize {
        0
    }
}

/// Never trades
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStrategy;

impl Strategy for NullStrategy {
    fn evaluate(&self, _candles: &[Candle]) -> Result<Signal> {
        Ok(Signal::NoAction)
    }

    fn name(&self) -> &str {
        "NullStrategy"
    }

    fn min_candles_required(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_quartiles() {
        assert_eq!(RandomStrategy::pick(0.1), Signal::Long);
        assert_eq!(RandomStrategy::pick(0.3), Signal::Short);
        assert_eq!(RandomStrategy::pick(0.6), Signal::Flat);
        assert_eq!(RandomStrategy::pick(0.9), Signal::NoAction);
    }

    #[test]
    fn test_random_always_valid() {
        let strategy = RandomStrategy;
        for _ in 0..50 {
            assert!(strategy.evaluate(&[]).is_ok());
        }
    }

    #[test]
    fn test_null_never_trades() {
        assert_eq!(NullStrategy.evaluate(&[]).unwrap(), Signal::NoAction);
    }
}
