use super::Strategy;
use crate::error::BotError;
use crate::models::time::format_gmt8;
use crate::models::{AnchorPoint, Candle, Direction, Signal};
use crate::Result;

/// A close crossing the trendline between the last two bars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakout {
    pub direction: Direction,
    /// Close of the latest bar
    pub price: f64,
    /// Trendline value at the latest bar
    pub trendline_value: f64,
}

/// Extend the line through two anchors to every bar from the start anchor on
///
/// Both anchors must match a bar's `begin_time` exactly. Bars before the
/// start anchor get `None`. The values at the anchors are the anchor prices
/// themselves, not a recomputation.
pub fn trendline_values(
    candles: &[Candle],
    start: &AnchorPoint,
    end: &AnchorPoint,
) -> Result<Vec<Option<f64>>> {
    let find = |anchor: &AnchorPoint, which: &str| {
        candles
            .iter()
            .position(|c| c.begin_time == anchor.time)
            .ok_or_else(|| {
                BotError::Data(format!(
                    "trendline {} anchor {} not in window ({} bars from {} to {})",
                    which,
                    format_gmt8(&anchor.time),
                    candles.len(),
                    candles.first().map(|c| format_gmt8(&c.begin_time)).unwrap_or_default(),
                    candles.last().map(|c| format_gmt8(&c.begin_time)).unwrap_or_default(),
                ))
            })
    };

    let start_idx = find(start, "start")?;
    let end_idx = find(end, "end")?;
    if end_idx <= start_idx {
        return Err(BotError::Config(format!(
            "trendline end {} must come after start {}",
            format_gmt8(&end.time),
            format_gmt8(&start.time)
        )));
    }

    let slope = (end.price - start.price) / (end_idx - start_idx) as f64;
    let mut values: Vec<Option<f64>> = (0..candles.len())
        .map(|i| {
            if i < start_idx {
                None
            } else {
                Some(start.price + slope * (i - start_idx) as f64)
            }
        })
        .collect();

    values[start_idx] = Some(start.price);
    values[end_idx] = Some(end.price);
    Ok(values)
}

/// Compare the last two closes against the line
///
/// No breakout is reported when either bar predates the start anchor.
pub fn detect_breakout(candles: &[Candle], trend: &[Option<f64>]) -> Option<Breakout> {
    if candles.len() < 2 || trend.len() != candles.len() {
        return None;
    }

    let t = candles.len() - 1;
    let (prev_trend, curr_trend) = (trend[t - 1]?, trend[t]?);
    let (prev_close, curr_close) = (candles[t - 1].close, candles[t].close);

    let direction = if prev_close < prev_trend && curr_close >= curr_trend {
        Direction::Up
    } else if prev_close > prev_trend && curr_close <= curr_trend {
        Direction::Down
    } else {
        return None;
    };

    Some(Breakout {
        direction,
        price: curr_close,
        trendline_value: curr_trend,
    })
}

/// Trade a breakout of a fixed two-point trendline
///
/// Only crossings in the configured direction produce a signal: an up-cross
/// with direction `1` is Long, a down-cross with direction `-1` is Short.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendlineStrategy {
    start: AnchorPoint,
    end: AnchorPoint,
    direction: Direction,
}

impl TrendlineStrategy {
    pub fn new(start: AnchorPoint, end: AnchorPoint, direction: Direction) -> Result<Self> {
        if start.time >= end.time {
            return Err(BotError::Config(format!(
                "trendline start {} must be before end {}",
                format_gmt8(&start.time),
                format_gmt8(&end.time)
            )));
        }
        if !(start.price > 0.0 && end.price > 0.0) {
            return Err(BotError::Config("trendline anchor prices must be positive".to_string()));
        }
        Ok(Self {
            start,
            end,
            direction,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Breakout in the configured direction, if the last bar made one
    pub fn qualifying_breakout(&self, candles: &[Candle]) -> Result<Option<Breakout>> {
        let trend = trendline_values(candles, &self.start, &self.end)?;
        Ok(detect_breakout(candles, &trend).filter(|b| b.direction == self.direction))
    }
}

impl Strategy for TrendlineStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<Signal> {
        let signal = match self.qualifying_breakout(candles)? {
            Some(Breakout {
                direction: Direction::Up,
                ..
            }) => Signal::Long,
            Some(Breakout {
                direction: Direction::Down,
                ..
            }) => Signal::Short,
            None => Signal::NoAction,
        };
        Ok(signal)
    }

    fn name(&self) -> &str {
        "TrendlineStrategy"
    }

    fn min_candles_required(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::parse_gmt8;
    use chrono::{DateTime, Duration, Utc};

    fn t(s: &str) -> DateTime<Utc> {
        parse_gmt8(s).unwrap()
    }

    /// 15m bars starting at `start`, one per close
    fn create_test_candles(start: &str, closes: &[f64]) -> Vec<Candle> {
        let begin = t(start);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                begin_time: begin + Duration::minutes(15 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10.0,
            })
            .collect()
    }

    fn anchor(time: &str, price: f64) -> AnchorPoint {
        AnchorPoint {
            time: t(time),
            price,
        }
    }

    #[test]
    fn test_values_pinned_at_anchors() {
        let candles = create_test_candles("2025-05-09 17:00:00", &[170.0; 500]);
        let start = anchor("2025-05-09 18:00:00", 174.25);
        let end = anchor("2025-05-14 06:00:00", 183.44);

        let values = trendline_values(&candles, &start, &end).unwrap();
        let start_idx = 4;
        let end_idx = candles.iter().position(|c| c.begin_time == end.time).unwrap();

        assert!(values[..start_idx].iter().all(|v| v.is_none()));
        assert_eq!(values[start_idx], Some(174.25));
        assert_eq!(values[end_idx], Some(183.44));
        // Extends to the right with the same slope
        let slope = (183.44 - 174.25) / (end_idx - start_idx) as f64;
        let after = values[end_idx + 1].unwrap();
        assert!((after - (183.44 + slope)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_anchor_is_data_error() {
        let candles = create_test_candles("2025-05-10 00:00:00", &[170.0; 50]);
        let start = anchor("2025-05-09 18:00:00", 174.25);
        let end = anchor("2025-05-10 06:00:00", 183.44);

        let err = trendline_values(&candles, &start, &end).unwrap_err();
        assert!(matches!(err, BotError::Data(_)));
    }

    #[test]
    fn test_unaligned_anchor_not_interpolated() {
        let candles = create_test_candles("2025-05-09 18:00:00", &[170.0; 50]);
        let start = anchor("2025-05-09 18:00:00", 174.25);
        let end = anchor("2025-05-09 20:07:00", 183.44);
        assert!(trendline_values(&candles, &start, &end).is_err());
    }

    #[test]
    fn test_new_rejects_reversed_anchors() {
        let start = anchor("2025-05-14 06:00:00", 183.44);
        let end = anchor("2025-05-09 18:00:00", 174.25);
        assert!(TrendlineStrategy::new(start, end, Direction::Up).is_err());
        assert!(TrendlineStrategy::new(end, anchor("2025-05-14 06:00:00", -1.0), Direction::Up).is_err());
    }

    #[test]
    fn test_up_breakout_at_end_anchor_goes_long() {
        // Flat line at 100 through both anchors; last bar closes through it
        let candles = create_test_candles("2025-05-09 18:00:00", &[95.0, 96.0, 97.0, 99.0, 100.5]);
        let start = anchor("2025-05-09 18:00:00", 100.0);
        let end = anchor("2025-05-09 19:00:00", 100.0);

        let up = TrendlineStrategy::new(start, end, Direction::Up).unwrap();
        assert_eq!(up.evaluate(&candles).unwrap(), Signal::Long);

        let down = TrendlineStrategy::new(start, end, Direction::Down).unwrap();
        assert_eq!(down.evaluate(&candles).unwrap(), Signal::NoAction);
    }

    #[test]
    fn test_down_breakout_goes_short() {
        let candles = create_test_candles("2025-05-09 18:00:00", &[105.0, 104.0, 103.0, 101.0, 99.0]);
        let start = anchor("2025-05-09 18:00:00", 100.0);
        let end = anchor("2025-05-09 18:30:00", 100.0);

        let strategy = TrendlineStrategy::new(start, end, Direction::Down).unwrap();
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Short);
    }

    #[test]
    fn test_close_touching_line_counts_as_cross() {
        let candles = create_test_candles("2025-05-09 18:00:00", &[90.0, 95.0, 100.0]);
        let start = anchor("2025-05-09 18:00:00", 100.0);
        let end = anchor("2025-05-09 18:15:00", 100.0);
        let strategy = TrendlineStrategy::new(start, end, Direction::Up).unwrap();
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Long);
    }

    #[test]
    fn test_no_breakout_before_start_anchor() {
        let candles = create_test_candles("2025-05-09 17:30:00", &[90.0, 101.0, 102.0]);
        // Line starts at index 1
        let trend = vec![None, Some(100.0), Some(100.0)];
        assert!(detect_breakout(&candles[..2], &trend[..2]).is_none());
        // Both last bars defined: 101 > 100 then 102 >= 100 is not a cross
        assert!(detect_breakout(&candles, &trend).is_none());
    }

    #[test]
    fn test_sloped_line_breakout_example() {
        // Rising line from 174.25 to 183.44; last bar at the end anchor closes 184.0
        let mut closes = vec![172.0; 420];
        closes.push(184.0);
        let candles = create_test_candles("2025-05-09 18:00:00", &closes);
        let start = anchor("2025-05-09 18:00:00", 174.25);
        let end_time = format_gmt8(&candles.last().unwrap().begin_time);
        let end = anchor(&end_time, 183.44);

        let strategy = TrendlineStrategy::new(start, end, Direction::Up).unwrap();
        let breakout = strategy.qualifying_breakout(&candles).unwrap().unwrap();
        assert_eq!(breakout.trendline_value, 183.44);
        assert_eq!(breakout.price, 184.0);
        assert_eq!(strategy.evaluate(&candles).unwrap(), Signal::Long);
    }
}
