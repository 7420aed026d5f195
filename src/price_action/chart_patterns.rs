//! Multi-swing chart patterns: double tops/bottoms, head & shoulders, triangles

use serde::{Deserialize, Serialize};

use crate::data::Candle;
use crate::price_action::structure::swing_points;
use crate::price_action::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartPatternKind {
    DoubleTop,
    DoubleBottom,
    HeadAndShouldersTop,
    HeadAndShouldersBottom,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
}

/// A detected chart pattern with its trade levels where the geometry
/// provides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPattern {
    pub kind: ChartPatternKind,
    pub direction: Direction,
    pub confidence: f64,
    /// Confirmation level for double tops/bottoms.
    pub neckline: Option<f64>,
    /// Measured-move target where the pattern defines one.
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
}

/// Double top or bottom with neckline confirmation.
///
/// Two swing extremes within `tolerance` of each other, a pullback of more
/// than 5% between them, and the last close through the neckline.
pub fn double_top_bottom(
    candles: &[Candle],
    swing_lookback: usize,
    tolerance: f64,
) -> Option<ChartPattern> {
    let last_close = candles.last()?.close;
    let (highs, lows) = swing_points(candles, swing_lookback);

    if highs.len() >= 2 {
        let (first, second) = (highs[highs.len() - 2], highs[highs.len() - 1]);
        if (first.price - second.price).abs() / first.price < tolerance {
            let between = &candles[first.index..=second.index];
            let neckline = between.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let pullback = (first.price - neckline) / first.price;
            if pullback > 0.05 && last_close < neckline {
                return Some(ChartPattern {
                    kind: ChartPatternKind::DoubleTop,
                    direction: Direction::Bearish,
                    confidence: 0.75,
                    neckline: Some(neckline),
                    target: Some(neckline - (first.price - neckline)),
                    stop_loss: Some(second.price),
                });
            }
        }
    }

    if lows.len() >= 2 {
        let (first, second) = (lows[lows.len() - 2], lows[lows.len() - 1]);
        if (first.price - second.price).abs() / first.price < tolerance {
            let between = &candles[first.index..=second.index];
            let neckline = between.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let rally = (neckline - first.price) / first.price;
            if rally > 0.05 && last_close > neckline {
                return Some(ChartPattern {
                    kind: ChartPatternKind::DoubleBottom,
                    direction: Direction::Bullish,
                    confidence: 0.75,
                    neckline: Some(neckline),
                    target: Some(neckline + (neckline - first.price)),
                    stop_loss: Some(second.price),
                });
            }
        }
    }

    None
}

/// Head and shoulders, top or bottom: three swings where the middle one is
/// the extreme and the shoulders match within 5%.
pub fn head_shoulders(candles: &[Candle], swing_lookback: usize) -> Option<ChartPattern> {
    let (highs, lows) = swing_points(candles, swing_lookback);

    if highs.len() >= 3 {
        let [left, head, right] = [
            highs[highs.len() - 3],
            highs[highs.len() - 2],
            highs[highs.len() - 1],
        ];
        if head.price > left.price
            && head.price > right.price
            && (left.price - right.price).abs() / left.price < 0.05
        {
            return Some(ChartPattern {
                kind: ChartPatternKind::HeadAndShouldersTop,
                direction: Direction::Bearish,
                confidence: 0.80,
                neckline: None,
                target: None,
                stop_loss: Some(head.price),
            });
        }
    }

    if lows.len() >= 3 {
        let [left, head, right] = [
            lows[lows.len() - 3],
            lows[lows.len() - 2],
            lows[lows.len() - 1],
        ];
        if head.price < left.price
            && head.price < right.price
            && (left.price - right.price).abs() / left.price < 0.05
        {
            return Some(ChartPattern {
                kind: ChartPatternKind::HeadAndShouldersBottom,
                direction: Direction::Bullish,
                confidence: 0.80,
                neckline: None,
                target: None,
                stop_loss: Some(head.price),
            });
        }
    }

    None
}

/// Triangle consolidation from the slopes of the recent swing highs and lows.
///
/// Slopes are least-squares fits normalized by the mean swing price, so the
/// flat/trending thresholds hold at any price scale.
pub fn triangle(candles: &[Candle], swing_lookback: usize) -> Option<ChartPattern> {
    let (highs, lows) = swing_points(candles, swing_lookback);
    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }

    let high_prices: Vec<f64> = highs.iter().rev().take(3).rev().map(|s| s.price).collect();
    let low_prices: Vec<f64> = lows.iter().rev().take(3).rev().map(|s| s.price).collect();

    let high_slope = normalized_slope(&high_prices)?;
    let low_slope = normalized_slope(&low_prices)?;

    // relative slope per swing: under 0.1% reads flat, over 1% trending
    if high_slope.abs() < 0.001 && low_slope > 0.01 {
        return Some(ChartPattern {
            kind: ChartPatternKind::AscendingTriangle,
            direction: Direction::Bullish,
            confidence: 0.75,
            neckline: None,
            target: None,
            stop_loss: None,
        });
    }
    if low_slope.abs() < 0.001 && high_slope < -0.01 {
        return Some(ChartPattern {
            kind: ChartPatternKind::DescendingTriangle,
            direction: Direction::Bearish,
            confidence: 0.75,
            neckline: None,
            target: None,
            stop_loss: None,
        });
    }
    if low_slope > 0.01 && high_slope < -0.01 {
        return Some(ChartPattern {
            kind: ChartPatternKind::SymmetricalTriangle,
            direction: Direction::Neutral,
            confidence: 0.65,
            neckline: None,
            target: None,
            stop_loss: None,
        });
    }

    None
}

/// Least-squares slope over evenly spaced points, divided by the mean value.
fn normalized_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if mean == 0.0 {
        return None;
    }
    let x_mean = (n as f64 - 1.0) / 2.0;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, v) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (v - mean);
        den += dx * dx;
    }
    Some(num / den / mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&c| Candle::new(Utc::now(), c, c + 0.5, c - 0.5, c, 100.0))
            .collect()
    }

    #[test]
    fn test_normalized_slope() {
        // values 100, 101, 102: slope 1 over mean 101
        let slope = normalized_slope(&[100.0, 101.0, 102.0]).unwrap();
        assert!((slope - 1.0 / 101.0).abs() < 1e-9);
        assert!(normalized_slope(&[100.0]).is_none());
    }

    #[test]
    fn test_double_top_detection() {
        // two peaks at ~120, a valley near 100 between them, close below neckline
        let mut closes = vec![100.0, 105.0, 112.0, 120.0, 112.0, 105.0, 100.0];
        closes.extend([105.0, 112.0, 119.5, 112.0, 105.0, 99.0, 97.0, 96.0]);
        let candles = candles_from_closes(&closes);
        let pattern = double_top_bottom(&candles, 2, 0.03).unwrap();
        assert_eq!(pattern.kind, ChartPatternKind::DoubleTop);
        assert_eq!(pattern.direction, Direction::Bearish);
        let neckline = pattern.neckline.unwrap();
        assert!(candles.last().unwrap().close < neckline);
        assert!(pattern.target.unwrap() < neckline);
    }

    #[test]
    fn test_double_bottom_detection() {
        let mut closes = vec![120.0, 115.0, 108.0, 100.0, 108.0, 115.0, 120.0];
        closes.extend([115.0, 108.0, 100.5, 108.0, 115.0, 121.0, 123.0, 124.0]);
        let candles = candles_from_closes(&closes);
        let pattern = double_top_bottom(&candles, 2, 0.03).unwrap();
        assert_eq!(pattern.kind, ChartPatternKind::DoubleBottom);
        assert_eq!(pattern.direction, Direction::Bullish);
    }

    #[test]
    fn test_no_pattern_on_trend() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        assert!(double_top_bottom(&candles, 2, 0.03).is_none());
        assert!(head_shoulders(&candles, 2).is_none());
    }

    #[test]
    fn test_head_and_shoulders_top() {
        // shoulders near 110, head at 120, valleys at 100
        let closes = vec![
            100.0, 104.0, 110.0, 104.0, 100.0, 106.0, 113.0, 120.0, 113.0, 106.0, 100.0, 104.0,
            110.5, 104.0, 100.0, 99.0, 98.0,
        ];
        let candles = candles_from_closes(&closes);
        let pattern = head_shoulders(&candles, 2).unwrap();
        assert_eq!(pattern.kind, ChartPatternKind::HeadAndShouldersTop);
        assert_eq!(pattern.stop_loss, Some(120.5));
    }
}
