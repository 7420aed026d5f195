//! Single and two-candle pattern detectors

use serde::{Deserialize, Serialize};

use crate::data::Candle;
use crate::price_action::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    PinBar,
    Engulfing,
    InsideBar,
    OutsideBar,
    Doji,
}

/// Strength tier derived from the pattern's own geometry or volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Moderate,
    Strong,
    VeryStrong,
}

/// A detected candlestick pattern at `index` in the scanned slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHit {
    pub pattern: PatternKind,
    pub direction: Direction,
    pub strength: Strength,
    pub confidence: f64,
    pub index: usize,
}

/// Pin bar: a wick at least `min_ratio` times the body, covering more than
/// 60% of the candle's range, with the opposite wick under half the body.
/// A wick five times the body upgrades the strength tier.
pub fn pin_bar(candle: &Candle, min_ratio: f64) -> Option<(Direction, Strength)> {
    let body = candle.body_size();
    let upper = candle.upper_wick();
    let lower = candle.lower_wick();
    let range = candle.range();
    if range == 0.0 {
        return None;
    }

    if lower > body * min_ratio && lower / range > 0.6 && upper < body * 0.5 {
        let strength = if body > 0.0 && lower / body >= 5.0 {
            Strength::VeryStrong
        } else {
            Strength::Strong
        };
        return Some((Direction::Bullish, strength));
    }
    if upper > body * min_ratio && upper / range > 0.6 && lower < body * 0.5 {
        let strength = if body > 0.0 && upper / body >= 5.0 {
            Strength::VeryStrong
        } else {
            Strength::Strong
        };
        return Some((Direction::Bearish, strength));
    }
    None
}

/// Engulfing: the second body fully covers the first and the colors flip.
/// Volume expansion above 1.5x upgrades the strength tier.
pub fn engulfing(first: &Candle, second: &Candle) -> Option<(Direction, Strength)> {
    let top1 = first.open.max(first.close);
    let bottom1 = first.open.min(first.close);
    let top2 = second.open.max(second.close);
    let bottom2 = second.open.min(second.close);

    let engulfs = bottom2 < bottom1 && top2 > top1;
    if !engulfs {
        return None;
    }

    let volume_expansion = if first.volume > 0.0 {
        second.volume / first.volume
    } else {
        1.0
    };
    let strength = if volume_expansion > 1.5 {
        Strength::Strong
    } else {
        Strength::Moderate
    };

    if first.is_bearish() && second.is_bullish() {
        Some((Direction::Bullish, strength))
    } else if first.is_bullish() && second.is_bearish() {
        Some((Direction::Bearish, strength))
    } else {
        None
    }
}

/// Inside bar: the second candle's range is contained by the first's.
pub fn inside_bar(mother: &Candle, inside: &Candle) -> bool {
    inside.high <= mother.high && inside.low >= mother.low
}

/// Outside bar: the second candle's range covers the first's on both sides.
/// Direction follows the outside candle's close.
pub fn outside_bar(first: &Candle, second: &Candle) -> Option<Direction> {
    if second.high > first.high && second.low < first.low {
        Some(if second.is_bullish() {
            Direction::Bullish
        } else {
            Direction::Bearish
        })
    } else {
        None
    }
}

/// Doji: body under `body_ratio` of the range.
pub fn doji(candle: &Candle, body_ratio: f64) -> bool {
    let range = candle.range();
    range > 0.0 && candle.body_size() / range < body_ratio
}

/// Run every detector against the most recent candle (pair detectors use the
/// one before it) and collect the hits.
pub fn detect_latest(candles: &[Candle]) -> Vec<PatternHit> {
    let mut hits = Vec::new();
    let Some(last) = candles.last() else {
        return hits;
    };
    let index = candles.len() - 1;

    if let Some((direction, strength)) = pin_bar(last, 2.0) {
        hits.push(PatternHit {
            pattern: PatternKind::PinBar,
            direction,
            strength,
            confidence: 0.85,
            index,
        });
    }
    if doji(last, 0.1) {
        hits.push(PatternHit {
            pattern: PatternKind::Doji,
            direction: Direction::Neutral,
            strength: Strength::Moderate,
            confidence: 0.65,
            index,
        });
    }

    if candles.len() >= 2 {
        let prev = &candles[index - 1];
        if let Some((direction, strength)) = engulfing(prev, last) {
            hits.push(PatternHit {
                pattern: PatternKind::Engulfing,
                direction,
                strength,
                confidence: 0.80,
                index,
            });
        }
        if inside_bar(prev, last) {
            hits.push(PatternHit {
                pattern: PatternKind::InsideBar,
                direction: Direction::Neutral,
                strength: Strength::Moderate,
                confidence: 0.70,
                index,
            });
        }
        if let Some(direction) = outside_bar(prev, last) {
            hits.push(PatternHit {
                pattern: PatternKind::OutsideBar,
                direction,
                strength: Strength::Strong,
                confidence: 0.75,
                index,
            });
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle::new(Utc::now(), open, high, low, close, volume)
    }

    #[test]
    fn test_bullish_pin_bar() {
        // long lower wick, tiny body near the top
        let c = candle(100.0, 100.6, 96.0, 100.5, 10.0);
        let (direction, strength) = pin_bar(&c, 2.0).unwrap();
        assert_eq!(direction, Direction::Bullish);
        assert_eq!(strength, Strength::VeryStrong);
    }

    #[test]
    fn test_bearish_pin_bar() {
        let c = candle(100.5, 105.0, 99.9, 100.0, 10.0);
        let (direction, _) = pin_bar(&c, 2.0).unwrap();
        assert_eq!(direction, Direction::Bearish);
    }

    #[test]
    fn test_full_body_candle_is_not_pin_bar() {
        let c = candle(100.0, 104.0, 100.0, 104.0, 10.0);
        assert!(pin_bar(&c, 2.0).is_none());
    }

    #[test]
    fn test_bullish_engulfing_volume_strength() {
        let first = candle(101.0, 101.5, 99.5, 100.0, 100.0);
        let second = candle(99.8, 102.0, 99.4, 101.5, 200.0);
        let (direction, strength) = engulfing(&first, &second).unwrap();
        assert_eq!(direction, Direction::Bullish);
        assert_eq!(strength, Strength::Strong);
    }

    #[test]
    fn test_engulfing_requires_color_flip() {
        let first = candle(100.0, 101.5, 99.5, 101.0, 100.0);
        let second = candle(99.0, 102.0, 98.5, 101.8, 100.0);
        assert!(engulfing(&first, &second).is_none());
    }

    #[test]
    fn test_inside_and_outside_bar() {
        let mother = candle(100.0, 105.0, 95.0, 102.0, 10.0);
        let small = candle(101.0, 103.0, 99.0, 100.0, 10.0);
        assert!(inside_bar(&mother, &small));
        assert_eq!(outside_bar(&small, &mother), Some(Direction::Bullish));
    }

    #[test]
    fn test_doji() {
        assert!(doji(&candle(100.0, 102.0, 98.0, 100.1, 10.0), 0.1));
        assert!(!doji(&candle(100.0, 102.0, 98.0, 101.5, 10.0), 0.1));
    }

    #[test]
    fn test_detect_latest_reports_index() {
        let candles = vec![
            candle(100.0, 101.0, 99.0, 100.5, 10.0),
            candle(100.0, 100.6, 96.0, 100.5, 10.0),
        ];
        let hits = detect_latest(&candles);
        assert!(hits.iter().any(|h| h.pattern == PatternKind::PinBar));
        assert!(hits.iter().all(|h| h.index == 1));
    }
}
