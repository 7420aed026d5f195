//! Support and resistance level detection
//!
//! Levels are built from candle extremes: a price counts as a level when
//! enough earlier extremes sit inside a relative tolerance band around it.
//! Overlapping levels are merged keeping the stronger one, and results are
//! ranked by touch count with recency as the tie-breaker.

use serde::{Deserialize, Serialize};

use crate::data::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Support,
    Resistance,
}

/// A ranked horizontal level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub touches: usize,
    /// Index of the most recent candle that established the level.
    pub last_touch: usize,
    pub kind: LevelKind,
}

/// Support and resistance lists, each sorted strongest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SrLevels {
    pub support: Vec<Level>,
    pub resistance: Vec<Level>,
}

impl SrLevels {
    /// Strongest support below `price`.
    pub fn support_below(&self, price: f64) -> Option<&Level> {
        self.support.iter().find(|l| l.price < price)
    }

    /// Strongest resistance above `price`.
    pub fn resistance_above(&self, price: f64) -> Option<&Level> {
        self.resistance.iter().find(|l| l.price > price)
    }
}

/// Detect support and resistance over the series.
///
/// `tolerance` is the relative band (0.02 = 2%) inside which two extremes
/// count as touches of the same level; `min_touches` is the minimum number of
/// prior touches for a level to qualify.
pub fn support_resistance(
    candles: &[Candle],
    lookback: usize,
    tolerance: f64,
    min_touches: usize,
) -> SrLevels {
    if candles.len() <= lookback || lookback == 0 {
        return SrLevels::default();
    }

    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();

    let support = collect_levels(&lows, lookback, tolerance, min_touches, LevelKind::Support);
    let resistance = collect_levels(&highs, lookback, tolerance, min_touches, LevelKind::Resistance);

    SrLevels {
        support,
        resistance,
    }
}

fn collect_levels(
    extremes: &[f64],
    lookback: usize,
    tolerance: f64,
    min_touches: usize,
    kind: LevelKind,
) -> Vec<Level> {
    let mut levels = Vec::new();
    for i in lookback..extremes.len() {
        let price = extremes[i];
        if price <= 0.0 {
            continue;
        }
        let window_start = i.saturating_sub(lookback);
        let touches = extremes[window_start..i]
            .iter()
            .filter(|&&p| (p - price).abs() / price < tolerance)
            .count();
        if touches >= min_touches {
            levels.push(Level {
                price,
                touches,
                last_touch: i,
                kind,
            });
        }
    }

    let mut levels = deduplicate(levels, tolerance);
    levels.sort_by(|a, b| {
        b.touches
            .cmp(&a.touches)
            .then(b.last_touch.cmp(&a.last_touch))
    });
    levels
}

/// Merge levels whose prices fall inside the same tolerance band, keeping the
/// one with more touches (most recent on a tie).
fn deduplicate(mut levels: Vec<Level>, tolerance: f64) -> Vec<Level> {
    if levels.is_empty() {
        return levels;
    }
    levels.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

    let mut unique = Vec::new();
    let mut current = levels[0].clone();
    for level in levels.into_iter().skip(1) {
        if (level.price - current.price).abs() / current.price > tolerance {
            unique.push(current);
            current = level;
        } else if level.touches > current.touches
            || (level.touches == current.touches && level.last_touch > current.last_touch)
        {
            current = level;
        }
    }
    unique.push(current);
    unique
}
