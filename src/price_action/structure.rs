//! Market structure: swing points, trend classification, structure breaks

use serde::{Deserialize, Serialize};

use crate::data::Candle;

/// A confirmed swing extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Ranging,
}

/// Swing highs and lows: a candle whose high (low) is the extreme of the
/// window `swing_lookback` candles on each side. The trailing `swing_lookback`
/// candles can never confirm a swing, so detection lags by that much.
pub fn swing_points(candles: &[Candle], swing_lookback: usize) -> (Vec<SwingPoint>, Vec<SwingPoint>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if swing_lookback == 0 || candles.len() < 2 * swing_lookback + 1 {
        return (highs, lows);
    }

    for i in swing_lookback..candles.len() - swing_lookback {
        let window = &candles[i - swing_lookback..=i + swing_lookback];
        let high = candles[i].high;
        let low = candles[i].low;
        if window.iter().all(|c| c.high <= high) {
            highs.push(SwingPoint {
                index: i,
                price: high,
            });
        }
        if window.iter().all(|c| c.low >= low) {
            lows.push(SwingPoint {
                index: i,
                price: low,
            });
        }
    }
    (highs, lows)
}

/// Classify the structure from the last two swing highs and lows.
///
/// Higher high plus higher low reads as an uptrend, lower high plus lower low
/// as a downtrend, anything mixed as ranging. Needs two of each; returns
/// `None` otherwise.
pub fn market_structure(candles: &[Candle], swing_lookback: usize) -> Option<Trend> {
    let (highs, lows) = swing_points(candles, swing_lookback);
    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }

    let hh = highs[highs.len() - 1].price > highs[highs.len() - 2].price;
    let hl = lows[lows.len() - 1].price > lows[lows.len() - 2].price;
    let lh = highs[highs.len() - 1].price < highs[highs.len() - 2].price;
    let ll = lows[lows.len() - 1].price < lows[lows.len() - 2].price;

    Some(if hh && hl {
        Trend::Uptrend
    } else if lh && ll {
        Trend::Downtrend
    } else {
        Trend::Ranging
    })
}

/// A break of the prevailing structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureBreak {
    /// Uptrend printed a lower low.
    UptrendBroken,
    /// Downtrend printed a higher high.
    DowntrendBroken,
}

/// Detect a structure break against the current classification.
pub fn structure_break(candles: &[Candle], swing_lookback: usize) -> Option<StructureBreak> {
    let trend = market_structure(candles, swing_lookback)?;
    let (highs, lows) = swing_points(candles, swing_lookback);

    match trend {
        Trend::Uptrend => {
            let last_two = &lows[lows.len() - 2..];
            if last_two[1].price < last_two[0].price {
                return Some(StructureBreak::UptrendBroken);
            }
        }
        Trend::Downtrend => {
            let last_two = &highs[highs.len() - 2..];
            if last_two[1].price > last_two[0].price {
                return Some(StructureBreak::DowntrendBroken);
            }
        }
        Trend::Ranging => {}
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&c| Candle::new(Utc::now(), c, c + 1.0, c - 1.0, c, 100.0))
            .collect()
    }

    /// Zig-zag around a drifting base: peaks and troughs every 6 candles.
    fn zigzag(base_step: f64, n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n)
            .map(|i| {
                let wave = ((i % 6) as f64 - 2.5).abs() * 4.0;
                100.0 + base_step * i as f64 + wave
            })
            .collect();
        candles_from_closes(&closes)
    }

    #[test]
    fn test_swing_points_need_full_window() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let (highs, lows) = swing_points(&candles, 3);
        assert!(highs.is_empty());
        assert!(lows.is_empty());
    }

    #[test]
    fn test_uptrend_classification() {
        let candles = zigzag(1.0, 40);
        assert_eq!(market_structure(&candles, 2), Some(Trend::Uptrend));
    }

    #[test]
    fn test_downtrend_classification() {
        let candles = zigzag(-1.0, 40);
        assert_eq!(market_structure(&candles, 2), Some(Trend::Downtrend));
    }

    #[test]
    fn test_uptrend_break_on_lower_low() {
        // rising zig-zag that collapses at the end
        let mut closes: Vec<f64> = (0..30)
            .map(|i| {
                let wave = ((i % 6) as f64 - 2.5).abs() * 4.0;
                100.0 + i as f64 + wave
            })
            .collect();
        closes.extend([120.0, 110.0, 95.0, 96.0, 97.0, 98.0, 99.0]);
        let candles = candles_from_closes(&closes);
        // swings confirm late; a broken uptrend reads either as the break or
        // as an already-flipped structure
        let result = structure_break(&candles, 2);
        let structure = market_structure(&candles, 2);
        assert!(
            result == Some(StructureBreak::UptrendBroken) || structure != Some(Trend::Uptrend)
        );
    }
}
