//! Volume indicators: OBV, volume ratio, MFI

use crate::data::Candle;
use crate::indicators::basic::sma;

/// On-Balance Volume. Starts at 0 and adds/subtracts each candle's volume
/// according to the close-to-close direction.
pub fn obv(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if candles.is_empty() {
        return out;
    }
    let mut total = 0.0;
    out[0] = Some(total);
    for i in 1..candles.len() {
        if candles[i].close > candles[i - 1].close {
            total += candles[i].volume;
        } else if candles[i].close < candles[i - 1].close {
            total -= candles[i].volume;
        }
        out[i] = Some(total);
    }
    out
}

/// Current volume relative to its SMA over `period` candles. Values above 1.0
/// mark above-average activity.
pub fn volume_ratio(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let avg = sma(&volumes, period);
    volumes
        .iter()
        .zip(avg.iter())
        .map(|(v, a)| match a {
            Some(a) if *a > 0.0 => Some(v / a),
            _ => None,
        })
        .collect()
}

/// Money Flow Index: a volume-weighted RSI analogue over the typical price,
/// bounded in [0, 100].
pub fn mfi(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let len = candles.len();
    let mut out = vec![None; len];
    if period == 0 || len <= period {
        return out;
    }

    let tp: Vec<f64> = candles.iter().map(|c| c.typical_price()).collect();
    let mut positive = Vec::with_capacity(len - 1);
    let mut negative = Vec::with_capacity(len - 1);
    for i in 1..len {
        let flow = tp[i] * candles[i].volume;
        if tp[i] > tp[i - 1] {
            positive.push(flow);
            negative.push(0.0);
        } else if tp[i] < tp[i - 1] {
            positive.push(0.0);
            negative.push(flow);
        } else {
            positive.push(0.0);
            negative.push(0.0);
        }
    }

    for i in period..len {
        let window = i - period..i; // indices into the flow arrays
        let pos: f64 = positive[window.clone()].iter().sum();
        let neg: f64 = negative[window].iter().sum();
        out[i] = Some(if neg == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + pos / neg)
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64, volume: f64) -> Candle {
        Candle::new(Utc::now(), close, close + 0.5, close - 0.5, close, volume)
    }

    #[test]
    fn test_obv_accumulates_by_direction() {
        let candles = vec![
            candle(10.0, 100.0),
            candle(11.0, 200.0),
            candle(10.5, 150.0),
            candle(10.5, 300.0),
        ];
        let result = obv(&candles);
        assert_eq!(result[0], Some(0.0));
        assert_eq!(result[1], Some(200.0));
        assert_eq!(result[2], Some(50.0));
        // flat close leaves OBV unchanged
        assert_eq!(result[3], Some(50.0));
    }

    #[test]
    fn test_volume_ratio_spike() {
        let mut candles: Vec<Candle> = (0..10).map(|_| candle(10.0, 100.0)).collect();
        candles.push(candle(10.0, 300.0));
        let result = volume_ratio(&candles, 10);
        // 300 against an average dominated by 100s
        assert!(result.last().unwrap().unwrap() > 2.0);
    }

    #[test]
    fn test_mfi_all_up_is_100() {
        let candles: Vec<Candle> = (0..20).map(|i| candle(10.0 + i as f64, 100.0)).collect();
        let result = mfi(&candles, 14);
        assert!(result[..14].iter().all(|v| v.is_none()));
        assert!((result[14].unwrap() - 100.0).abs() < 1e-9);
    }
}
