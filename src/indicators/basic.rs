//! Basic moving averages and VWAP

use crate::data::Candle;

/// Simple moving average. Positions before the first full window are `None`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Exponential moving average with span smoothing (alpha = 2 / (period + 1)),
/// seeded from the first value. Defined from index 0 onward.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.is_empty() {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[0];
    out[0] = Some(prev);
    for i in 1..values.len() {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev);
    }
    out
}

/// Weighted moving average, linear weights favoring recent values.
pub fn wma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let weight_sum = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        out[i] = Some(weighted / weight_sum);
    }
    out
}

/// Volume-weighted average price, cumulative over the whole series.
pub fn vwap(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;
    for (i, c) in candles.iter().enumerate() {
        pv_sum += c.typical_price() * c.volume;
        vol_sum += c.volume;
        if vol_sum > 0.0 {
            out[i] = Some(pv_sum / vol_sum);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_lookback() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3);
        assert_eq!(result.len(), values.len());
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_eq!(result[2], Some(2.0));
        assert_eq!(result[3], Some(3.0));
        assert_eq!(result[4], Some(4.0));
    }

    #[test]
    fn test_sma_short_input() {
        assert!(sma(&[1.0, 2.0], 5).iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_ema_seeded_from_first() {
        let values = vec![10.0, 20.0];
        let result = ema(&values, 3);
        assert_eq!(result[0], Some(10.0));
        // alpha = 0.5: 0.5*20 + 0.5*10
        assert!((result[1].unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_wma_weights_recent() {
        let values = vec![1.0, 2.0, 3.0];
        let result = wma(&values, 3);
        // (1*1 + 2*2 + 3*3) / 6
        assert!((result[2].unwrap() - 14.0 / 6.0).abs() < 1e-9);
    }
}
