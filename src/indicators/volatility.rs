//! Volatility indicators: Bollinger Bands, ATR, rolling stddev, Keltner

use crate::data::Candle;
use crate::indicators::basic::{ema, sma};

/// Bollinger Bands output.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    /// Band width as a percentage of the middle band.
    pub bandwidth: Vec<Option<f64>>,
}

/// Bollinger Bands: SMA middle band with `std_dev` sample standard deviations
/// on either side.
pub fn bollinger_bands(values: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = sma(values, period);
    let std = rolling_std(values, period);

    let len = values.len();
    let mut upper = vec![None; len];
    let mut lower = vec![None; len];
    let mut bandwidth = vec![None; len];

    for i in 0..len {
        if let (Some(m), Some(s)) = (middle[i], std[i]) {
            let u = m + s * std_dev;
            let l = m - s * std_dev;
            upper[i] = Some(u);
            lower[i] = Some(l);
            if m != 0.0 {
                bandwidth[i] = Some((u - l) / m * 100.0);
            }
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
        bandwidth,
    }
}

/// Rolling sample standard deviation (ddof = 1, as pandas computes it).
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period < 2 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period as f64 - 1.0);
        out[i] = Some(var.sqrt());
    }
    out
}

/// Average True Range with Wilder's smoothing.
///
/// TR for the first candle is its own range; the ATR seed at index
/// `period - 1` is the simple mean of the first `period` TRs.
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let len = candles.len();
    let mut out = vec![None; len];
    if period == 0 || len < period {
        return out;
    }

    let mut tr = Vec::with_capacity(len);
    tr.push(candles[0].high - candles[0].low);
    for i in 1..len {
        let range = (candles[i].high - candles[i].low)
            .max((candles[i].high - candles[i - 1].close).abs())
            .max((candles[i].low - candles[i - 1].close).abs());
        tr.push(range);
    }

    let mut value = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(value);
    for i in period..len {
        value = (value * (period as f64 - 1.0) + tr[i]) / period as f64;
        out[i] = Some(value);
    }
    out
}

/// Keltner Channels output.
#[derive(Debug, Clone)]
pub struct KeltnerChannels {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Keltner Channels: EMA middle line with ATR-scaled envelopes.
pub fn keltner_channels(
    candles: &[Candle],
    period: usize,
    atr_period: usize,
    multiplier: f64,
) -> KeltnerChannels {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let middle = ema(&closes, period);
    let atr_series = atr(candles, atr_period);

    let len = candles.len();
    let mut upper = vec![None; len];
    let mut lower = vec![None; len];
    for i in 0..len {
        if let (Some(m), Some(a)) = (middle[i], atr_series[i]) {
            upper[i] = Some(m + a * multiplier);
            lower[i] = Some(m - a * multiplier);
        }
    }

    KeltnerChannels {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_bollinger_reference_values() {
        // window [1..5]: mean 3, sample std sqrt(2.5)
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let bb = bollinger_bands(&values, 5, 2.0);
        let std = 2.5_f64.sqrt();
        assert!((bb.middle[4].unwrap() - 3.0).abs() < 1e-6);
        assert!((bb.upper[4].unwrap() - (3.0 + 2.0 * std)).abs() < 1e-6);
        assert!((bb.lower[4].unwrap() - (3.0 - 2.0 * std)).abs() < 1e-6);
        assert!(bb.upper[3].is_none());
    }

    #[test]
    fn test_atr_constant_range() {
        // every candle has range 2.0 and no gaps: ATR stays 2.0
        let candles: Vec<Candle> = (0..20)
            .map(|i| {
                let c = 100.0 + i as f64 * 0.0;
                Candle::new(Utc::now(), c, c + 1.0, c - 1.0, c, 10.0)
            })
            .collect();
        let result = atr(&candles, 14);
        assert!(result[12].is_none());
        assert!((result[13].unwrap() - 2.0).abs() < 1e-9);
        assert!((result[19].unwrap() - 2.0).abs() < 1e-9);
    }
}
