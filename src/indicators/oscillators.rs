//! Oscillators: RSI, Stochastic, CCI, Williams %R

use crate::data::Candle;

/// Relative Strength Index using Wilder's smoothing.
///
/// The seed averages are the simple mean of the first `period` gains/losses;
/// every later value uses the Wilder recursion
/// `avg = (prev * (period - 1) + current) / period`. First defined value is
/// at index `period` (one price change per period plus the seed).
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let delta = values[i] - values[i - 1];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        let delta = values[i] - values[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Stochastic oscillator output.
#[derive(Debug, Clone)]
pub struct Stochastic {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Stochastic oscillator: raw %K over `k_period`, smoothed by `smooth_k`,
/// %D as an SMA of the smoothed %K.
pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize, smooth_k: usize) -> Stochastic {
    let len = candles.len();
    let mut raw_k = vec![None; len];
    if k_period == 0 || len < k_period {
        return Stochastic {
            k: raw_k.clone(),
            d: raw_k,
        };
    }

    for i in (k_period - 1)..len {
        let window = &candles[i + 1 - k_period..=i];
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        if range > 0.0 {
            raw_k[i] = Some(100.0 * (candles[i].close - lowest) / range);
        } else {
            raw_k[i] = Some(50.0);
        }
    }

    let k = if smooth_k > 1 {
        smooth_optional(&raw_k, smooth_k)
    } else {
        raw_k
    };
    let d = smooth_optional(&k, d_period);
    Stochastic { k, d }
}

/// Commodity Channel Index over the typical price.
pub fn cci(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period {
        return out;
    }
    let tp: Vec<f64> = candles.iter().map(|c| c.typical_price()).collect();
    for i in (period - 1)..candles.len() {
        let window = &tp[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let mad = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
        if mad > 0.0 {
            out[i] = Some((tp[i] - mean) / (0.015 * mad));
        } else {
            out[i] = Some(0.0);
        }
    }
    out
}

/// Williams %R, bounded in [-100, 0].
pub fn williams_r(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period {
        return out;
    }
    for i in (period - 1)..candles.len() {
        let window = &candles[i + 1 - period..=i];
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        if range > 0.0 {
            out[i] = Some(-100.0 * (highest - candles[i].close) / range);
        } else {
            out[i] = Some(-50.0);
        }
    }
    out
}

/// SMA over an already-optional series, keeping alignment.
fn smooth_optional(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in 0..values.len() {
        if i + 1 < period {
            continue;
        }
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_some()) {
            let sum: f64 = window.iter().map(|v| v.unwrap()).sum();
            out[i] = Some(sum / period as f64);
        }
    }
    out
}
