//! Trend indicators: MACD, ADX, Parabolic SAR

use crate::data::Candle;
use crate::indicators::basic::ema;

/// MACD output: the MACD line, its signal line and the histogram.
#[derive(Debug, Clone)]
pub struct Macd {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Moving Average Convergence Divergence over closing prices.
pub fn macd(values: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> Macd {
    let fast = ema(values, fast_period);
    let slow = ema(values, slow_period);

    let macd_line: Vec<Option<f64>> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal line is an EMA of the MACD line; the line is dense from index 0
    // so we can run the EMA over raw values and re-wrap.
    let raw: Vec<f64> = macd_line.iter().map(|v| v.unwrap_or(0.0)).collect();
    let signal = ema(&raw, signal_period);

    let histogram: Vec<Option<f64>> = macd_line
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Macd {
        macd: macd_line,
        signal,
        histogram,
    }
}

/// ADX output: trend strength plus the directional indices.
#[derive(Debug, Clone)]
pub struct Adx {
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
}

/// Average Directional Index with Wilder's smoothing throughout.
///
/// +DI/-DI become available at index `period`, ADX at index `2 * period - 1`
/// (one smoothing pass over DX on top of the DI warmup).
pub fn adx(candles: &[Candle], period: usize) -> Adx {
    let len = candles.len();
    let empty = Adx {
        adx: vec![None; len],
        plus_di: vec![None; len],
        minus_di: vec![None; len],
    };
    if period == 0 || len <= period {
        return empty;
    }

    let mut tr = Vec::with_capacity(len - 1);
    let mut plus_dm = Vec::with_capacity(len - 1);
    let mut minus_dm = Vec::with_capacity(len - 1);
    for i in 1..len {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
        let range = (candles[i].high - candles[i].low)
            .max((candles[i].high - candles[i - 1].close).abs())
            .max((candles[i].low - candles[i - 1].close).abs());
        tr.push(range);
    }

    let mut plus_di = vec![None; len];
    let mut minus_di = vec![None; len];
    let mut adx_out = vec![None; len];

    // Wilder seed: plain sums over the first `period` entries.
    let mut tr_smooth: f64 = tr[..period].iter().sum();
    let mut plus_smooth: f64 = plus_dm[..period].iter().sum();
    let mut minus_smooth: f64 = minus_dm[..period].iter().sum();

    let mut dx_values: Vec<f64> = Vec::new();
    for i in period..len {
        if i > period {
            let j = i - 1; // index into the diff arrays
            tr_smooth = tr_smooth - tr_smooth / period as f64 + tr[j];
            plus_smooth = plus_smooth - plus_smooth / period as f64 + plus_dm[j];
            minus_smooth = minus_smooth - minus_smooth / period as f64 + minus_dm[j];
        }
        let (pdi, mdi) = if tr_smooth > 0.0 {
            (
                100.0 * plus_smooth / tr_smooth,
                100.0 * minus_smooth / tr_smooth,
            )
        } else {
            (0.0, 0.0)
        };
        plus_di[i] = Some(pdi);
        minus_di[i] = Some(mdi);

        let di_sum = pdi + mdi;
        let dx = if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        };
        dx_values.push(dx);

        if dx_values.len() == period {
            adx_out[i] = Some(dx_values.iter().sum::<f64>() / period as f64);
        } else if dx_values.len() > period {
            let prev = adx_out[i - 1].unwrap_or(0.0);
            adx_out[i] = Some((prev * (period as f64 - 1.0) + dx) / period as f64);
        }
    }

    Adx {
        adx: adx_out,
        plus_di,
        minus_di,
    }
}

/// Parabolic SAR with the classic acceleration-factor schedule.
pub fn parabolic_sar(candles: &[Candle], af_start: f64, af_increment: f64, af_max: f64) -> Vec<Option<f64>> {
    let len = candles.len();
    let mut out = vec![None; len];
    if len < 2 {
        return out;
    }

    let mut sar = candles[0].low;
    let mut uptrend = true;
    let mut af = af_start;
    let mut ep = candles[0].high;
    out[0] = Some(sar);

    for i in 1..len {
        sar += af * (ep - sar);

        if uptrend {
            if candles[i].low < sar {
                // reversal to downtrend
                uptrend = false;
                sar = ep;
                ep = candles[i].low;
                af = af_start;
            } else if candles[i].high > ep {
                ep = candles[i].high;
                af = (af + af_increment).min(af_max);
            }
        } else if candles[i].high > sar {
            // reversal to uptrend
            uptrend = true;
            sar = ep;
            ep = candles[i].high;
            af = af_start;
        } else if candles[i].low < ep {
            ep = candles[i].low;
            af = (af + af_increment).min(af_max);
        }

        out[i] = Some(sar);
    }
    out
}
