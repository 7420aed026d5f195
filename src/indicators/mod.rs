//! Technical indicator library
//!
//! Pure series functions plus a name-based [`IndicatorManager`] for callers
//! that select indicators at runtime. Every series function returns a vector
//! aligned one-to-one with its input; positions inside the lookback window
//! are `None` rather than dropped.

pub mod basic;
pub mod oscillators;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use basic::{ema, sma, vwap, wma};
pub use oscillators::{cci, rsi, stochastic, williams_r, Stochastic};
pub use trend::{adx, macd, parabolic_sar, Adx, Macd};
pub use volatility::{atr, bollinger_bands, keltner_channels, rolling_std, BollingerBands, KeltnerChannels};
pub use volume::{mfi, obv, volume_ratio};

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::data::Candle;
use crate::error::{EngineError, Result};

/// Output of a computed indicator: either a single aligned series or a set of
/// named component series (MACD, Bollinger Bands and the like).
#[derive(Debug, Clone)]
pub enum IndicatorOutput {
    Series(Vec<Option<f64>>),
    Multi(HashMap<String, Vec<Option<f64>>>),
}

impl IndicatorOutput {
    /// The single series, or a named component of a multi-series output.
    pub fn series(&self, component: &str) -> Option<&Vec<Option<f64>>> {
        match self {
            IndicatorOutput::Series(s) => Some(s),
            IndicatorOutput::Multi(map) => map.get(component),
        }
    }

    /// Last defined value of the single/named series.
    pub fn last_value(&self, component: &str) -> Option<f64> {
        self.series(component)?.iter().rev().flatten().next().copied()
    }
}

/// Computes indicators by name with JSON parameter objects.
///
/// Unknown parameters are ignored; missing ones take the conventional
/// defaults. A failure in one indicator never aborts a batch.
#[derive(Debug, Default, Clone)]
pub struct IndicatorManager;

impl IndicatorManager {
    pub fn new() -> Self {
        Self
    }

    /// Names accepted by [`compute`](Self::compute).
    pub fn available(&self) -> Vec<&'static str> {
        vec![
            "sma",
            "ema",
            "wma",
            "vwap",
            "macd",
            "adx",
            "parabolic_sar",
            "rsi",
            "stochastic",
            "cci",
            "williams_r",
            "bollinger_bands",
            "atr",
            "rolling_std",
            "keltner_channels",
            "obv",
            "volume_ratio",
            "mfi",
        ]
    }

    /// Compute one indicator over `candles`.
    pub fn compute(&self, name: &str, candles: &[Candle], params: &Value) -> Result<IndicatorOutput> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let output = match name {
            "sma" => IndicatorOutput::Series(sma(&closes, period_param(params, "period", 20)?)),
            "ema" => IndicatorOutput::Series(ema(&closes, period_param(params, "period", 20)?)),
            "wma" => IndicatorOutput::Series(wma(&closes, period_param(params, "period", 20)?)),
            "vwap" => IndicatorOutput::Series(vwap(candles)),
            "macd" => {
                let result = macd(
                    &closes,
                    period_param(params, "fast_period", 12)?,
                    period_param(params, "slow_period", 26)?,
                    period_param(params, "signal_period", 9)?,
                );
                IndicatorOutput::Multi(HashMap::from([
                    ("macd".to_string(), result.macd),
                    ("signal".to_string(), result.signal),
                    ("histogram".to_string(), result.histogram),
                ]))
            }
            "adx" => {
                let result = adx(candles, period_param(params, "period", 14)?);
                IndicatorOutput::Multi(HashMap::from([
                    ("adx".to_string(), result.adx),
                    ("plus_di".to_string(), result.plus_di),
                    ("minus_di".to_string(), result.minus_di),
                ]))
            }
            "parabolic_sar" => IndicatorOutput::Series(parabolic_sar(
                candles,
                float_param(params, "af_start", 0.02)?,
                float_param(params, "af_increment", 0.02)?,
                float_param(params, "af_max", 0.2)?,
            )),
            "rsi" => IndicatorOutput::Series(rsi(&closes, period_param(params, "period", 14)?)),
            "stochastic" => {
                let result = stochastic(
                    candles,
                    period_param(params, "k_period", 14)?,
                    period_param(params, "d_period", 3)?,
                    period_param(params, "smooth_k", 3)?,
                );
                IndicatorOutput::Multi(HashMap::from([
                    ("k".to_string(), result.k),
                    ("d".to_string(), result.d),
                ]))
            }
            "cci" => IndicatorOutput::Series(cci(candles, period_param(params, "period", 20)?)),
            "williams_r" => {
                IndicatorOutput::Series(williams_r(candles, period_param(params, "period", 14)?))
            }
            "bollinger_bands" => {
                let result = bollinger_bands(
                    &closes,
                    period_param(params, "period", 20)?,
                    float_param(params, "std_dev", 2.0)?,
                );
                IndicatorOutput::Multi(HashMap::from([
                    ("upper".to_string(), result.upper),
                    ("middle".to_string(), result.middle),
                    ("lower".to_string(), result.lower),
                    ("bandwidth".to_string(), result.bandwidth),
                ]))
            }
            "atr" => IndicatorOutput::Series(atr(candles, period_param(params, "period", 14)?)),
            "rolling_std" => {
                IndicatorOutput::Series(rolling_std(&closes, period_param(params, "period", 20)?))
            }
            "keltner_channels" => {
                let result = keltner_channels(
                    candles,
                    period_param(params, "period", 20)?,
                    period_param(params, "atr_period", 10)?,
                    float_param(params, "multiplier", 2.0)?,
                );
                IndicatorOutput::Multi(HashMap::from([
                    ("upper".to_string(), result.upper),
                    ("middle".to_string(), result.middle),
                    ("lower".to_string(), result.lower),
                ]))
            }
            "obv" => IndicatorOutput::Series(obv(candles)),
            "volume_ratio" => {
                IndicatorOutput::Series(volume_ratio(candles, period_param(params, "period", 20)?))
            }
            "mfi" => IndicatorOutput::Series(mfi(candles, period_param(params, "period", 14)?)),
            other => {
                return Err(EngineError::indicator(other, "unknown indicator"));
            }
        };
        Ok(output)
    }

    /// Compute several indicators over the same candles. A failing entry is
    /// logged and reported in the error map; the rest still compute.
    pub fn compute_batch(
        &self,
        requests: &[(String, Value)],
        candles: &[Candle],
    ) -> (HashMap<String, IndicatorOutput>, HashMap<String, EngineError>) {
        let mut outputs = HashMap::new();
        let mut errors = HashMap::new();
        for (name, params) in requests {
            match self.compute(name, candles, params) {
                Ok(output) => {
                    outputs.insert(name.clone(), output);
                }
                Err(err) => {
                    warn!(indicator = %name, error = %err, "indicator computation failed");
                    errors.insert(name.clone(), err);
                }
            }
        }
        (outputs, errors)
    }
}

fn period_param(params: &Value, name: &str, default: usize) -> Result<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => Ok(n as usize),
            _ => Err(EngineError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a positive integer, got {v}"),
            }),
        },
    }
}

fn float_param(params: &Value, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => match v.as_f64() {
            Some(f) if f.is_finite() => Ok(f),
            _ => Err(EngineError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a finite number, got {v}"),
            }),
        },
    }
}
