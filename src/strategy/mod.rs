//! Strategy layer
//!
//! Every strategy implements [`Strategy`]: an analysis pass producing a named
//! bag of values, then signal generation over that analysis. Strategies are
//! synchronous and pure over their input; the one LLM-backed strategy lives
//! in [`ai`] and is dispatched through the registry's async path.

pub mod ai;
pub mod mean_reversion;
pub mod momentum;
pub mod price_action;
pub mod registry;
pub mod trend_following;

pub use ai::{AiAnalysisStrategy, HttpLlmClient, LlmClient};
pub use mean_reversion::{MeanReversionParams, MeanReversionStrategy};
pub use momentum::{MomentumParams, MomentumStrategy};
pub use price_action::{PriceActionParams, PriceActionStrategy};
pub use registry::{build_strategy, StrategyInfo, StrategyRegistry};
pub use trend_following::{TrendFollowingParams, TrendFollowingStrategy};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{Candle, Interval};
use crate::error::Result;
use crate::signal::Signal;

/// The market slice a strategy runs against.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub symbol: &'a str,
    pub interval: Interval,
    pub candles: &'a [Candle],
}

impl<'a> MarketView<'a> {
    pub fn new(symbol: &'a str, interval: Interval, candles: &'a [Candle]) -> Self {
        Self {
            symbol,
            interval,
            candles,
        }
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

/// Serializable bag of analysis outputs: named numeric values plus string
/// tags for categorical reads (trend direction, detected patterns).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub values: HashMap<String, f64>,
    pub tags: HashMap<String, String>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Result of one strategy invocation, as reported to schedulers and callers.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    SignalsProduced(Vec<Signal>),
    NoSignal,
    /// The run failed; the diagnostic has already been logged.
    Failed(String),
}

impl RunOutcome {
    pub fn signals(&self) -> &[Signal] {
        match self {
            RunOutcome::SignalsProduced(signals) => signals,
            _ => &[],
        }
    }
}

/// A trading strategy over OHLCV data.
///
/// `generate_signals` returns an empty vec when nothing fires; errors are for
/// genuine failures, not for "no setup today".
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Current parameter set, serialized for display and persistence.
    fn parameters(&self) -> serde_json::Value;

    fn analyze(&self, market: &MarketView<'_>) -> Result<AnalysisContext>;

    fn generate_signals(
        &self,
        market: &MarketView<'_>,
        context: &AnalysisContext,
    ) -> Result<Vec<Signal>>;
}
