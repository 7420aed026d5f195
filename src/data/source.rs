//! The normalized OHLCV data source seam
//!
//! Exchange connectivity lives outside this crate; the engine only sees this
//! trait. Implementations must return candles ordered ascending by timestamp.
//! Gaps are possible and tolerated; nothing assumes fixed spacing beyond the
//! nominal interval.

use futures::future::BoxFuture;

use crate::data::{Candle, Interval};
use crate::error::Result;

/// Provider of normalized OHLCV data.
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` most recent candles for `symbol` at `interval`,
    /// ordered ascending by timestamp.
    fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>>>;
}

/// In-memory candle source serving a fixed series per symbol.
///
/// Used by backtest fixtures and tests; production wires a real exchange
/// adapter from the hosting application.
#[derive(Debug, Default)]
pub struct StaticCandleSource {
    series: std::collections::HashMap<String, Vec<Candle>>,
}

impl StaticCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candle series for a symbol.
    pub fn insert(&mut self, symbol: impl Into<String>, candles: Vec<Candle>) {
        self.series.insert(symbol.into(), candles);
    }
}

impl CandleSource for StaticCandleSource {
    fn get_candles(
        &self,
        symbol: &str,
        _interval: Interval,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>>> {
        let result = match self.series.get(symbol) {
            Some(candles) => {
                let skip = candles.len().saturating_sub(limit);
                Ok(candles[skip..].to_vec())
            }
            None => Err(crate::error::EngineError::data(
                symbol,
                "no candles registered",
            )),
        };
        Box::pin(async move { result })
    }
}
