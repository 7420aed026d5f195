//! Trading signals: the core output type, aggregation and persistence

pub mod aggregator;
pub mod store;

pub use aggregator::{aggregate, AggregatorConfig};
pub use store::SignalStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::Interval;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
        }
    }
}

/// A trading signal as emitted by a strategy or the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub symbol: String,
    pub signal_type: SignalType,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub strategy: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub interval: Interval,
}

impl Signal {
    pub fn new(
        symbol: impl Into<String>,
        signal_type: SignalType,
        entry_price: f64,
        strategy: impl Into<String>,
        confidence: f64,
        interval: Interval,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            signal_type,
            entry_price,
            stop_loss: None,
            take_profit: None,
            strategy: strategy.into(),
            confidence,
            timestamp: Utc::now(),
            interval,
        }
    }

    pub fn buy(
        symbol: impl Into<String>,
        entry_price: f64,
        strategy: impl Into<String>,
        confidence: f64,
        interval: Interval,
    ) -> Self {
        Self::new(symbol, SignalType::Buy, entry_price, strategy, confidence, interval)
    }

    pub fn sell(
        symbol: impl Into<String>,
        entry_price: f64,
        strategy: impl Into<String>,
        confidence: f64,
        interval: Interval,
    ) -> Self {
        Self::new(symbol, SignalType::Sell, entry_price, strategy, confidence, interval)
    }

    pub fn hold(
        symbol: impl Into<String>,
        entry_price: f64,
        strategy: impl Into<String>,
        confidence: f64,
        interval: Interval,
    ) -> Self {
        Self::new(symbol, SignalType::Hold, entry_price, strategy, confidence, interval)
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    /// Reward-to-risk ratio, when both stop and target are set.
    pub fn risk_reward_ratio(&self) -> Option<f64> {
        let stop = self.stop_loss?;
        let target = self.take_profit?;
        let risk = (self.entry_price - stop).abs();
        if risk == 0.0 {
            return None;
        }
        Some((target - self.entry_price).abs() / risk)
    }

    /// Check price ordering and confidence bounds.
    ///
    /// For a BUY the stop must sit below entry and the target above; SELL is
    /// the mirror image. HOLD carries no levels to check.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngineError::InvalidSignal(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.entry_price <= 0.0 {
            return Err(EngineError::InvalidSignal(format!(
                "entry price {} must be positive",
                self.entry_price
            )));
        }
        match self.signal_type {
            SignalType::Buy => {
                if let Some(sl) = self.stop_loss {
                    if sl >= self.entry_price {
                        return Err(EngineError::InvalidSignal(
                            "BUY stop loss must be below entry".into(),
                        ));
                    }
                }
                if let Some(tp) = self.take_profit {
                    if tp <= self.entry_price {
                        return Err(EngineError::InvalidSignal(
                            "BUY take profit must be above entry".into(),
                        ));
                    }
                }
            }
            SignalType::Sell => {
                if let Some(sl) = self.stop_loss {
                    if sl <= self.entry_price {
                        return Err(EngineError::InvalidSignal(
                            "SELL stop loss must be above entry".into(),
                        ));
                    }
                }
                if let Some(tp) = self.take_profit {
                    if tp >= self.entry_price {
                        return Err(EngineError::InvalidSignal(
                            "SELL take profit must be below entry".into(),
                        ));
                    }
                }
            }
            SignalType::Hold => {}
        }
        Ok(())
    }
}
