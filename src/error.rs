//! Engine error taxonomy
//!
//! Every failure mode in the core degrades to "no signal this cycle" plus a
//! diagnostic; nothing here is allowed to take down the hosting process.

use thiserror::Error;

/// Errors produced by the signal engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Candle fetch failed or returned no data. Recovered locally; the task
    /// run ends as no-signal.
    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// A single indicator could not be computed (e.g. too few candles).
    /// Isolated per indicator; never aborts a batch.
    #[error("indicator '{indicator}' failed: {reason}")]
    IndicatorComputation { indicator: String, reason: String },

    /// A strategy failed during analyze/generate. Isolated per strategy.
    #[error("strategy '{strategy}' failed: {reason}")]
    StrategyFailure { strategy: String, reason: String },

    /// An external collaborator (LLM, data source) timed out.
    #[error("external service '{service}' timed out after {seconds}s")]
    ExternalServiceTimeout { service: String, seconds: u64 },

    /// Signal or task store write/read failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A signal violated its structural invariants (stop/target on the wrong
    /// side of entry, confidence out of range). Such signals are rejected,
    /// not emitted.
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown monitor task: {0}")]
    UnknownTask(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl EngineError {
    pub fn strategy(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StrategyFailure {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    pub fn indicator(indicator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IndicatorComputation {
            indicator: indicator.into(),
            reason: reason.into(),
        }
    }

    pub fn data(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
