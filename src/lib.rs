//! Signalcraft: a crypto market signal engine
//!
//! This crate ingests normalized OHLCV candle data and turns it into trading
//! signals:
//!
//! - **Indicators**: pure series functions (RSI, MACD, ADX, Bollinger, ...)
//! - **Price Action**: candlestick patterns, support/resistance, market structure
//! - **Strategies**: trend-following, mean-reversion, momentum, price-action
//!   and an LLM-backed analysis strategy, all behind one contract
//! - **Aggregation**: multi-strategy conflict resolution into one decision
//! - **Signal Store**: durable signal log with TTL expiry and a retention cap
//! - **Scheduler**: periodic and on-demand monitor task execution
//! - **Backtesting**: historical replay with performance metrics and a rating
//!
//! The HTTP/UI layer, exchange connectivity and notification delivery live
//! outside this crate; they talk to it through [`engine::Engine`] and the
//! [`data::CandleSource`] / [`strategy::ai::LlmClient`] collaborator traits.

pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod price_action;
pub mod scheduler;
pub mod signal;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::backtest::{BacktestRequest, BacktestResult, Backtester};
    pub use crate::config::{EngineConfig, RiskPolicy};
    pub use crate::data::{Candle, CandleSeries, CandleSource, Interval};
    pub use crate::engine::Engine;
    pub use crate::error::{EngineError, Result};
    pub use crate::signal::{Signal, SignalType};
    pub use crate::strategy::{AnalysisContext, Strategy, StrategyRegistry};
}

pub use error::{EngineError, Result};

/// Install a global tracing subscriber reading `RUST_LOG`, defaulting to
/// `info`. Call once from the hosting binary; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
