//! Backtesting: causal historical replay, metrics and rating

pub mod engine;
pub mod metrics;
pub mod rating;

pub use engine::{BacktestRequest, BacktestResult, Backtester, Trade};
pub use metrics::{compute_metrics, BacktestMetrics};
pub use rating::{rate, Grade, Rating, RatingWeights};
