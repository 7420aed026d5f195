//! Engine configuration
//!
//! Everything is passed in explicitly; nothing reads global state except
//! [`LlmConfig::from_env`], which pulls the API credentials the deployment
//! provides through the environment (a `.env` file works via `dotenv`).

pub mod risk;

pub use risk::RiskPolicy;

use serde::{Deserialize, Serialize};

use crate::backtest::RatingWeights;
use crate::signal::AggregatorConfig;

/// LLM endpoint settings for the AI analysis strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            model: "gemini-pro".to_string(),
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Read settings from `LLM_API_URL`, `LLM_API_KEY`, `LLM_MODEL` and
    /// `LLM_TIMEOUT_SECS`, falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Self {
            api_url: std::env::var("LLM_API_URL").unwrap_or(defaults.api_url),
            api_key: std::env::var("LLM_API_KEY").unwrap_or(defaults.api_key),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub aggregator: AggregatorConfig,
    pub rating_weights: RatingWeights,
    pub risk: RiskPolicy,
    /// Candles fetched per strategy run.
    pub candle_limit: usize,
    pub llm: LlmConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            rating_weights: RatingWeights::default(),
            risk: RiskPolicy::default(),
            candle_limit: 200,
            llm: LlmConfig::default(),
        }
    }
}
