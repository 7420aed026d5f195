//! Strategy registry and dispatch

use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, info};

use crate::config::{EngineConfig, RiskPolicy};
use crate::error::{EngineError, Result};
use crate::strategy::{
    ai::{AiAnalysisParams, AiAnalysisStrategy, LlmClient},
    AnalysisContext, MarketView, MeanReversionParams, MeanReversionStrategy, MomentumParams,
    MomentumStrategy, PriceActionParams, PriceActionStrategy, RunOutcome, Strategy,
    TrendFollowingParams, TrendFollowingStrategy,
};

/// Listing entry for a registered strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Holds every registered strategy and runs them by name.
///
/// The rule-based strategies share the synchronous [`Strategy`] path; the AI
/// strategy needs an await point for its LLM call and dispatches on its own
/// branch.
pub struct StrategyRegistry {
    strategies: HashMap<String, Box<dyn Strategy>>,
    ai: Option<AiAnalysisStrategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
            ai: None,
        }
    }

    /// Registry with the four rule-based strategies at their defaults, plus
    /// the AI strategy when an LLM client is supplied.
    pub fn with_defaults(config: &EngineConfig, llm: Option<Box<dyn LlmClient>>) -> Self {
        let mut registry = Self::new();
        let risk = config.risk.clone();
        registry.register(Box::new(TrendFollowingStrategy::new(
            TrendFollowingParams::default(),
            risk.clone(),
        )));
        registry.register(Box::new(MeanReversionStrategy::new(
            MeanReversionParams::default(),
            risk.clone(),
        )));
        registry.register(Box::new(MomentumStrategy::new(
            MomentumParams::default(),
            risk.clone(),
        )));
        registry.register(Box::new(PriceActionStrategy::new(
            PriceActionParams::default(),
            risk,
        )));
        if let Some(client) = llm {
            registry.ai = Some(AiAnalysisStrategy::new(AiAnalysisParams::default(), client));
            info!("AI analysis strategy registered");
        }
        registry
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        info!(strategy = strategy.name(), "strategy registered");
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies.get(name).map(Box::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
            || (name == AiAnalysisStrategy::NAME && self.ai.is_some())
    }

    pub fn list(&self) -> Vec<StrategyInfo> {
        let mut infos: Vec<StrategyInfo> = self
            .strategies
            .values()
            .map(|s| StrategyInfo {
                name: s.name().to_string(),
                description: s.description().to_string(),
                parameters: s.parameters(),
            })
            .collect();
        if let Some(ai) = &self.ai {
            infos.push(StrategyInfo {
                name: ai.name().to_string(),
                description: ai.description().to_string(),
                parameters: ai.parameters(),
            });
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Run one strategy against the market view.
    ///
    /// A strategy failure is an outcome, not an error: it is logged and
    /// reported as [`RunOutcome::Failed`] so one bad run never disables the
    /// caller's schedule. Only an unknown name is an `Err`.
    pub async fn run(&self, name: &str, market: &MarketView<'_>) -> Result<RunOutcome> {
        Ok(self.run_with_context(name, market).await?.1)
    }

    /// As [`run`](Self::run), additionally returning the analysis context a
    /// synchronous strategy computed. The AI strategy carries no context.
    pub async fn run_with_context(
        &self,
        name: &str,
        market: &MarketView<'_>,
    ) -> Result<(Option<AnalysisContext>, RunOutcome)> {
        if name == AiAnalysisStrategy::NAME {
            let Some(ai) = &self.ai else {
                return Err(EngineError::UnknownStrategy(name.to_string()));
            };
            let outcome = match ai.run(market).await {
                Ok(signals) if signals.is_empty() => RunOutcome::NoSignal,
                Ok(signals) => RunOutcome::SignalsProduced(signals),
                Err(e) => {
                    error!(strategy = name, error = %e, "AI strategy run failed");
                    RunOutcome::Failed(e.to_string())
                }
            };
            return Ok((None, outcome));
        }

        let strategy = self
            .get(name)
            .ok_or_else(|| EngineError::UnknownStrategy(name.to_string()))?;
        Ok(match Self::run_sync(strategy, market) {
            Ok((context, signals)) if signals.is_empty() => {
                (Some(context), RunOutcome::NoSignal)
            }
            Ok((context, signals)) => (Some(context), RunOutcome::SignalsProduced(signals)),
            Err(e) => {
                error!(strategy = name, error = %e, "strategy run failed");
                (None, RunOutcome::Failed(e.to_string()))
            }
        })
    }

    /// Analyze-then-generate for a synchronous strategy, returning the
    /// context alongside the signals.
    pub fn run_sync(
        strategy: &dyn Strategy,
        market: &MarketView<'_>,
    ) -> Result<(AnalysisContext, Vec<crate::signal::Signal>)> {
        let context = strategy.analyze(market)?;
        let signals = strategy.generate_signals(market, &context)?;
        Ok((context, signals))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a fresh instance of a rule-based strategy from JSON parameters.
/// Omitted fields fall back to the strategy's defaults.
///
/// Used by backtests that override parameters per request; the AI strategy
/// cannot be built this way.
pub fn build_strategy(
    name: &str,
    params: serde_json::Value,
    risk: RiskPolicy,
) -> Result<Box<dyn Strategy>> {
    let invalid = |e: serde_json::Error| EngineError::InvalidParameter {
        name: "params".to_string(),
        reason: e.to_string(),
    };
    match name {
        "TrendFollowing" => Ok(Box::new(TrendFollowingStrategy::new(
            serde_json::from_value(params).map_err(invalid)?,
            risk,
        ))),
        "MeanReversion" => Ok(Box::new(MeanReversionStrategy::new(
            serde_json::from_value(params).map_err(invalid)?,
            risk,
        ))),
        "Momentum" => Ok(Box::new(MomentumStrategy::new(
            serde_json::from_value(params).map_err(invalid)?,
            risk,
        ))),
        "PriceAction" => Ok(Box::new(PriceActionStrategy::new(
            serde_json::from_value(params).map_err(invalid)?,
            risk,
        ))),
        other => Err(EngineError::UnknownStrategy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Candle, Interval};
    use chrono::Utc;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(Utc::now(), c, c + 1.0, c - 1.0, c, 100.0)
            })
            .collect()
    }

    #[test]
    fn test_defaults_register_four_strategies() {
        let registry = StrategyRegistry::with_defaults(&EngineConfig::default(), None);
        let infos = registry.list();
        assert_eq!(infos.len(), 4);
        assert!(registry.contains("TrendFollowing"));
        assert!(registry.contains("MeanReversion"));
        assert!(registry.contains("Momentum"));
        assert!(registry.contains("PriceAction"));
        assert!(!registry.contains("AIAnalysis"));
    }

    #[tokio::test]
    async fn test_unknown_strategy_errors() {
        let registry = StrategyRegistry::with_defaults(&EngineConfig::default(), None);
        let series = candles(250);
        let market = MarketView::new("BTC/USDT", Interval::H1, &series);
        let err = registry.run("NoSuchStrategy", &market).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy(_)));
    }

    #[tokio::test]
    async fn test_failed_run_is_an_outcome() {
        let registry = StrategyRegistry::with_defaults(&EngineConfig::default(), None);
        // far too little history for TrendFollowing's ADX warmup
        let series = candles(5);
        let market = MarketView::new("BTC/USDT", Interval::H1, &series);
        let outcome = registry.run("TrendFollowing", &market).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed(_)));
    }

    #[test]
    fn test_build_strategy_with_partial_params() {
        let params = serde_json::json!({ "short_ma": 5, "long_ma": 20 });
        let strategy =
            build_strategy("TrendFollowing", params, RiskPolicy::default()).unwrap();
        assert_eq!(strategy.name(), "TrendFollowing");
        assert_eq!(strategy.parameters()["short_ma"], 5);
        // untouched fields keep their defaults
        assert_eq!(strategy.parameters()["adx_period"], 14);

        let err = build_strategy("AIAnalysis", serde_json::json!({}), RiskPolicy::default());
        assert!(matches!(err, Err(EngineError::UnknownStrategy(_))));
    }

    #[tokio::test]
    async fn test_ai_without_client_is_unknown() {
        let registry = StrategyRegistry::with_defaults(&EngineConfig::default(), None);
        let series = candles(50);
        let market = MarketView::new("BTC/USDT", Interval::H1, &series);
        let err = registry.run("AIAnalysis", &market).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy(_)));
    }
}
