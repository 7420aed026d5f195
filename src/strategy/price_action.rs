//! Price-action strategy: candle patterns filtered by market structure,
//! with stops informed by support/resistance

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::RiskPolicy;
use crate::error::{EngineError, Result};
use crate::price_action::{
    detect_latest, market_structure, support_resistance, Direction, PatternKind, Trend,
};
use crate::signal::Signal;
use crate::strategy::{AnalysisContext, MarketView, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceActionParams {
    /// Window for support/resistance detection.
    pub lookback: usize,
    /// Candles on each side needed to confirm a swing point.
    pub swing_lookback: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for PriceActionParams {
    fn default() -> Self {
        Self {
            lookback: 50,
            swing_lookback: 5,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.10,
        }
    }
}

pub struct PriceActionStrategy {
    params: PriceActionParams,
    risk: RiskPolicy,
}

impl PriceActionStrategy {
    pub fn new(params: PriceActionParams, risk: RiskPolicy) -> Self {
        Self { params, risk }
    }

    fn pattern_signal(
        &self,
        market: &MarketView<'_>,
        direction: Direction,
        confidence: f64,
        trend: Option<Trend>,
    ) -> Option<Signal> {
        let price = market.last_close()?;

        // a reversal pattern against a clean trend is a skip, not a trade
        match (direction, trend) {
            (Direction::Bullish, Some(Trend::Downtrend)) => {
                debug!(strategy = "PriceAction", "bullish pattern inside a downtrend, skipped");
                return None;
            }
            (Direction::Bearish, Some(Trend::Uptrend)) => {
                debug!(strategy = "PriceAction", "bearish pattern inside an uptrend, skipped");
                return None;
            }
            (Direction::Neutral, _) => return None,
            _ => {}
        }

        let long = direction == Direction::Bullish;
        let signal = if long {
            Signal::buy(market.symbol, price, "PriceAction", confidence, market.interval)
        } else {
            Signal::sell(market.symbol, price, "PriceAction", confidence, market.interval)
        }
        .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, long))
        .with_take_profit(self.risk.percent_target(price, self.params.take_profit_pct, long));

        if self.risk.check_risk(&signal) {
            Some(signal)
        } else {
            None
        }
    }
}

impl Default for PriceActionStrategy {
    fn default() -> Self {
        Self::new(PriceActionParams::default(), RiskPolicy::default())
    }
}

impl Strategy for PriceActionStrategy {
    fn name(&self) -> &str {
        "PriceAction"
    }

    fn description(&self) -> &str {
        "Pin bar and engulfing entries filtered by market structure and key levels"
    }

    fn parameters(&self) -> serde_json::Value {
        json!(self.params)
    }

    fn analyze(&self, market: &MarketView<'_>) -> Result<AnalysisContext> {
        let candles = market.candles;
        let last = market
            .last_close()
            .ok_or_else(|| EngineError::strategy(self.name(), "empty candle series"))?;

        let hits = detect_latest(candles);
        let levels = support_resistance(candles, self.params.lookback, 0.02, 2);
        let trend = market_structure(candles, self.params.swing_lookback);

        let mut context = AnalysisContext::new();
        context.set("current_price", last);
        for hit in &hits {
            let key = match hit.pattern {
                PatternKind::PinBar => "pin_bar",
                PatternKind::Engulfing => "engulfing",
                PatternKind::InsideBar => "inside_bar",
                PatternKind::OutsideBar => "outside_bar",
                PatternKind::Doji => "doji",
            };
            context.set(format!("{key}_confidence"), hit.confidence);
            context.tag(
                format!("{key}_direction"),
                match hit.direction {
                    Direction::Bullish => "bullish",
                    Direction::Bearish => "bearish",
                    Direction::Neutral => "neutral",
                },
            );
        }
        if let Some(level) = levels.support_below(last) {
            context.set("nearest_support", level.price);
            context.set("support_touches", level.touches as f64);
        }
        if let Some(level) = levels.resistance_above(last) {
            context.set("nearest_resistance", level.price);
            context.set("resistance_touches", level.touches as f64);
        }
        if let Some(trend) = trend {
            context.tag(
                "structure",
                match trend {
                    Trend::Uptrend => "uptrend",
                    Trend::Downtrend => "downtrend",
                    Trend::Ranging => "ranging",
                },
            );
        }
        Ok(context)
    }

    fn generate_signals(
        &self,
        market: &MarketView<'_>,
        context: &AnalysisContext,
    ) -> Result<Vec<Signal>> {
        let trend = match context.get_tag("structure") {
            Some("uptrend") => Some(Trend::Uptrend),
            Some("downtrend") => Some(Trend::Downtrend),
            Some("ranging") => Some(Trend::Ranging),
            _ => None,
        };

        let direction_of = |key: &str| match context.get_tag(key) {
            Some("bullish") => Some(Direction::Bullish),
            Some("bearish") => Some(Direction::Bearish),
            _ => None,
        };

        let mut signals = Vec::new();
        if let Some(confidence) = context.get("pin_bar_confidence") {
            if let Some(direction) = direction_of("pin_bar_direction") {
                if let Some(signal) = self.pattern_signal(market, direction, confidence, trend) {
                    signals.push(signal);
                }
            }
        }
        if let Some(confidence) = context.get("engulfing_confidence") {
            if let Some(direction) = direction_of("engulfing_direction") {
                if let Some(signal) = self.pattern_signal(market, direction, confidence, trend) {
                    signals.push(signal);
                }
            }
        }
        Ok(signals)
    }
}
