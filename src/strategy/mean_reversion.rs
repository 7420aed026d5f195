//! Mean-reversion strategy: Bollinger Band touches confirmed by RSI extremes

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::RiskPolicy;
use crate::error::{EngineError, Result};
use crate::indicators::{bollinger_bands, rsi};
use crate::signal::Signal;
use crate::strategy::{AnalysisContext, MarketView, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionParams {
    pub bb_period: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stop_loss_pct: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stop_loss_pct: 0.03,
        }
    }
}

pub struct MeanReversionStrategy {
    params: MeanReversionParams,
    risk: RiskPolicy,
}

impl MeanReversionStrategy {
    pub fn new(params: MeanReversionParams, risk: RiskPolicy) -> Self {
        Self { params, risk }
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new(MeanReversionParams::default(), RiskPolicy::default())
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "MeanReversion"
    }

    fn description(&self) -> &str {
        "Bollinger Band touch with a confirming RSI extreme, targeting the middle band"
    }

    fn parameters(&self) -> serde_json::Value {
        json!(self.params)
    }

    fn analyze(&self, market: &MarketView<'_>) -> Result<AnalysisContext> {
        let closes: Vec<f64> = market.candles.iter().map(|c| c.close).collect();
        let last = closes
            .last()
            .copied()
            .ok_or_else(|| EngineError::strategy(self.name(), "empty candle series"))?;

        let bands = bollinger_bands(&closes, self.params.bb_period, self.params.bb_std);
        let rsi_series = rsi(&closes, self.params.rsi_period);
        let i = closes.len() - 1;

        let (upper, middle, lower, rsi_value) =
            match (bands.upper[i], bands.middle[i], bands.lower[i], rsi_series[i]) {
                (Some(u), Some(m), Some(l), Some(r)) => (u, m, l, r),
                _ => {
                    return Err(EngineError::strategy(
                        self.name(),
                        "insufficient history for Bollinger Bands or RSI",
                    ));
                }
            };

        let mut context = AnalysisContext::new();
        context.set("current_price", last);
        context.set("bb_upper", upper);
        context.set("bb_middle", middle);
        context.set("bb_lower", lower);
        context.set("rsi", rsi_value);
        if upper > lower {
            context.set("bb_position", (last - lower) / (upper - lower));
        }
        Ok(context)
    }

    fn generate_signals(
        &self,
        market: &MarketView<'_>,
        context: &AnalysisContext,
    ) -> Result<Vec<Signal>> {
        let need = |key: &str| {
            context
                .get(key)
                .ok_or_else(|| EngineError::strategy(self.name(), format!("missing analysis value {key}")))
        };
        let price = need("current_price")?;
        let upper = need("bb_upper")?;
        let middle = need("bb_middle")?;
        let lower = need("bb_lower")?;
        let rsi_value = need("rsi")?;

        // both the band touch and the RSI extreme are required; one alone is
        // not a setup
        let oversold = price <= lower && rsi_value < self.params.rsi_oversold;
        let overbought = price >= upper && rsi_value > self.params.rsi_overbought;

        let mut signals = Vec::new();
        if oversold {
            let distance = (self.params.rsi_oversold - rsi_value) / self.params.rsi_oversold;
            let signal = Signal::buy(
                market.symbol,
                price,
                self.name(),
                (0.6 + distance).clamp(0.0, 1.0),
                market.interval,
            )
            .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, true))
            .with_take_profit(middle);
            if self.risk.check_risk(&signal) {
                signals.push(signal);
            } else {
                debug!(strategy = self.name(), "middle-band target too close for the risk gate");
            }
        } else if overbought {
            let distance = (rsi_value - self.params.rsi_overbought)
                / (100.0 - self.params.rsi_overbought);
            let signal = Signal::sell(
                market.symbol,
                price,
                self.name(),
                (0.6 + distance * 0.4).clamp(0.0, 1.0),
                market.interval,
            )
            .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, false))
            .with_take_profit(middle);
            if self.risk.check_risk(&signal) {
                signals.push(signal);
            }
        }
        Ok(signals)
    }
}
