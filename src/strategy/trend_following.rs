//! Trend-following strategy: EMA stack, MACD, ADX and volume confirmation

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::RiskPolicy;
use crate::error::{EngineError, Result};
use crate::indicators::{adx, ema, macd, volume_ratio};
use crate::signal::Signal;
use crate::strategy::{AnalysisContext, MarketView, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFollowingParams {
    pub short_ma: usize,
    pub long_ma: usize,
    pub signal_ma: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub volume_multiplier: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for TrendFollowingParams {
    fn default() -> Self {
        Self {
            short_ma: 20,
            long_ma: 50,
            signal_ma: 200,
            adx_period: 14,
            adx_threshold: 25.0,
            volume_multiplier: 1.5,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.15,
        }
    }
}

pub struct TrendFollowingStrategy {
    params: TrendFollowingParams,
    risk: RiskPolicy,
}

impl TrendFollowingStrategy {
    pub fn new(params: TrendFollowingParams, risk: RiskPolicy) -> Self {
        Self { params, risk }
    }
}

impl Default for TrendFollowingStrategy {
    fn default() -> Self {
        Self::new(TrendFollowingParams::default(), RiskPolicy::default())
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &str {
        "TrendFollowing"
    }

    fn description(&self) -> &str {
        "EMA crossover with MACD, ADX trend-strength and volume confirmation"
    }

    fn parameters(&self) -> serde_json::Value {
        json!(self.params)
    }

    fn analyze(&self, market: &MarketView<'_>) -> Result<AnalysisContext> {
        let candles = market.candles;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let last = closes
            .last()
            .copied()
            .ok_or_else(|| EngineError::strategy(self.name(), "empty candle series"))?;

        let short = ema(&closes, self.params.short_ma);
        let long = ema(&closes, self.params.long_ma);
        let signal_line = ema(&closes, self.params.signal_ma);
        let macd_out = macd(&closes, 12, 26, 9);
        let adx_out = adx(candles, self.params.adx_period);
        let vol = volume_ratio(candles, 20);

        let mut context = AnalysisContext::new();
        context.set("current_price", last);
        let i = closes.len() - 1;
        let mut missing = Vec::new();
        let mut put = |context: &mut AnalysisContext, key: &str, value: Option<f64>| match value {
            Some(v) => context.set(key, v),
            None => missing.push(key.to_string()),
        };
        put(&mut context, "short_ema", short[i]);
        put(&mut context, "long_ema", long[i]);
        put(&mut context, "signal_ema", signal_line[i]);
        put(&mut context, "macd", macd_out.macd[i]);
        put(&mut context, "macd_signal", macd_out.signal[i]);
        put(&mut context, "macd_histogram", macd_out.histogram[i]);
        put(&mut context, "adx", adx_out.adx[i]);
        put(&mut context, "plus_di", adx_out.plus_di[i]);
        put(&mut context, "minus_di", adx_out.minus_di[i]);
        put(&mut context, "volume_ratio", vol[i]);

        if !missing.is_empty() {
            return Err(EngineError::strategy(
                self.name(),
                format!("insufficient history, no value for {}", missing.join(", ")),
            ));
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
        let short = need("short_ema")?;
        let long = need("long_ema")?;
        let signal_ema = need("signal_ema")?;
        let macd_line = need("macd")?;
        let macd_signal = need("macd_signal")?;
        let adx_value = need("adx")?;
        let plus_di = need("plus_di")?;
        let minus_di = need("minus_di")?;
        let vol_ratio = need("volume_ratio")?;

        // the three gates are mandatory; the score only shades confidence
        let trending = adx_value > self.params.adx_threshold;
        let bull_cross = short > long;
        let bear_cross = short < long;
        let macd_bullish = macd_line > macd_signal;
        let macd_bearish = macd_line < macd_signal;

        let bullish_score = [
            bull_cross,
            price > signal_ema,
            trending,
            plus_di > minus_di,
            vol_ratio > self.params.volume_multiplier,
        ]
        .iter()
        .filter(|&&c| c)
        .count();
        let bearish_score = [
            bear_cross,
            price < signal_ema,
            trending,
            minus_di > plus_di,
            vol_ratio > self.params.volume_multiplier,
        ]
        .iter()
        .filter(|&&c| c)
        .count();

        let mut signals = Vec::new();
        if bull_cross && macd_bullish && trending {
            let signal = Signal::buy(
                market.symbol,
                price,
                self.name(),
                bullish_score as f64 / 5.0,
                market.interval,
            )
            .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, true))
            .with_take_profit(self.risk.percent_target(price, self.params.take_profit_pct, true));
            if self.risk.check_risk(&signal) {
                signals.push(signal);
            } else {
                debug!(strategy = self.name(), "buy setup failed the risk-reward gate");
            }
        } else if bear_cross && macd_bearish && trending {
            let signal = Signal::sell(
                market.symbol,
                price,
                self.name(),
                bearish_score as f64 / 5.0,
                market.interval,
            )
            .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, false))
            .with_take_profit(self.risk.percent_target(price, self.params.take_profit_pct, false));
            if self.risk.check_risk(&signal) {
                signals.push(signal);
            } else {
                debug!(strategy = self.name(), "sell setup failed the risk-reward gate");
            }
        }
        Ok(signals)
    }
}
