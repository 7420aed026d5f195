//! Momentum strategy: rate-of-change persistence, breakouts and RSI/MACD
//! confirmation

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::RiskPolicy;
use crate::error::{EngineError, Result};
use crate::indicators::{macd, rsi};
use crate::signal::Signal;
use crate::strategy::{AnalysisContext, MarketView, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub momentum_period: usize,
    pub roc_period: usize,
    /// Momentum percent change that counts as strong.
    pub momentum_threshold: f64,
    /// Bars the ROC sign must have held to count as persistent.
    pub min_run: usize,
    pub rsi_threshold: f64,
    pub breakout_period: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            momentum_period: 10,
            roc_period: 12,
            momentum_threshold: 5.0,
            min_run: 3,
            rsi_threshold: 60.0,
            breakout_period: 20,
            stop_loss_pct: 0.07,
            take_profit_pct: 0.20,
        }
    }
}

pub struct MomentumStrategy {
    params: MomentumParams,
    risk: RiskPolicy,
}

impl MomentumStrategy {
    pub fn new(params: MomentumParams, risk: RiskPolicy) -> Self {
        Self { params, risk }
    }

    /// Percent rate of change over `period` bars, aligned to the input.
    fn roc_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
        let mut out = vec![None; closes.len()];
        for i in period..closes.len() {
            let base = closes[i - period];
            if base != 0.0 {
                out[i] = Some((closes[i] - base) / base * 100.0);
            }
        }
        out
    }

    /// Bars (counting the last) over which the ROC sign has not flipped.
    fn sign_run(roc: &[Option<f64>]) -> usize {
        let mut iter = roc.iter().rev().flatten();
        let Some(&last) = iter.next() else { return 0 };
        if last == 0.0 {
            return 0;
        }
        let positive = last > 0.0;
        let mut run = 1;
        for &v in iter {
            if v != 0.0 && (v > 0.0) == positive {
                run += 1;
            } else {
                break;
            }
        }
        run
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new(MomentumParams::default(), RiskPolicy::default())
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        "Momentum"
    }

    fn description(&self) -> &str {
        "Rate-of-change persistence with breakout, RSI and MACD histogram confirmation"
    }

    fn parameters(&self) -> serde_json::Value {
        json!(self.params)
    }

    fn analyze(&self, market: &MarketView<'_>) -> Result<AnalysisContext> {
        let candles = market.candles;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let i = closes
            .len()
            .checked_sub(1)
            .ok_or_else(|| EngineError::strategy(self.name(), "empty candle series"))?;

        let momentum = Self::roc_series(&closes, self.params.momentum_period);
        let roc = Self::roc_series(&closes, self.params.roc_period);
        let rsi_series = rsi(&closes, 14);
        let macd_out = macd(&closes, 12, 26, 9);

        let lookback = self.params.breakout_period.min(closes.len());
        let window = &candles[candles.len() - lookback..];
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        let (momentum_pct, roc_value, rsi_value, histogram) =
            match (momentum[i], roc[i], rsi_series[i], macd_out.histogram[i]) {
                (Some(m), Some(r), Some(rs), Some(h)) => (m, r, rs, h),
                _ => {
                    return Err(EngineError::strategy(
                        self.name(),
                        "insufficient history for momentum indicators",
                    ));
                }
            };

        let mut context = AnalysisContext::new();
        context.set("current_price", closes[i]);
        context.set("momentum_pct", momentum_pct);
        context.set("roc", roc_value);
        context.set("roc_run", Self::sign_run(&roc) as f64);
        context.set("rsi", rsi_value);
        context.set("macd_histogram", histogram);
        context.set("is_new_high", f64::from(u8::from(closes[i] >= highest)));
        context.set("is_new_low", f64::from(u8::from(closes[i] <= lowest)));
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
        let momentum_pct = need("momentum_pct")?;
        let roc = need("roc")?;
        let roc_run = need("roc_run")? as usize;
        let rsi_value = need("rsi")?;
        let histogram = need("macd_histogram")?;
        let is_new_high = need("is_new_high")? > 0.5;
        let is_new_low = need("is_new_low")? > 0.5;

        // the ROC condition only counts once its sign has held for min_run
        let persistent = roc_run >= self.params.min_run;
        let buy_score = [
            momentum_pct > self.params.momentum_threshold,
            roc > 3.0 && persistent,
            is_new_high,
            rsi_value > self.params.rsi_threshold,
            histogram > 0.0,
        ]
        .iter()
        .filter(|&&c| c)
        .count();
        let sell_score = [
            momentum_pct < -self.params.momentum_threshold,
            roc < -3.0 && persistent,
            is_new_low,
            rsi_value < 100.0 - self.params.rsi_threshold,
            histogram < 0.0,
        ]
        .iter()
        .filter(|&&c| c)
        .count();

        let mut signals = Vec::new();
        if buy_score >= 3 {
            let signal = Signal::buy(
                market.symbol,
                price,
                self.name(),
                buy_score as f64 / 5.0,
                market.interval,
            )
            .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, true))
            .with_take_profit(self.risk.percent_target(price, self.params.take_profit_pct, true));
            if self.risk.check_risk(&signal) {
                signals.push(signal);
            } else {
                debug!(strategy = self.name(), "buy setup failed the risk-reward gate");
            }
        } else if sell_score >= 3 {
            let signal = Signal::sell(
                market.symbol,
                price,
                self.name(),
                sell_score as f64 / 5.0,
                market.interval,
            )
            .with_stop_loss(self.risk.percent_stop(price, self.params.stop_loss_pct, false))
            .with_take_profit(self.risk.percent_target(price, self.params.take_profit_pct, false));
            if self.risk.check_risk(&signal) {
                signals.push(signal);
            }
        }
        Ok(signals)
    }
}
