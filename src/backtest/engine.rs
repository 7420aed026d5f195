//! Historical replay of a strategy over a candle series
//!
//! The replay is strictly causal: at candle `i` the strategy sees only
//! candles `0..=i`, and any signal it emits fills at the open of candle
//! `i + 1`. One position at a time; stops are checked before targets, so a
//! candle that touches both resolves pessimistically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backtest::metrics::{compute_metrics, BacktestMetrics};
use crate::backtest::rating::{rate, Rating, RatingWeights};
use crate::config::{EngineConfig, RiskPolicy};
use crate::data::{Candle, Interval};
use crate::error::{EngineError, Result};
use crate::signal::{Signal, SignalType};
use crate::strategy::{MarketView, Strategy, StrategyRegistry};

/// Parameters of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub symbol: String,
    pub strategy: String,
    pub interval: Interval,
    pub initial_capital: f64,
    /// Candles to fetch for the replay.
    pub candle_limit: usize,
    /// Inclusive replay window bounds; `None` means unbounded.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Per-request strategy parameter overrides; omitted fields keep the
    /// strategy's defaults.
    pub params: Option<serde_json::Value>,
}

impl BacktestRequest {
    pub fn new(symbol: impl Into<String>, strategy: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            strategy: strategy.into(),
            interval,
            initial_capital: 10_000.0,
            candle_limit: 1_000,
            start: None,
            end: None,
            params: None,
        }
    }
}

/// One closed round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub side: SignalType,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
}

/// Outcome of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub interval: Interval,
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Mark-to-market equity, one `(time, value)` point per candle.
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub trades: Vec<Trade>,
    pub metrics: BacktestMetrics,
    pub rating: Rating,
}

struct OpenPosition {
    side: SignalType,
    entry_time: DateTime<Utc>,
    entry_price: f64,
    size: f64,
    stop: f64,
    target: Option<f64>,
}

impl OpenPosition {
    fn unrealized(&self, price: f64) -> f64 {
        match self.side {
            SignalType::Buy => (price - self.entry_price) * self.size,
            SignalType::Sell => (self.entry_price - price) * self.size,
            SignalType::Hold => 0.0,
        }
    }

    fn close(&self, exit_price: f64, exit_time: DateTime<Utc>) -> Trade {
        Trade {
            side: self.side,
            entry_time: self.entry_time,
            exit_time,
            entry_price: self.entry_price,
            exit_price,
            size: self.size,
            pnl: self.unrealized(exit_price),
        }
    }

    /// Intrabar exit price on this candle, if any.
    fn exit_price(&self, candle: &Candle) -> Option<f64> {
        match self.side {
            SignalType::Buy => {
                if candle.low <= self.stop {
                    Some(self.stop)
                } else {
                    self.target.filter(|&t| candle.high >= t)
                }
            }
            SignalType::Sell => {
                if candle.high >= self.stop {
                    Some(self.stop)
                } else {
                    self.target.filter(|&t| candle.low <= t)
                }
            }
            SignalType::Hold => None,
        }
    }
}

/// Replays a strategy over historical candles and scores the result.
pub struct Backtester {
    risk: RiskPolicy,
    rating_weights: RatingWeights,
    /// Candles to accumulate before the strategy is first consulted.
    warmup: usize,
}

impl Default for Backtester {
    fn default() -> Self {
        Self {
            risk: RiskPolicy::default(),
            rating_weights: RatingWeights::default(),
            warmup: 50,
        }
    }
}

impl Backtester {
    pub fn new(risk: RiskPolicy, rating_weights: RatingWeights) -> Self {
        Self {
            risk,
            rating_weights,
            warmup: 50,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.risk.clone(), config.rating_weights.clone())
    }

    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    /// Run the replay. `candles` must be ordered ascending by timestamp.
    pub fn run(
        &self,
        strategy: &dyn Strategy,
        symbol: &str,
        interval: Interval,
        candles: &[Candle],
        initial_capital: f64,
    ) -> Result<BacktestResult> {
        if candles.is_empty() {
            return Err(EngineError::data(symbol, "no candles to backtest"));
        }
        if initial_capital <= 0.0 {
            return Err(EngineError::data(symbol, "initial capital must be positive"));
        }

        let mut cash = initial_capital;
        let mut equity_curve: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(candles.len());
        let mut trades: Vec<Trade> = Vec::new();
        let mut position: Option<OpenPosition> = None;
        let mut pending: Option<Signal> = None;

        for (i, candle) in candles.iter().enumerate() {
            if let Some(signal) = pending.take() {
                position = self.open_position(&signal, candle, cash);
            }

            if let Some(pos) = &position {
                if let Some(exit_price) = pos.exit_price(candle) {
                    let trade = pos.close(exit_price, candle.timestamp);
                    cash += trade.pnl;
                    debug!(
                        side = %trade.side,
                        pnl = trade.pnl,
                        "position closed"
                    );
                    trades.push(trade);
                    position = None;
                }
            }

            let unrealized = position.as_ref().map_or(0.0, |p| p.unrealized(candle.close));
            equity_curve.push((candle.timestamp, cash + unrealized));

            // consult the strategy only when flat, and never on the last
            // candle (there is no next open to fill at)
            if position.is_none() && i + 1 < candles.len() && i + 1 >= self.warmup {
                let view = MarketView::new(symbol, interval, &candles[..=i]);
                match StrategyRegistry::run_sync(strategy, &view) {
                    Ok((_, signals)) => {
                        pending = signals
                            .into_iter()
                            .find(|s| s.signal_type != SignalType::Hold && s.stop_loss.is_some());
                    }
                    Err(e) => {
                        debug!(index = i, error = %e, "strategy skipped this candle");
                    }
                }
            }
        }

        // still holding at the end of the series: settle at the final close
        if let (Some(pos), Some(last)) = (position.take(), candles.last()) {
            let trade = pos.close(last.close, last.timestamp);
            cash += trade.pnl;
            trades.push(trade);
            if let Some((_, e)) = equity_curve.last_mut() {
                *e = cash;
            }
        }

        let values: Vec<f64> = equity_curve.iter().map(|&(_, v)| v).collect();
        let metrics = compute_metrics(&values, &trades, interval);
        let rating = rate(&metrics, &self.rating_weights);
        Ok(BacktestResult {
            symbol: symbol.to_string(),
            strategy: strategy.name().to_string(),
            interval,
            initial_capital,
            final_capital: cash,
            equity_curve,
            trades,
            metrics,
            rating,
        })
    }

    /// Fill a signal at this candle's open, sized by the risk policy.
    fn open_position(&self, signal: &Signal, candle: &Candle, cash: f64) -> Option<OpenPosition> {
        let stop = signal.stop_loss?;
        let entry = candle.open;
        // a gap through the stop invalidates the setup
        let gapped = match signal.signal_type {
            SignalType::Buy => entry <= stop,
            SignalType::Sell => entry >= stop,
            SignalType::Hold => true,
        };
        if gapped {
            debug!(symbol = %signal.symbol, "entry gapped through the stop, skipped");
            return None;
        }

        let size = self.risk.position_size(cash, entry, stop);
        // never commit more notional than the account holds
        let size = size.min(cash / entry);
        if !size.is_finite() || size <= 0.0 {
            return None;
        }
        Some(OpenPosition {
            side: signal.signal_type,
            entry_time: candle.timestamp,
            entry_price: entry,
            size,
            stop,
            target: signal.take_profit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::strategy::AnalysisContext;
    use chrono::{Duration, TimeZone};

    /// Fires one signal when exactly `at_len` candles are visible.
    struct ScriptedStrategy {
        at_len: usize,
        side: SignalType,
        stop: f64,
        target: f64,
    }

    impl Strategy for ScriptedStrategy {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn description(&self) -> &str {
            "test fixture"
        }

        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({})
        }

        fn analyze(&self, _market: &MarketView<'_>) -> Result<AnalysisContext> {
            Ok(AnalysisContext::new())
        }

        fn generate_signals(
            &self,
            market: &MarketView<'_>,
            _context: &AnalysisContext,
        ) -> Result<Vec<Signal>> {
            if market.candles.len() != self.at_len {
                return Ok(vec![]);
            }
            let price = market.last_close().unwrap();
            let signal = match self.side {
                SignalType::Buy => Signal::buy(market.symbol, price, "Scripted", 0.9, market.interval),
                _ => Signal::sell(market.symbol, price, "Scripted", 0.9, market.interval),
            }
            .with_stop_loss(self.stop)
            .with_take_profit(self.target);
            Ok(vec![signal])
        }
    }

    struct SilentStrategy;

    impl Strategy for SilentStrategy {
        fn name(&self) -> &str {
            "Silent"
        }

        fn description(&self) -> &str {
            "never signals"
        }

        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({})
        }

        fn analyze(&self, _market: &MarketView<'_>) -> Result<AnalysisContext> {
            Ok(AnalysisContext::new())
        }

        fn generate_signals(
            &self,
            _market: &MarketView<'_>,
            _context: &AnalysisContext,
        ) -> Result<Vec<Signal>> {
            Ok(vec![])
        }
    }

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new(
                    start + Duration::hours(i as i64),
                    c,
                    c + 1.0,
                    c - 1.0,
                    c,
                    1_000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_no_signals_means_flat_equity() {
        let candles = candles_from_closes(&vec![100.0; 80]);
        let backtester = Backtester::default().with_warmup(10);
        let result = backtester
            .run(&SilentStrategy, "BTC/USDT", Interval::H1, &candles, 10_000.0)
            .unwrap();
        assert_eq!(result.trades.len(), 0);
        assert_eq!(result.final_capital, 10_000.0);
        assert!(result.equity_curve.iter().all(|&(_, e)| e == 10_000.0));
        assert_eq!(result.metrics.total_trades, 0);
    }

    #[test]
    fn test_target_exit_realizes_profit() {
        // flat at 100, then a climb through the 110 target
        let mut closes = vec![100.0; 20];
        closes.extend((1..=15).map(|i| 100.0 + i as f64));
        let candles = candles_from_closes(&closes);
        let strategy = ScriptedStrategy {
            at_len: 20,
            side: SignalType::Buy,
            stop: 95.0,
            target: 110.0,
        };
        let backtester = Backtester::default().with_warmup(5);
        let result = backtester
            .run(&strategy, "BTC/USDT", Interval::H1, &candles, 10_000.0)
            .unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        // entry at the open of candle 20 (101.0), exit at the 110 target
        assert_eq!(trade.entry_price, 101.0);
        assert_eq!(trade.exit_price, 110.0);
        assert!(trade.pnl > 0.0);
        assert!(result.final_capital > result.initial_capital);
        assert!(result.equity_curve.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(result.equity_curve[0].1, result.initial_capital);
    }

    #[test]
    fn test_stop_exit_realizes_loss() {
        let mut closes = vec![100.0; 20];
        closes.extend((1..=15).map(|i| 100.0 - i as f64));
        let candles = candles_from_closes(&closes);
        let strategy = ScriptedStrategy {
            at_len: 20,
            side: SignalType::Buy,
            stop: 95.0,
            target: 120.0,
        };
        let backtester = Backtester::default().with_warmup(5);
        let result = backtester
            .run(&strategy, "BTC/USDT", Interval::H1, &candles, 10_000.0)
            .unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_price, 95.0);
        assert!(result.trades[0].pnl < 0.0);
        assert!(result.final_capital < result.initial_capital);
        // loss bounded by the risk-per-trade fraction
        assert!(result.initial_capital - result.final_capital <= 10_000.0 * 0.02 + 1e-6);
    }

    #[test]
    fn test_open_position_forced_closed_at_end() {
        // signal near the end, neither stop nor target ever touched
        let closes = vec![100.0; 30];
        let candles = candles_from_closes(&closes);
        let strategy = ScriptedStrategy {
            at_len: 28,
            side: SignalType::Buy,
            stop: 90.0,
            target: 120.0,
        };
        let backtester = Backtester::default().with_warmup(5);
        let result = backtester
            .run(&strategy, "BTC/USDT", Interval::H1, &candles, 10_000.0)
            .unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_price, 100.0);
    }

    #[test]
    fn test_strategy_never_sees_future_candles() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Watcher(AtomicUsize);
        impl Strategy for Watcher {
            fn name(&self) -> &str {
                "Watcher"
            }
            fn description(&self) -> &str {
                "records the largest view it was given"
            }
            fn parameters(&self) -> serde_json::Value {
                serde_json::json!({})
            }
            fn analyze(&self, market: &MarketView<'_>) -> Result<AnalysisContext> {
                self.0.fetch_max(market.candles.len(), Ordering::SeqCst);
                Ok(AnalysisContext::new())
            }
            fn generate_signals(
                &self,
                _market: &MarketView<'_>,
                _context: &AnalysisContext,
            ) -> Result<Vec<Signal>> {
                Ok(vec![])
            }
        }

        let candles = candles_from_closes(&vec![100.0; 40]);
        let watcher = Watcher(AtomicUsize::new(0));
        Backtester::default()
            .with_warmup(5)
            .run(&watcher, "BTC/USDT", Interval::H1, &candles, 10_000.0)
            .unwrap();
        // the last candle has no next open, so the deepest view stops short
        assert_eq!(watcher.0.load(Ordering::SeqCst), 39);
    }

    #[test]
    fn test_empty_series_is_an_error() {
        let backtester = Backtester::default();
        let err = backtester
            .run(&SilentStrategy, "BTC/USDT", Interval::H1, &[], 10_000.0)
            .unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable { .. }));
    }
}
