//! End-to-end scenarios through the engine facade

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use signalcraft::backtest::BacktestRequest;
use signalcraft::config::EngineConfig;
use signalcraft::data::{Candle, Interval, StaticCandleSource};
use signalcraft::engine::Engine;
use signalcraft::signal::{aggregate, AggregatorConfig, Signal, SignalStore, SignalType};

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("signalcraft-it-{tag}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn candles_from_closes(closes: &[f64], volume: f64) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Candle::new(
                start + Duration::hours(i as i64),
                c * 0.995,
                c * 1.01,
                c * 0.99,
                c,
                volume,
            )
        })
        .collect()
}

fn engine_with(symbol: &str, candles: Vec<Candle>, tag: &str) -> Engine {
    let mut source = StaticCandleSource::new();
    source.insert(symbol, candles);
    Engine::new(EngineConfig::default(), Arc::new(source), None, temp_dir(tag))
}

#[tokio::test]
async fn uptrend_produces_a_valid_buy() {
    let closes: Vec<f64> = (0..250).map(|i| 100.0 + i as f64 * 2.0).collect();
    let engine = engine_with("BTC/USDT", candles_from_closes(&closes, 1_000.0), "uptrend");

    let run = engine
        .run_strategy("TrendFollowing", "BTC/USDT", Interval::H1)
        .await
        .unwrap();
    assert!(run.context.is_some());
    assert_eq!(run.signals.len(), 1);
    let signal = &run.signals[0];
    assert_eq!(signal.signal_type, SignalType::Buy);
    assert!(signal.validate().is_ok());
    assert!(signal.stop_loss.unwrap() < signal.entry_price);
    assert!(signal.take_profit.unwrap() > signal.entry_price);
    assert!(signal.risk_reward_ratio().unwrap() >= 2.0);
}

#[tokio::test]
async fn band_blowout_with_hot_rsi_sells() {
    // a quiet range, then five strong up candles: close above the upper
    // Bollinger Band with RSI deep in overbought territory
    let mut closes: Vec<f64> = (0..40)
        .map(|i| if i % 2 == 0 { 99.8 } else { 100.2 })
        .collect();
    closes.extend([103.0, 106.0, 109.0, 112.0, 115.0]);
    let engine = engine_with("BTC/USDT", candles_from_closes(&closes, 1_000.0), "blowout");

    let run = engine
        .run_strategy("MeanReversion", "BTC/USDT", Interval::H1)
        .await
        .unwrap();
    assert_eq!(run.signals.len(), 1);
    let signal = &run.signals[0];
    assert_eq!(signal.signal_type, SignalType::Sell);
    // reverts toward the middle band, below the entry
    assert!(signal.take_profit.unwrap() < signal.entry_price);
}

#[tokio::test]
async fn quiet_range_produces_nothing() {
    let closes: Vec<f64> = (0..100)
        .map(|i| if i % 2 == 0 { 99.8 } else { 100.2 })
        .collect();
    let engine = engine_with("BTC/USDT", candles_from_closes(&closes, 1_000.0), "quiet");

    let run = engine
        .run_strategy("MeanReversion", "BTC/USDT", Interval::H1)
        .await
        .unwrap();
    assert!(run.signals.is_empty());
    assert!(run.decision.is_none());
}

#[test]
fn store_enforces_cap_and_ttl() {
    let dir = temp_dir("store");
    let store = SignalStore::new(dir.join("signals.json"));
    let now = Utc::now();

    let signals: Vec<Signal> = (0..600)
        .map(|i| {
            let mut s = Signal::buy("BTC/USDT", 100.0, "test", 0.8, Interval::H1);
            s.timestamp = now - Duration::minutes(i);
            s
        })
        .collect();
    store.append_at(&signals, now).unwrap();

    let kept = store.query_at(None, None, 1_000, now).unwrap();
    assert_eq!(kept.len(), 500);
    assert_eq!(kept[0].timestamp, now);

    // everything ages out after the 24h TTL
    let later = now + Duration::hours(25);
    assert!(store.query_at(None, None, 1_000, later).unwrap().is_empty());
}

#[tokio::test]
async fn backtest_without_signals_stays_flat() {
    let closes: Vec<f64> = (0..300)
        .map(|i| 100.0 + ((i % 2) as f64) * 0.1)
        .collect();
    let engine = engine_with("BTC/USDT", candles_from_closes(&closes, 1_000.0), "flat-bt");

    let mut request = BacktestRequest::new("BTC/USDT", "TrendFollowing", Interval::H1);
    request.candle_limit = 300;
    let result = engine.run_backtest(&request).await.unwrap();
    assert_eq!(result.metrics.total_trades, 0);
    assert_eq!(result.final_capital, result.initial_capital);
    assert!(result
        .equity_curve
        .iter()
        .all(|&(_, e)| e == result.initial_capital));
    assert_eq!(result.metrics.total_return, 0.0);
}

#[tokio::test]
async fn backtest_trades_an_uptrend() {
    let closes: Vec<f64> = (0..400).map(|i| 100.0 * 1.01f64.powi(i)).collect();
    let engine = engine_with("BTC/USDT", candles_from_closes(&closes, 1_000.0), "trend-bt");

    let mut request = BacktestRequest::new("BTC/USDT", "TrendFollowing", Interval::H1);
    request.candle_limit = 400;
    let result = engine.run_backtest(&request).await.unwrap();
    assert!(!result.trades.is_empty());
    assert_eq!(result.metrics.total_trades, result.trades.len());
    assert_eq!(result.equity_curve.len(), 400);
    // the curve is time-ordered and anchored at the starting capital
    assert!(result.equity_curve.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(result.equity_curve[0].1, result.initial_capital);
    for trade in &result.trades {
        assert!(trade.exit_time >= trade.entry_time);
    }
}

#[tokio::test]
async fn scheduler_persists_signals_through_the_facade() {
    let closes: Vec<f64> = (0..250).map(|i| 100.0 + i as f64 * 2.0).collect();
    let engine = engine_with("BTC/USDT", candles_from_closes(&closes, 1_000.0), "sched");

    let task = engine
        .add_task("BTC/USDT", "TrendFollowing", Interval::H1)
        .unwrap();
    let run = engine.run_task(task.id).await.unwrap();
    assert_eq!(run.stored.len(), 1);

    let stored = engine.get_signals(Some("BTC/USDT"), None, 10).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].signal_type, SignalType::Buy);

    let updated = engine.get_task(task.id).unwrap();
    assert!(updated.last_run.is_some());
    assert_eq!(updated.last_signal.as_deref(), Some("BUY"));
}

#[test]
fn conflicting_strategies_resolve_to_hold() {
    let config = AggregatorConfig::default();
    let buy_a = Signal::buy("BTC/USDT", 100.0, "TrendFollowing", 0.7, Interval::H1);
    let buy_b = Signal::buy("BTC/USDT", 100.0, "Momentum", 0.7, Interval::H1);
    let sell = Signal::sell("BTC/USDT", 100.0, "MeanReversion", 0.7, Interval::H1);

    // evenly matched sides cannot clear the conflict margin
    let decision = aggregate(&[buy_a.clone(), sell.clone()], &config).unwrap();
    assert_eq!(decision.signal_type, SignalType::Hold);

    // the same inputs always resolve the same way
    let again = aggregate(&[buy_a.clone(), sell], &config).unwrap();
    assert_eq!(again.signal_type, decision.signal_type);

    // two supporting buys with no opposition combine into one buy
    let combined = aggregate(&[buy_a, buy_b], &config).unwrap();
    assert_eq!(combined.signal_type, SignalType::Buy);
    assert_eq!(combined.strategy, "aggregate");
}
