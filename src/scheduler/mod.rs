//! Periodic monitor task execution
//!
//! The scheduler wakes on a fixed tick, runs every enabled task whose candle
//! interval has elapsed since its last run, and appends any resulting
//! non-HOLD signals to the signal store. A failing task is logged and its
//! `last_run` still advances; the other tasks in the same tick are
//! unaffected.

pub mod task;

pub use task::{MonitorTask, TaskStore};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::data::CandleSource;
use crate::error::Result;
use crate::signal::{aggregate, AggregatorConfig, Signal, SignalStore, SignalType};
use crate::strategy::{MarketView, RunOutcome, StrategyRegistry};

const TICK_SECS: u64 = 60;

/// Outcome of a single task execution.
#[derive(Debug)]
pub struct TaskRun {
    pub task_id: Uuid,
    /// Signals persisted to the store, newest decision first.
    pub stored: Vec<Signal>,
    /// Combined decision across the strategy's signals, if any were emitted.
    pub decision: Option<Signal>,
}

/// Runs monitor tasks against live candle data on a fixed tick.
pub struct SignalScheduler {
    tasks: Arc<TaskStore>,
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn CandleSource>,
    signals: Arc<SignalStore>,
    aggregator: AggregatorConfig,
    candle_limit: usize,
    tick: StdDuration,
}

impl SignalScheduler {
    pub fn new(
        tasks: Arc<TaskStore>,
        registry: Arc<StrategyRegistry>,
        source: Arc<dyn CandleSource>,
        signals: Arc<SignalStore>,
        aggregator: AggregatorConfig,
        candle_limit: usize,
    ) -> Self {
        Self {
            tasks,
            registry,
            source,
            signals,
            aggregator,
            candle_limit,
            tick: StdDuration::from_secs(TICK_SECS),
        }
    }

    pub fn with_tick(mut self, tick: StdDuration) -> Self {
        self.tick = tick;
        self
    }

    /// Run the scheduling loop until the enclosing task is dropped.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick_secs = self.tick.as_secs(), "scheduler started");
        loop {
            interval.tick().await;
            if let Err(e) = self.run_due_tasks().await {
                error!(error = %e, "scheduler tick failed to read the task list");
            }
        }
    }

    /// Execute every enabled, due task once. Per-task failures are isolated.
    pub async fn run_due_tasks(&self) -> Result<Vec<TaskRun>> {
        self.run_due_tasks_at(Utc::now()).await
    }

    pub async fn run_due_tasks_at(&self, now: DateTime<Utc>) -> Result<Vec<TaskRun>> {
        let mut runs = Vec::new();
        for task in self.tasks.list()? {
            if !task.enabled || !task.is_due(now) {
                continue;
            }
            match self.execute(&task, now).await {
                Ok(run) => runs.push(run),
                Err(e) => {
                    error!(task = %task.id, symbol = %task.symbol, error = %e, "task run failed");
                }
            }
        }
        Ok(runs)
    }

    /// Run one task immediately, ignoring its due time.
    pub async fn run_task_now(&self, id: Uuid) -> Result<TaskRun> {
        let task = self.tasks.get(id)?;
        self.execute(&task, Utc::now()).await
    }

    /// Fetch candles, run the strategy, persist non-HOLD signals and record
    /// the run on the task. `last_run` advances even when the strategy
    /// fails, so a broken task cannot hot-loop.
    async fn execute(&self, task: &MonitorTask, now: DateTime<Utc>) -> Result<TaskRun> {
        let outcome = match self
            .source
            .get_candles(&task.symbol, task.interval, self.candle_limit)
            .await
        {
            Ok(candles) => {
                let market = MarketView::new(&task.symbol, task.interval, &candles);
                match self.registry.run(&task.strategy, &market).await {
                    Ok(outcome) => outcome,
                    // covers strategy names no longer in the registry; the
                    // task keeps its cadence instead of re-firing every tick
                    Err(e) => {
                        error!(task = %task.id, strategy = %task.strategy, error = %e, "strategy dispatch failed");
                        RunOutcome::Failed(e.to_string())
                    }
                }
            }
            Err(e) => {
                error!(task = %task.id, symbol = %task.symbol, error = %e, "candle fetch failed");
                RunOutcome::Failed(e.to_string())
            }
        };

        let emitted = match outcome {
            RunOutcome::SignalsProduced(signals) => signals,
            RunOutcome::NoSignal => Vec::new(),
            RunOutcome::Failed(reason) => {
                debug!(task = %task.id, reason, "run recorded as failed");
                Vec::new()
            }
        };

        let decision = aggregate(&emitted, &self.aggregator);
        let stored: Vec<Signal> = emitted
            .into_iter()
            .filter(|s| s.signal_type != SignalType::Hold)
            .collect();
        // a failed append loses the signals but never goes unrecorded: the
        // task still advances so it cannot hot-loop, and the error surfaces
        // to the caller
        let append_err = if stored.is_empty() {
            None
        } else {
            self.signals.append_at(&stored, now).err()
        };
        if let Some(e) = &append_err {
            error!(task = %task.id, error = %e, "signal append failed, signals lost");
        }

        let mut updated = task.clone();
        updated.last_run = Some(now);
        updated.last_signal = Some(
            stored
                .first()
                .map_or_else(|| "HOLD".to_string(), |s| s.signal_type.to_string()),
        );
        self.tasks.update(&updated)?;
        if let Some(e) = append_err {
            return Err(e);
        }

        info!(
            task = %task.id,
            symbol = %task.symbol,
            strategy = %task.strategy,
            stored = stored.len(),
            "task run complete"
        );
        Ok(TaskRun {
            task_id: task.id,
            stored,
            decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::data::{Candle, Interval, StaticCandleSource};
    use crate::error::EngineError;
    use crate::strategy::{AnalysisContext, Strategy};
    use chrono::Duration;

    struct AlwaysBuy;

    impl Strategy for AlwaysBuy {
        fn name(&self) -> &str {
            "AlwaysBuy"
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
            let price = market.last_close().unwrap_or(100.0);
            Ok(vec![Signal::buy(market.symbol, price, "AlwaysBuy", 0.9, market.interval)
                .with_stop_loss(price * 0.95)
                .with_take_profit(price * 1.15)])
        }
    }

    struct AlwaysFails;

    impl Strategy for AlwaysFails {
        fn name(&self) -> &str {
            "AlwaysFails"
        }
        fn description(&self) -> &str {
            "test fixture"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        fn analyze(&self, _market: &MarketView<'_>) -> Result<AnalysisContext> {
            Err(EngineError::strategy("AlwaysFails", "broken on purpose"))
        }
        fn generate_signals(
            &self,
            _market: &MarketView<'_>,
            _context: &AnalysisContext,
        ) -> Result<Vec<Signal>> {
            Ok(vec![])
        }
    }

    fn flat_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i % 5) as f64 * 0.1;
                Candle::new(Utc::now(), c, c + 0.5, c - 0.5, c, 1_000.0)
            })
            .collect()
    }

    fn scheduler_fixture(tag: &str) -> (SignalScheduler, Arc<TaskStore>, Arc<SignalStore>) {
        let dir = std::env::temp_dir().join(format!("scheduler-{tag}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut registry = StrategyRegistry::with_defaults(&EngineConfig::default(), None);
        registry.register(Box::new(AlwaysBuy));
        registry.register(Box::new(AlwaysFails));

        let mut source = StaticCandleSource::new();
        source.insert("BTC/USDT", flat_candles(50));

        let tasks = Arc::new(TaskStore::new(dir.join("tasks.json")));
        let signals = Arc::new(SignalStore::new(dir.join("signals.json")));
        let scheduler = SignalScheduler::new(
            Arc::clone(&tasks),
            Arc::new(registry),
            Arc::new(source),
            Arc::clone(&signals),
            AggregatorConfig::default(),
            50,
        );
        (scheduler, tasks, signals)
    }

    #[tokio::test]
    async fn test_due_task_stores_signal_and_updates_state() {
        let (scheduler, tasks, signals) = scheduler_fixture("stores");
        let task = tasks
            .add(MonitorTask::new("BTC/USDT", "AlwaysBuy", Interval::H1))
            .unwrap();

        let runs = scheduler.run_due_tasks().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].stored.len(), 1);

        let stored = signals.query(Some("BTC/USDT"), None, 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].signal_type, SignalType::Buy);

        let updated = tasks.get(task.id).unwrap();
        assert!(updated.last_run.is_some());
        assert_eq!(updated.last_signal.as_deref(), Some("BUY"));
    }

    #[tokio::test]
    async fn test_not_due_task_is_skipped() {
        let (scheduler, tasks, _) = scheduler_fixture("skip");
        let mut task = MonitorTask::new("BTC/USDT", "AlwaysBuy", Interval::H1);
        task.last_run = Some(Utc::now() - Duration::minutes(5));
        tasks.add(task).unwrap();

        let runs = scheduler.run_due_tasks().await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn test_failing_task_does_not_block_others() {
        let (scheduler, tasks, signals) = scheduler_fixture("isolation");
        let failing = tasks
            .add(MonitorTask::new("BTC/USDT", "AlwaysFails", Interval::H1))
            .unwrap();
        tasks
            .add(MonitorTask::new("BTC/USDT", "AlwaysBuy", Interval::H1))
            .unwrap();

        let runs = scheduler.run_due_tasks().await.unwrap();
        // the failing strategy is a Failed outcome, not an error: both run
        assert_eq!(runs.len(), 2);

        let stored = signals.query(None, None, 10).unwrap();
        assert_eq!(stored.len(), 1);

        let failed_task = tasks.get(failing.id).unwrap();
        assert!(failed_task.last_run.is_some());
        assert_eq!(failed_task.last_signal.as_deref(), Some("HOLD"));
    }

    #[tokio::test]
    async fn test_missing_symbol_is_isolated() {
        let (scheduler, tasks, _) = scheduler_fixture("missing-symbol");
        tasks
            .add(MonitorTask::new("DOGE/USDT", "AlwaysBuy", Interval::H1))
            .unwrap();
        // the fetch fails, the run degrades to no-signal
        let runs = scheduler.run_due_tasks().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].stored.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_strategy_keeps_cadence() {
        let (scheduler, tasks, _) = scheduler_fixture("unregistered");
        // written to the store out-of-band, bypassing facade validation
        let task = tasks
            .add(MonitorTask::new("BTC/USDT", "Retired", Interval::H1))
            .unwrap();

        let runs = scheduler.run_due_tasks().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].stored.is_empty());

        let updated = tasks.get(task.id).unwrap();
        assert!(updated.last_run.is_some());
        assert_eq!(updated.last_signal.as_deref(), Some("HOLD"));
        assert!(!updated.is_due(Utc::now()));
    }

    #[tokio::test]
    async fn test_run_task_now_ignores_due_time() {
        let (scheduler, tasks, _) = scheduler_fixture("run-now");
        let mut task = MonitorTask::new("BTC/USDT", "AlwaysBuy", Interval::H1);
        task.last_run = Some(Utc::now());
        let task = tasks.add(task).unwrap();

        let run = scheduler.run_task_now(task.id).await.unwrap();
        assert_eq!(run.stored.len(), 1);

        let missing = scheduler.run_task_now(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(EngineError::UnknownTask(_))));
    }

    #[tokio::test]
    async fn test_disabled_task_never_runs() {
        let (scheduler, tasks, _) = scheduler_fixture("disabled");
        let task = tasks
            .add(MonitorTask::new("BTC/USDT", "AlwaysBuy", Interval::H1))
            .unwrap();
        tasks.set_enabled(task.id, false).unwrap();

        let runs = scheduler.run_due_tasks().await.unwrap();
        assert!(runs.is_empty());
    }
}
