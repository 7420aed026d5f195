//! Engine facade: one object wiring strategies, stores, scheduling and
//! backtesting together for the hosting application

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::backtest::{BacktestRequest, BacktestResult, Backtester};
use crate::config::EngineConfig;
use crate::data::{CandleSeries, CandleSource, Interval};
use crate::error::{EngineError, Result};
use crate::scheduler::{MonitorTask, SignalScheduler, TaskRun, TaskStore};
use crate::signal::{aggregate, Signal, SignalStore};
use crate::strategy::{
    ai::LlmClient, build_strategy, AnalysisContext, MarketView, RunOutcome, StrategyInfo,
    StrategyRegistry,
};

/// Result of an on-demand strategy run.
#[derive(Debug)]
pub struct StrategyRun {
    pub strategy: String,
    pub symbol: String,
    pub interval: Interval,
    /// Indicator/pattern values the strategy computed; absent for the AI
    /// strategy and for failed runs.
    pub context: Option<AnalysisContext>,
    /// Every signal the strategy emitted, unfiltered.
    pub signals: Vec<Signal>,
    /// Combined decision, when the emitted signals support one.
    pub decision: Option<Signal>,
    /// Failure reason when the run degraded to no-signal.
    pub failure: Option<String>,
}

/// The signal engine.
///
/// Owns the strategy registry, the signal and task stores, the backtester
/// and the scheduler. The hosting application supplies the candle source
/// and, optionally, an LLM client for the AI strategy.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn CandleSource>,
    signals: Arc<SignalStore>,
    tasks: Arc<TaskStore>,
    backtester: Backtester,
    scheduler: SignalScheduler,
}

impl Engine {
    /// Engine with the default strategy set, persisting under `data_dir`.
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn CandleSource>,
        llm: Option<Box<dyn LlmClient>>,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        let registry = Arc::new(StrategyRegistry::with_defaults(&config, llm));
        Self::with_registry(config, registry, source, data_dir)
    }

    /// Engine with a caller-assembled registry, for custom strategy sets.
    pub fn with_registry(
        config: EngineConfig,
        registry: Arc<StrategyRegistry>,
        source: Arc<dyn CandleSource>,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        let data_dir: PathBuf = data_dir.as_ref().to_path_buf();
        let signals = Arc::new(SignalStore::new(data_dir.join("signals.json")));
        let tasks = Arc::new(TaskStore::new(data_dir.join("tasks.json")));
        let backtester = Backtester::from_config(&config);
        let scheduler = SignalScheduler::new(
            Arc::clone(&tasks),
            Arc::clone(&registry),
            Arc::clone(&source),
            Arc::clone(&signals),
            config.aggregator.clone(),
            config.candle_limit,
        );
        info!(data_dir = %data_dir.display(), "engine assembled");
        Self {
            config,
            registry,
            source,
            signals,
            tasks,
            backtester,
            scheduler,
        }
    }

    pub fn list_strategies(&self) -> Vec<StrategyInfo> {
        self.registry.list()
    }

    /// Fetch fresh candles and run one strategy on demand. Nothing is
    /// persisted; the scheduler owns the signal log.
    pub async fn run_strategy(
        &self,
        strategy: &str,
        symbol: &str,
        interval: Interval,
    ) -> Result<StrategyRun> {
        if !self.registry.contains(strategy) {
            return Err(EngineError::UnknownStrategy(strategy.to_string()));
        }
        let series = CandleSeries::from_vec(
            self.source
                .get_candles(symbol, interval, self.config.candle_limit)
                .await?,
        );
        let market = MarketView::new(symbol, interval, series.candles());
        let (context, outcome) = self.registry.run_with_context(strategy, &market).await?;

        let (signals, failure) = match outcome {
            RunOutcome::SignalsProduced(signals) => (signals, None),
            RunOutcome::NoSignal => (Vec::new(), None),
            RunOutcome::Failed(reason) => (Vec::new(), Some(reason)),
        };
        let decision = aggregate(&signals, &self.config.aggregator);
        Ok(StrategyRun {
            strategy: strategy.to_string(),
            symbol: symbol.to_string(),
            interval,
            context,
            signals,
            decision,
            failure,
        })
    }

    /// Query the persisted signal log, newest first.
    pub fn get_signals(
        &self,
        symbol: Option<&str>,
        strategy: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Signal>> {
        self.signals.query(symbol, strategy, limit)
    }

    /// Replay a strategy over historical candles.
    ///
    /// Only the synchronous strategies can be replayed; the AI strategy has
    /// no deterministic history to step through. When the request carries
    /// parameter overrides, a fresh strategy instance is built for this run.
    pub async fn run_backtest(&self, request: &BacktestRequest) -> Result<BacktestResult> {
        let override_strategy = match &request.params {
            Some(params) => Some(build_strategy(
                &request.strategy,
                params.clone(),
                self.config.risk.clone(),
            )?),
            None => None,
        };
        let strategy = match &override_strategy {
            Some(s) => s.as_ref(),
            None => self
                .registry
                .get(&request.strategy)
                .ok_or_else(|| EngineError::UnknownStrategy(request.strategy.clone()))?,
        };

        let mut series = CandleSeries::from_vec(
            self.source
                .get_candles(&request.symbol, request.interval, request.candle_limit)
                .await?,
        );
        if request.start.is_some() || request.end.is_some() {
            series = series.slice_window(
                request.start.unwrap_or(DateTime::<Utc>::MIN_UTC),
                request.end.unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
        }
        self.backtester.run(
            strategy,
            &request.symbol,
            request.interval,
            series.candles(),
            request.initial_capital,
        )
    }

    /// Register a new monitor task. The strategy must exist.
    pub fn add_task(
        &self,
        symbol: impl Into<String>,
        strategy: impl Into<String>,
        interval: Interval,
    ) -> Result<MonitorTask> {
        let strategy = strategy.into();
        if !self.registry.contains(&strategy) {
            return Err(EngineError::UnknownStrategy(strategy));
        }
        self.tasks.add(MonitorTask::new(symbol, strategy, interval))
    }

    pub fn list_tasks(&self) -> Result<Vec<MonitorTask>> {
        self.tasks.list()
    }

    pub fn get_task(&self, id: Uuid) -> Result<MonitorTask> {
        self.tasks.get(id)
    }

    pub fn remove_task(&self, id: Uuid) -> Result<()> {
        self.tasks.remove(id)
    }

    pub fn set_task_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        self.tasks.set_enabled(id, enabled)
    }

    /// Execute one task immediately, ignoring its schedule.
    pub async fn run_task(&self, id: Uuid) -> Result<TaskRun> {
        self.scheduler.run_task_now(id).await
    }

    /// Drive the scheduler loop. Runs until the enclosing task is dropped;
    /// spawn it on the runtime the hosting application owns.
    pub async fn run_scheduler(&self) {
        self.scheduler.run().await;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
