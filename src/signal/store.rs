//! JSON-file-backed signal store
//!
//! An append log with a TTL and a size cap, persisted as a single JSON
//! document. Writes go through a temp file and an atomic rename so a crash
//! never leaves a half-written store; a mutex serializes concurrent access.
//! Time is passed in explicitly by the `*_at` methods so expiry is testable;
//! the plain methods use the wall clock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::signal::Signal;

const DEFAULT_TTL_HOURS: i64 = 24;
const DEFAULT_MAX_SIGNALS: usize = 500;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    signals: Vec<Signal>,
}

/// Persistent signal store backed by a single JSON file.
#[derive(Debug)]
pub struct SignalStore {
    path: PathBuf,
    ttl: Duration,
    max_signals: usize,
    lock: Mutex<()>,
}

impl SignalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            max_signals: DEFAULT_MAX_SIGNALS,
            lock: Mutex::new(()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_signals(mut self, max_signals: usize) -> Self {
        self.max_signals = max_signals;
        self
    }

    /// Append signals, enforcing TTL expiry then the size cap.
    pub fn append(&self, signals: &[Signal]) -> Result<usize> {
        self.append_at(signals, Utc::now())
    }

    pub fn append_at(&self, signals: &[Signal], now: DateTime<Utc>) -> Result<usize> {
        if signals.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut doc = self.read_document()?;
        doc.signals.extend_from_slice(signals);
        self.prune(&mut doc, now);
        self.write_document(&doc)?;
        info!(count = signals.len(), path = %self.path.display(), "signals appended");
        Ok(signals.len())
    }

    /// Query signals newest-first with optional symbol/strategy filters.
    /// Expired entries are dropped (and persisted away) before filtering.
    pub fn query(
        &self,
        symbol: Option<&str>,
        strategy: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Signal>> {
        self.query_at(symbol, strategy, limit, Utc::now())
    }

    pub fn query_at(
        &self,
        symbol: Option<&str>,
        strategy: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Signal>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut doc = self.read_document()?;
        let before = doc.signals.len();
        self.prune(&mut doc, now);
        if doc.signals.len() < before {
            debug!(removed = before - doc.signals.len(), "expired signals dropped");
            self.write_document(&doc)?;
        }

        let mut matched: Vec<Signal> = doc
            .signals
            .into_iter()
            .filter(|s| symbol.is_none_or(|sym| s.symbol == sym))
            .filter(|s| strategy.is_none_or(|st| s.strategy == st))
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    /// Drop expired entries, then cut down to the cap keeping the newest.
    fn prune(&self, doc: &mut StoreDocument, now: DateTime<Utc>) {
        doc.signals.retain(|s| s.timestamp + self.ttl > now);
        if doc.signals.len() > self.max_signals {
            doc.signals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            doc.signals.truncate(self.max_signals);
        }
    }

    fn read_document(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the full document via temp file + rename.
    fn write_document(&self, doc: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> EngineError {
    EngineError::Persistence("signal store lock poisoned".to_string())
}
