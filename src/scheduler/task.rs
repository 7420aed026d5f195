//! Monitor task definitions and their JSON-file store

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::data::Interval;
use crate::error::{EngineError, Result};

/// A scheduled symbol/strategy monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorTask {
    pub id: Uuid,
    pub symbol: String,
    pub strategy: String,
    pub interval: Interval,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    /// Signal type of the most recent run, "HOLD" when it produced nothing.
    pub last_signal: Option<String>,
}

impl MonitorTask {
    pub fn new(symbol: impl Into<String>, strategy: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            strategy: strategy.into(),
            interval,
            enabled: true,
            created_at: Utc::now(),
            last_run: None,
            last_signal: None,
        }
    }

    /// A task is due once a full candle interval has passed since its last
    /// run. A task that has never run is due immediately.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.interval.as_secs() as i64,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskDocument {
    tasks: Vec<MonitorTask>,
}

/// Persistent monitor-task store backed by a single JSON file.
///
/// Same write discipline as the signal store: temp file plus atomic rename,
/// with a mutex serializing access.
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn add(&self, task: MonitorTask) -> Result<MonitorTask> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut doc = self.read_document()?;
        doc.tasks.push(task.clone());
        self.write_document(&doc)?;
        info!(task = %task.id, symbol = %task.symbol, strategy = %task.strategy, "monitor task added");
        Ok(task)
    }

    pub fn list(&self) -> Result<Vec<MonitorTask>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.read_document()?.tasks)
    }

    pub fn get(&self, id: Uuid) -> Result<MonitorTask> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        self.read_document()?
            .tasks
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::UnknownTask(id.to_string()))
    }

    /// Replace the stored task with the same id.
    pub fn update(&self, task: &MonitorTask) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut doc = self.read_document()?;
        let slot = doc
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| EngineError::UnknownTask(task.id.to_string()))?;
        *slot = task.clone();
        self.write_document(&doc)
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut doc = self.read_document()?;
        let before = doc.tasks.len();
        doc.tasks.retain(|t| t.id != id);
        if doc.tasks.len() == before {
            return Err(EngineError::UnknownTask(id.to_string()));
        }
        self.write_document(&doc)?;
        info!(task = %id, "monitor task removed");
        Ok(())
    }

    pub fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut doc = self.read_document()?;
        let task = doc
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::UnknownTask(id.to_string()))?;
        task.enabled = enabled;
        self.write_document(&doc)
    }

    fn read_document(&self) -> Result<TaskDocument> {
        if !self.path.exists() {
            return Ok(TaskDocument::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_document(&self, doc: &TaskDocument) -> Result<()> {
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
    EngineError::Persistence("task store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_store(tag: &str) -> TaskStore {
        let dir = std::env::temp_dir().join(format!("task-store-{tag}-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        TaskStore::new(dir.join("tasks.json"))
    }

    #[test]
    fn test_crud_round_trip() {
        let store = temp_store("crud");
        let task = store
            .add(MonitorTask::new("BTC/USDT", "TrendFollowing", Interval::H1))
            .unwrap();

        let mut loaded = store.get(task.id).unwrap();
        assert_eq!(loaded.symbol, "BTC/USDT");
        assert!(loaded.enabled);

        loaded.last_signal = Some("BUY".to_string());
        store.update(&loaded).unwrap();
        assert_eq!(store.get(task.id).unwrap().last_signal.as_deref(), Some("BUY"));

        store.remove(task.id).unwrap();
        assert!(matches!(
            store.get(task.id),
            Err(EngineError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_unknown_id_errors() {
        let store = temp_store("unknown");
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id), Err(EngineError::UnknownTask(_))));
        assert!(matches!(store.remove(id), Err(EngineError::UnknownTask(_))));
        assert!(matches!(
            store.set_enabled(id, false),
            Err(EngineError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_due_logic() {
        let now = Utc::now();
        let mut task = MonitorTask::new("BTC/USDT", "Momentum", Interval::H1);
        assert!(task.is_due(now));

        task.last_run = Some(now - Duration::minutes(30));
        assert!(!task.is_due(now));

        task.last_run = Some(now - Duration::minutes(61));
        assert!(task.is_due(now));
    }

    #[test]
    fn test_disable_persists() {
        let store = temp_store("disable");
        let task = store
            .add(MonitorTask::new("ETH/USDT", "Momentum", Interval::M15))
            .unwrap();
        store.set_enabled(task.id, false).unwrap();
        assert!(!store.get(task.id).unwrap().enabled);
    }
}
