// Persistence backends for the submission log
//
// A backend stores the whole list. `append` lets a backend persist a single
// new entry more cheaply; the default rewrites everything.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::LogEntry;
use crate::config::{HistoryBackend, HistoryConfig};
use crate::db::Database;
use crate::error::{Error, Result};

pub trait LogStorage: Send {
    /// All persisted entries. A store that was never written yields an empty list.
    fn load(&self) -> Result<Vec<LogEntry>>;

    /// Persist the complete list, newest first.
    fn save(&self, entries: &[LogEntry]) -> Result<()>;

    /// Persist after `entry` was added to `entries` (already trimmed to `capacity`).
    fn append(&self, _entry: &LogEntry, entries: &[LogEntry], _capacity: usize) -> Result<()> {
        self.save(entries)
    }

    fn describe(&self) -> String;
}

/// SQLite-backed store (default)
pub struct SqliteLogStorage {
    db: Database,
}

impl SqliteLogStorage {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::new(path)?;
        db.run_migrations()?;
        Ok(SqliteLogStorage { db })
    }

    pub fn from_database(db: Database) -> Result<Self> {
        db.run_migrations()?;
        Ok(SqliteLogStorage { db })
    }
}

impl LogStorage for SqliteLogStorage {
    fn load(&self) -> Result<Vec<LogEntry>> {
        Ok(self.db.get_log_entries(None)?)
    }

    fn save(&self, entries: &[LogEntry]) -> Result<()> {
        Ok(self.db.replace_log_entries(entries)?)
    }

    fn append(&self, entry: &LogEntry, _entries: &[LogEntry], capacity: usize) -> Result<()> {
        self.db.insert_log_entry(entry)?;
        let removed = self.db.prune_log_entries(capacity)?;
        if removed > 0 {
            tracing::debug!(removed, "evicted old log entries");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "sqlite".to_string()
    }
}

/// The whole log as one JSON array in a file
pub struct JsonFileLogStorage {
    path: PathBuf,
}

impl JsonFileLogStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileLogStorage { path: path.into() }
    }
}

impl LogStorage for JsonFileLogStorage {
    fn load(&self) -> Result<Vec<LogEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &[LogEntry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        // Write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// In-process store. Clones share the same list.
#[derive(Clone, Default)]
pub struct MemoryLogStorage {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl LogStorage for MemoryLogStorage {
    fn load(&self) -> Result<Vec<LogEntry>> {
        Ok(self.snapshot())
    }

    fn save(&self, entries: &[LogEntry]) -> Result<()> {
        let mut stored = self
            .entries
            .lock()
            .map_err(|_| Error::Config("memory log store poisoned".to_string()))?;
        *stored = entries.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Open the backend selected in the config.
pub fn open_storage(config: &HistoryConfig) -> Result<Box<dyn LogStorage>> {
    let path = config.storage_path();
    let storage: Box<dyn LogStorage> = match config.backend {
        HistoryBackend::Sqlite => Box::new(SqliteLogStorage::open(&path)?),
        HistoryBackend::Json => Box::new(JsonFileLogStorage::new(path)),
    };
    tracing::info!(storage = %storage.describe(), "history storage opened");
    Ok(storage)
}
