// Submission log: newest-first list of past prompts and results
//
// - Bounded to the newest `capacity` entries
// - Persisted through a `LogStorage` backend after every append
// - Per-row expand/collapse state lives only in memory

pub mod entry;
pub mod storage;

use serde::Serialize;

pub use entry::{LogEntry, preview};
pub use storage::{JsonFileLogStorage, LogStorage, MemoryLogStorage, SqliteLogStorage, open_storage};

use crate::error::{Error, Result};

/// Characters shown for a collapsed row
pub const PREVIEW_CHARS: usize = 50;

/// A log row as shown in the table
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogRow {
    pub index: usize,
    pub timestamp: String,
    pub input: String,
    pub output: String,
    pub expanded: bool,
    /// True when input or output was cut for the preview
    pub truncated: bool,
}

pub struct SubmissionLog {
    entries: Vec<LogEntry>,
    /// Parallel to `entries`
    expanded: Vec<bool>,
    capacity: usize,
    storage: Box<dyn LogStorage>,
}

impl SubmissionLog {
    /// Load persisted entries. They are re-sorted and trimmed to `capacity`.
    pub fn open(storage: Box<dyn LogStorage>, capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let mut entries = storage.load()?;
        // Stable: equal timestamps keep their stored order
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if entries.len() > capacity {
            tracing::info!(
                stored = entries.len(),
                capacity,
                "stored history exceeds capacity, trimming"
            );
            entries.truncate(capacity);
            storage.save(&entries)?;
        }
        tracing::info!(entries = entries.len(), storage = %storage.describe(), "submission log loaded");

        Ok(SubmissionLog {
            expanded: vec![false; entries.len()],
            entries,
            capacity,
            storage,
        })
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a completed submission stamped with the current local time.
    pub fn append(&mut self, input: impl Into<String>, output: impl Into<String>) -> Result<()> {
        self.append_entry(LogEntry::new(input, output))
    }

    /// Insert keeping descending order, evict beyond capacity, then persist.
    ///
    /// The in-memory list is updated even when persisting fails; the error is
    /// returned so the caller can surface it.
    pub fn append_entry(&mut self, entry: LogEntry) -> Result<()> {
        // Before any entry that is not newer, so ties put the new entry first
        let pos = self.entries.partition_point(|e| e.timestamp > entry.timestamp);
        self.entries.insert(pos, entry.clone());
        self.expanded.insert(pos, false);

        while self.entries.len() > self.capacity {
            self.entries.pop();
            self.expanded.pop();
        }

        self.storage
            .append(&entry, &self.entries, self.capacity)
            .inspect_err(|e| tracing::error!(error = %e, "failed to persist log entry"))
    }

    /// Entries `offset..offset+limit`, clamped to the log
    pub fn page(&self, offset: usize, limit: usize) -> &[LogEntry] {
        let start = offset.min(self.entries.len());
        let end = start.saturating_add(limit).min(self.entries.len());
        &self.entries[start..end]
    }

    /// Table rows for a page; collapsed rows show previews
    pub fn rows(&self, offset: usize, limit: usize) -> Vec<LogRow> {
        self.page(offset, limit)
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let index = offset + i;
                let expanded = self.expanded[index];
                if expanded {
                    LogRow {
                        index,
                        timestamp: entry.display_timestamp(),
                        input: entry.input.clone(),
                        output: entry.output.clone(),
                        expanded,
                        truncated: false,
                    }
                } else {
                    let (input, input_cut) = preview(&entry.input, PREVIEW_CHARS);
                    let (output, output_cut) = preview(&entry.output, PREVIEW_CHARS);
                    LogRow {
                        index,
                        timestamp: entry.display_timestamp(),
                        input,
                        output,
                        expanded,
                        truncated: input_cut || output_cut,
                    }
                }
            })
            .collect()
    }

    pub fn is_expanded(&self, index: usize) -> Result<bool> {
        self.expanded
            .get(index)
            .copied()
            .ok_or(Error::RowOutOfRange { index, len: self.entries.len() })
    }

    pub fn set_expanded(&mut self, index: usize, expanded: bool) -> Result<()> {
        let len = self.entries.len();
        let slot = self
            .expanded
            .get_mut(index)
            .ok_or(Error::RowOutOfRange { index, len })?;
        *slot = expanded;
        Ok(())
    }

    /// Flip a row. Returns the new state.
    pub fn toggle(&mut self, index: usize) -> Result<bool> {
        let expanded = !self.is_expanded(index)?;
        self.set_expanded(index, expanded)?;
        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};

    fn entry_at(minute: u32, input: &str) -> LogEntry {
        LogEntry {
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            input: input.to_string(),
            output: format!("【タイトル】{}", input),
        }
    }

    fn memory_log(capacity: usize) -> (SubmissionLog, MemoryLogStorage) {
        let storage = MemoryLogStorage::new();
        let log = SubmissionLog::open(Box::new(storage.clone()), capacity).unwrap();
        (log, storage)
    }

    fn inputs(log: &SubmissionLog) -> Vec<&str> {
        log.entries().iter().map(|e| e.input.as_str()).collect()
    }

    #[test]
    fn test_append_keeps_descending_order() {
        let (mut log, _) = memory_log(10);
        log.append_entry(entry_at(2, "b")).unwrap();
        log.append_entry(entry_at(5, "e")).unwrap();
        log.append_entry(entry_at(1, "a")).unwrap();
        log.append_entry(entry_at(3, "c")).unwrap();
        assert_eq!(inputs(&log), vec!["e", "c", "b", "a"]);
    }

    #[test]
    fn test_equal_timestamps_newest_first() {
        let (mut log, _) = memory_log(10);
        log.append_entry(entry_at(1, "first")).unwrap();
        log.append_entry(entry_at(1, "second")).unwrap();
        assert_eq!(inputs(&log), vec!["second", "first"]);
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let (mut log, storage) = memory_log(10);
        for i in 0..5 {
            log.append(format!("prompt {}", i), format!("lyrics {}", i)).unwrap();
        }

        let reloaded = SubmissionLog::open(Box::new(storage), 10).unwrap();
        assert_eq!(reloaded.entries(), log.entries());
        assert_eq!(reloaded.len(), 5);
        assert!(reloaded
            .entries()
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_reload_from_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let mut log = SubmissionLog::open(Box::new(SqliteLogStorage::open(&path).unwrap()), 10).unwrap();
        log.append_entry(entry_at(1, "a")).unwrap();
        log.append_entry(entry_at(4, "d")).unwrap();
        log.append_entry(entry_at(2, "b")).unwrap();
        drop(log);

        let reloaded = SubmissionLog::open(Box::new(SqliteLogStorage::open(&path).unwrap()), 10).unwrap();
        assert_eq!(inputs(&reloaded), vec!["d", "b", "a"]);
    }

    #[test]
    fn test_reload_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut log = SubmissionLog::open(Box::new(JsonFileLogStorage::new(&path)), 10).unwrap();
        log.append_entry(entry_at(3, "c")).unwrap();
        log.append_entry(entry_at(7, "g")).unwrap();

        let reloaded = SubmissionLog::open(Box::new(JsonFileLogStorage::new(&path)), 10).unwrap();
        assert_eq!(reloaded.entries(), log.entries());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (mut log, storage) = memory_log(3);
        for minute in 0..6 {
            log.append_entry(entry_at(minute, &format!("e{}", minute))).unwrap();
        }
        assert_eq!(inputs(&log), vec!["e5", "e4", "e3"]);
        assert_eq!(storage.snapshot().len(), 3);
    }

    #[test]
    fn test_open_trims_oversized_store() {
        let storage = MemoryLogStorage::new();
        let entries: Vec<LogEntry> = (0..5).map(|m| entry_at(m, &format!("e{}", m))).collect();
        storage.save(&entries).unwrap();

        let log = SubmissionLog::open(Box::new(storage.clone()), 2).unwrap();
        assert_eq!(inputs(&log), vec!["e4", "e3"]);
        assert_eq!(storage.snapshot().len(), 2);
    }

    #[test]
    fn test_page_clamps() {
        let (mut log, _) = memory_log(10);
        for minute in 0..4 {
            log.append_entry(entry_at(minute, &format!("e{}", minute))).unwrap();
        }
        assert_eq!(log.page(1, 2).len(), 2);
        assert_eq!(log.page(1, 2)[0].input, "e2");
        assert_eq!(log.page(3, 10).len(), 1);
        assert!(log.page(10, 10).is_empty());
    }

    #[test]
    fn test_toggle_and_out_of_range() {
        let (mut log, _) = memory_log(10);
        log.append_entry(entry_at(1, "a")).unwrap();

        assert!(!log.is_expanded(0).unwrap());
        assert!(log.toggle(0).unwrap());
        assert!(log.is_expanded(0).unwrap());
        assert!(!log.toggle(0).unwrap());

        assert!(matches!(
            log.toggle(1),
            Err(Error::RowOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_expand_state_follows_row_on_insert() {
        let (mut log, _) = memory_log(10);
        log.append_entry(entry_at(1, "a")).unwrap();
        log.set_expanded(0, true).unwrap();

        log.append_entry(entry_at(2, "b")).unwrap();
        assert!(!log.is_expanded(0).unwrap());
        assert!(log.is_expanded(1).unwrap());
    }

    #[test]
    fn test_rows_truncate_unless_expanded() {
        let (mut log, _) = memory_log(10);
        let long_input = "あ".repeat(PREVIEW_CHARS + 10);
        log.append_entry(LogEntry {
            timestamp: Local::now() - Duration::seconds(5),
            input: long_input.clone(),
            output: "short".to_string(),
        })
        .unwrap();

        let row = &log.rows(0, 10)[0];
        assert!(row.truncated);
        assert_eq!(row.input.chars().count(), PREVIEW_CHARS + 1);
        assert!(row.input.ends_with('…'));
        assert_eq!(row.output, "short");

        log.toggle(0).unwrap();
        let row = &log.rows(0, 10)[0];
        assert!(row.expanded);
        assert!(!row.truncated);
        assert_eq!(row.input, long_input);
    }
}
