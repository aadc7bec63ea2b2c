//! Per-session command history: a bounded FIFO log with substring search.

use std::collections::VecDeque;

use agentfs_common::ApiError;
use chrono::Utc;
use serde::Serialize;

const HISTORY_CAPACITY: usize = 1_000;

#[derive(Clone, Serialize)]
pub struct HistoryEntry {
    pub command: String,
    pub timestamp: String,
}

pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(64),
        }
    }

    pub fn append(&mut self, command: &str) {
        if self.entries.len() >= HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            command: command.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    /// Most recent `limit` entries (or all, if `limit` is `None`), oldest
    /// first — matching insertion order.
    pub fn list(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        match limit {
            Some(n) if n < self.entries.len() => {
                self.entries.iter().skip(self.entries.len() - n).cloned().collect()
            }
            _ => self.entries.iter().cloned().collect(),
        }
    }

    /// Case-sensitive substring search over `command`. An empty query is
    /// rejected rather than treated as "match everything".
    pub fn search(&self, query: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        if query.is_empty() {
            return Err(ApiError::invalid_argument("search query must not be empty"));
        }
        Ok(self
            .entries
            .iter()
            .filter(|e| e.command.contains(query))
            .cloned()
            .collect())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_returns_most_recent_in_insertion_order() {
        let mut log = HistoryLog::new();
        log.append("one");
        log.append("two");
        log.append("three");

        let recent = log.list(Some(2));
        let commands: Vec<&str> = recent.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["two", "three"]);
    }

    #[test]
    fn list_without_limit_returns_everything() {
        let mut log = HistoryLog::new();
        log.append("one");
        log.append("two");
        assert_eq!(log.list(None).len(), 2);
    }

    #[test]
    fn search_rejects_empty_query() {
        let log = HistoryLog::new();
        let err = log.search("").unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn search_matches_substring() {
        let mut log = HistoryLog::new();
        log.append("cargo build");
        log.append("cargo test");
        log.append("ls -la");

        let hits = log.search("cargo").unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = HistoryLog::new();
        log.append("one");
        log.clear();
        assert!(log.list(None).is_empty());
    }

    #[test]
    fn append_evicts_oldest_once_capacity_is_reached() {
        let mut log = HistoryLog::new();
        for i in 0..HISTORY_CAPACITY + 10 {
            log.append(&format!("cmd-{i}"));
        }
        let all = log.list(None);
        assert_eq!(all.len(), HISTORY_CAPACITY);
        assert_eq!(all.first().unwrap().command, "cmd-10");
    }
}
