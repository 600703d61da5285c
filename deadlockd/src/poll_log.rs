use crate::types::PollResult;
use log::warn;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Bounded in-memory record of recent polls, optionally mirrored to a JSONL
/// file.
pub struct PollLog {
    inner: Mutex<VecDeque<PollResult>>,
    capacity: usize,
    file_path: Option<PathBuf>,
}

impl PollLog {
    pub fn new(capacity: usize, file_path: Option<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            file_path,
        }
    }

    pub fn record(&self, result: &PollResult) {
        if self.capacity > 0 {
            let mut inner = self.lock();
            if inner.len() == self.capacity {
                inner.pop_front();
            }
            inner.push_back(result.clone());
        }

        if let Some(path) = &self.file_path
            && let Err(err) = Self::append_line(path, result)
        {
            warn!("[poll_log] failed to append poll to {}: {err}", path.display());
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<PollResult> {
        if limit == 0 {
            return Vec::new();
        }
        let inner = self.lock();
        inner.iter().rev().take(limit).cloned().collect::<Vec<_>>()
    }

    pub fn latest(&self) -> Option<PollResult> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One JSON document per line; the parent directory is created on demand.
    fn append_line(path: &Path, result: &PollResult) -> std::io::Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut line = serde_json::to_vec(result).map_err(std::io::Error::other)?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(&line)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PollResult>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeadlockReport, ResourceSummary, SystemStats};
    use tempfile::NamedTempFile;

    fn sample_poll(suffix: usize) -> PollResult {
        PollResult {
            stats: SystemStats {
                resources: ResourceSummary::default(),
                deadlock_risk: 0.0,
                process_count: suffix,
                processes: Vec::new(),
            },
            deadlocks: DeadlockReport {
                deadlocks_found: false,
                deadlock_cycles: Vec::new(),
                deadlock_risk: 0.0,
            },
            timestamp: format!("2026-01-01T00:00:{suffix:02}+00:00"),
        }
    }

    #[test]
    fn retains_recent_records() {
        let log = PollLog::new(2, None);
        log.record(&sample_poll(0));
        log.record(&sample_poll(1));
        log.record(&sample_poll(2));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].stats.process_count, 2);
        assert_eq!(recent[1].stats.process_count, 1);
        assert_eq!(log.latest().unwrap().stats.process_count, 2);
    }

    #[test]
    fn zero_limit_returns_nothing() {
        let log = PollLog::new(4, None);
        log.record(&sample_poll(0));
        assert!(log.recent(0).is_empty());
    }

    #[test]
    fn zero_capacity_keeps_nothing_in_memory() {
        let log = PollLog::new(0, None);
        log.record(&sample_poll(0));
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }

    #[test]
    fn writes_records_to_disk() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();
        let log = PollLog::new(4, Some(path.clone()));
        log.record(&sample_poll(42));
        log.record(&sample_poll(43));

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(
            lines[0].contains("\"process_count\":42"),
            "serialized poll should land in file"
        );
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("polls.jsonl");
        let log = PollLog::new(1, Some(path.clone()));
        log.record(&sample_poll(7));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.ends_with('\n'));
        let parsed: PollResult = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(parsed.stats.process_count, 7);
    }
}
