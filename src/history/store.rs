//! Append-only snapshot log persisted as a pretty-printed JSON array.
//!
//! The in-memory log is authoritative for the process lifetime. Every append
//! rewrites the file atomically; a failed write is logged and the append stays.

use super::sessions::{reconstruct_sessions, SessionGrouping};
use crate::paths;
use crate::usage::types::{SessionSummary, UsageSnapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// Default minimum age of the newest entry before another is appended.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 60;

/// What [`HistoryStore::record_at`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Appended to the log. `persisted` is false when the file write failed.
    Appended { persisted: bool },
    /// Dropped because the newest entry is younger than the dedup window.
    Skipped,
}

pub struct HistoryStore {
    path: Option<PathBuf>,
    snapshots: Vec<UsageSnapshot>,
    dedup_window: Duration,
    grouping: SessionGrouping,
}

impl HistoryStore {
    /// Opens the log at the default history path.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(paths::history_path()?))
    }

    /// Loads the log once. A missing or unparsable file starts an empty log.
    pub fn open(path: PathBuf) -> Self {
        let snapshots = match load_snapshots(&path) {
            Ok(snapshots) => snapshots,
            Err(e) => {
                if path.exists() {
                    tracing::warn!("Starting with empty history: {:#}", e);
                }
                Vec::new()
            }
        };
        tracing::debug!(
            "Loaded {} snapshots from {}",
            snapshots.len(),
            path.display()
        );
        Self {
            path: Some(path),
            snapshots,
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
            grouping: SessionGrouping::default(),
        }
    }

    /// A log that is never written to disk.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshots: Vec::new(),
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
            grouping: SessionGrouping::default(),
        }
    }

    pub fn with_dedup_window(mut self, secs: i64) -> Self {
        self.dedup_window = Duration::seconds(secs);
        self
    }

    pub fn with_grouping(mut self, grouping: SessionGrouping) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn record(&mut self, snapshot: UsageSnapshot) -> RecordOutcome {
        self.record_at(snapshot, Utc::now())
    }

    /// Appends `snapshot` unless the newest entry is less than the dedup window older than `now`.
    pub fn record_at(&mut self, snapshot: UsageSnapshot, now: DateTime<Utc>) -> RecordOutcome {
        if let Some(last) = self.snapshots.last() {
            if now - last.timestamp < self.dedup_window {
                tracing::debug!(
                    "Skipping snapshot; newest entry is {}s old",
                    (now - last.timestamp).num_seconds()
                );
                return RecordOutcome::Skipped;
            }
        }

        self.snapshots.push(snapshot);
        let persisted = match self.persist() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to persist usage history: {:#}", e);
                false
            }
        };
        RecordOutcome::Appended { persisted }
    }

    /// The log in append order.
    pub fn load_history(&self) -> &[UsageSnapshot] {
        &self.snapshots
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&UsageSnapshot> {
        self.snapshots.last()
    }

    pub fn load_session_summaries(&self) -> Vec<SessionSummary> {
        reconstruct_sessions(&self.snapshots, &self.grouping)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }
        let content = serde_json::to_string_pretty(&self.snapshots)
            .context("Failed to serialize usage history")?;
        paths::write_atomic(path, &content)
    }
}

fn load_snapshots(path: &Path) -> Result<Vec<UsageSnapshot>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history file: {}", path.display()))
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
