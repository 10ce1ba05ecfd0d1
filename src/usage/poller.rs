//! One fetch cycle: fetch usage, keep the latest report, record its snapshot.

use super::client::SessionAuthClient;
use super::error::UsageError;
use super::types::{UsageReport, UsageSnapshot};
use crate::history::{HistoryStore, RecordOutcome};
use chrono::{DateTime, Duration, Utc};

pub struct UsagePoller {
    client: SessionAuthClient,
    history: HistoryStore,
    min_poll_age: Duration,
    latest: Option<UsageReport>,
    last_error: Option<String>,
}

impl UsagePoller {
    pub fn new(client: SessionAuthClient, history: HistoryStore, min_poll_age_secs: i64) -> Self {
        Self {
            client,
            history,
            min_poll_age: Duration::seconds(min_poll_age_secs),
            latest: None,
            last_error: None,
        }
    }

    /// Runs one fetch. Success clears the last error; failure keeps the previous report.
    pub fn poll(&mut self) -> Result<UsageReport, UsageError> {
        let result = self.client.fetch_usage();
        self.finish(result, |history, snapshot| history.record(snapshot))
    }

    #[cfg(test)]
    pub fn poll_at(&mut self, now: DateTime<Utc>) -> Result<UsageReport, UsageError> {
        let result = self.client.fetch_usage_at(now);
        self.finish(result, |history, snapshot| history.record_at(snapshot, now))
    }

    fn finish(
        &mut self,
        result: Result<UsageReport, UsageError>,
        record: impl FnOnce(&mut HistoryStore, UsageSnapshot) -> RecordOutcome,
    ) -> Result<UsageReport, UsageError> {
        match result {
            Ok(report) => {
                match record(&mut self.history, report.to_snapshot()) {
                    RecordOutcome::Appended { persisted } => {
                        tracing::debug!("Recorded usage snapshot (persisted: {})", persisted)
                    }
                    RecordOutcome::Skipped => tracing::debug!("Usage snapshot deduplicated"),
                }
                self.latest = Some(report.clone());
                self.last_error = None;
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Usage fetch failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// True when no report exists or the latest one is older than the min poll age.
    pub fn is_poll_needed(&self, now: DateTime<Utc>) -> bool {
        match &self.latest {
            Some(report) => now - report.fetched_at > self.min_poll_age,
            None => true,
        }
    }

    pub fn latest(&self) -> Option<&UsageReport> {
        self.latest.as_ref()
    }

    /// Human-readable message of the last failed poll, cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[cfg(test)]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    #[cfg(test)]
    pub fn client(&self) -> &SessionAuthClient {
        &self.client
    }
}
