//! Session reconstruction over the snapshot log.
//!
//! The API's reset time for the current session jitters by a few seconds
//! between polls. Snapshots are bucketed by their reset time rounded to the
//! nearest granularity step, and buckets one step apart are coalesced so a
//! jitter straddling the half-step boundary does not split one session in two.

use crate::config::HistoryConfig;
use crate::usage::types::{SessionSummary, UsageSnapshot};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// How reset timestamps are bucketed into sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGrouping {
    /// Rounding step in seconds. Must be positive.
    pub granularity_secs: i64,
    /// Merge runs of buckets whose keys are at most one step apart.
    pub coalesce_adjacent: bool,
}

impl Default for SessionGrouping {
    fn default() -> Self {
        Self {
            granularity_secs: 60,
            coalesce_adjacent: true,
        }
    }
}

impl From<&HistoryConfig> for SessionGrouping {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            granularity_secs: config.session_granularity_secs,
            coalesce_adjacent: config.coalesce_adjacent_buckets,
        }
    }
}

impl SessionGrouping {
    fn step_millis(&self) -> i64 {
        self.granularity_secs.max(1) * 1000
    }

    /// Rounds `at` to the nearest step, half-up.
    pub fn bucket_key(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.step_millis();
        let rounded = (at.timestamp_millis() + step / 2).div_euclid(step) * step;
        Utc.timestamp_millis_opt(rounded).single().unwrap_or(at)
    }
}

struct Bucket {
    key: DateTime<Utc>,
    peak_usage: f64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    /// Key of the snapshot with the latest `timestamp` in the bucket.
    latest_key: DateTime<Utc>,
}

impl Bucket {
    fn new(key: DateTime<Utc>, snapshot: &UsageSnapshot) -> Self {
        Self {
            key,
            peak_usage: snapshot.session_usage,
            first_seen: snapshot.timestamp,
            last_seen: snapshot.timestamp,
            latest_key: key,
        }
    }

    fn absorb(&mut self, key: DateTime<Utc>, snapshot: &UsageSnapshot) {
        self.peak_usage = self.peak_usage.max(snapshot.session_usage);
        self.first_seen = self.first_seen.min(snapshot.timestamp);
        if snapshot.timestamp >= self.last_seen {
            self.last_seen = snapshot.timestamp;
            self.latest_key = key;
        }
    }

    fn merge(&mut self, other: Bucket) {
        self.peak_usage = self.peak_usage.max(other.peak_usage);
        self.first_seen = self.first_seen.min(other.first_seen);
        if other.last_seen >= self.last_seen {
            self.last_seen = other.last_seen;
            self.latest_key = other.latest_key;
        }
        self.key = other.key;
    }

    fn into_summary(self, coalesced: bool) -> SessionSummary {
        SessionSummary {
            session_resets_at: if coalesced { self.latest_key } else { self.key },
            peak_usage: self.peak_usage,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
        }
    }
}

/// Derives session summaries, ascending by reset time.
///
/// Snapshots without a session reset time are ignored.
pub fn reconstruct_sessions(
    snapshots: &[UsageSnapshot],
    grouping: &SessionGrouping,
) -> Vec<SessionSummary> {
    let mut buckets: BTreeMap<DateTime<Utc>, Bucket> = BTreeMap::new();
    for snapshot in snapshots {
        let Some(resets_at) = snapshot.session_resets_at else {
            continue;
        };
        let key = grouping.bucket_key(resets_at);
        buckets
            .entry(key)
            .and_modify(|bucket| bucket.absorb(key, snapshot))
            .or_insert_with(|| Bucket::new(key, snapshot));
    }

    if !grouping.coalesce_adjacent {
        return buckets
            .into_values()
            .map(|bucket| bucket.into_summary(false))
            .collect();
    }

    let step = grouping.step_millis();
    let mut merged: Vec<Bucket> = Vec::with_capacity(buckets.len());
    for bucket in buckets.into_values() {
        match merged.last_mut() {
            // `key` of the open run is its highest bucket key so far
            Some(open) if bucket.key.timestamp_millis() - open.key.timestamp_millis() <= step => {
                open.merge(bucket)
            }
            _ => merged.push(bucket),
        }
    }

    let mut summaries: Vec<SessionSummary> = merged
        .into_iter()
        .map(|bucket| bucket.into_summary(true))
        .collect();
    summaries.sort_by_key(|summary| summary.session_resets_at);
    summaries
}

#[cfg(test)]
#[path = "tests/sessions_tests.rs"]
mod tests;
