//! Data types for the web usage API and the snapshot log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organization entry returned by the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
}

/// Raw usage window as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUsageWindow {
    pub utilization: f64,
    #[serde(default)]
    pub resets_at: Option<String>,
}

/// Raw usage response. Every window is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageResponse {
    #[serde(default)]
    pub five_hour: Option<ApiUsageWindow>,
    #[serde(default)]
    pub seven_day: Option<ApiUsageWindow>,
    #[serde(default)]
    pub seven_day_opus: Option<ApiUsageWindow>,
    #[serde(default)]
    pub seven_day_sonnet: Option<ApiUsageWindow>,
}

/// A rate-limit window with its utilization percentage and reset time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Percentage used. The API reports 0-100.
    pub utilization: f64,
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    /// Utilization clamped to `[0, 100]` for rendering.
    pub fn clamped_utilization(&self) -> f64 {
        if self.utilization.is_nan() {
            return 0.0;
        }
        self.utilization.clamp(0.0, 100.0)
    }
}

/// Result of one successful usage fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Short session window (five hours).
    pub session: UsageWindow,
    /// Seven day aggregate window.
    pub weekly: UsageWindow,
    /// Seven day Sonnet window, present only when returned.
    pub sonnet: Option<UsageWindow>,
    /// Seven day Opus window, present only when returned.
    pub opus: Option<UsageWindow>,
    pub fetched_at: DateTime<Utc>,
}

impl UsageReport {
    pub fn to_snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            timestamp: self.fetched_at,
            session_usage: self.session.utilization,
            weekly_usage: self.weekly.utilization,
            sonnet_usage: self.sonnet.map(|w| w.utilization),
            session_resets_at: self.session.resets_at,
            weekly_resets_at: self.weekly.resets_at,
        }
    }
}

/// One point-in-time observation appended to the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub timestamp: DateTime<Utc>,
    pub session_usage: f64,
    pub weekly_usage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonnet_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_resets_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_resets_at: Option<DateTime<Utc>>,
}

/// A reconstructed usage-limit window aggregated from snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_resets_at: DateTime<Utc>,
    pub peak_usage: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
