//! Claude service status from the public status page.
//!
//! Status is informational. Failed refreshes keep the last known value and
//! are only visible in debug logs.

use crate::guard::InFlightGuard;
use crate::usage::transport::HttpTransport;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Operational,
    Minor,
    Major,
    Critical,
    Unknown,
}

impl StatusIndicator {
    pub fn from_indicator(value: &str) -> Self {
        match value {
            "none" => Self::Operational,
            "minor" => Self::Minor,
            "major" => Self::Major,
            "critical" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Operational => "Operational",
            Self::Minor => "Minor Issue",
            Self::Major => "Major Outage",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
        }
    }
}

impl Display for StatusIndicator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_text())
    }
}

/// `status` object of the status page response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub indicator: String,
    pub description: String,
}

impl ServiceStatus {
    pub fn indicator(&self) -> StatusIndicator {
        StatusIndicator::from_indicator(&self.indicator)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: ServiceStatus,
}

pub struct StatusChecker {
    transport: Arc<dyn HttpTransport>,
    url: String,
    in_flight: AtomicBool,
    last_known: Mutex<Option<ServiceStatus>>,
}

impl StatusChecker {
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            in_flight: AtomicBool::new(false),
            last_known: Mutex::new(None),
        }
    }

    /// One GET of the status page.
    pub fn fetch_status(&self) -> Result<ServiceStatus> {
        let response = self
            .transport
            .get(&self.url, &[])
            .context("Failed to reach status page")?;
        if !response.is_success() {
            anyhow::bail!("Status page returned HTTP {}", response.status);
        }
        let parsed: StatusResponse =
            serde_json::from_str(&response.body).context("Failed to parse status page")?;
        Ok(parsed.status)
    }

    /// Refreshes the last known status. Returns false when a refresh was already running.
    pub fn refresh(&self) -> bool {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            return false;
        };

        match self.fetch_status() {
            Ok(status) => *self.lock() = Some(status),
            Err(e) => tracing::debug!("Status refresh failed: {:#}", e),
        }
        true
    }

    pub fn last_known(&self) -> Option<ServiceStatus> {
        self.lock().clone()
    }

    /// Display text of the last known status, `Status` before the first success.
    pub fn status_text(&self) -> String {
        self.lock()
            .as_ref()
            .map(|status| status.indicator().display_text().to_string())
            .unwrap_or_else(|| "Status".to_string())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ServiceStatus>> {
        self.last_known.lock().unwrap_or_else(|e| e.into_inner())
    }
}
