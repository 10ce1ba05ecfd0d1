//! Self-throttled update check for the locally installed Claude Code CLI.

use super::compare::is_version_newer;
use super::sources::{InstalledVersionProbe, LatestVersionFeed};
use crate::guard::InFlightGuard;
use crate::settings::SettingsStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Default minimum spacing between completed checks.
pub const DEFAULT_MIN_CHECK_INTERVAL_SECS: i64 = 1800;

/// What a call to [`VersionChecker::check_for_update_at`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Checked,
    /// The previous check completed too recently.
    Throttled,
    /// Another check is still running.
    InFlight,
}

/// Last known versions. Each half is kept when its fetch fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionState {
    pub installed: Option<String>,
    pub latest: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}

pub struct VersionChecker {
    probe: Arc<dyn InstalledVersionProbe>,
    feed: Arc<dyn LatestVersionFeed>,
    settings: Arc<SettingsStore>,
    changelog_base_url: String,
    min_check_interval: Duration,
    in_flight: AtomicBool,
    state: Mutex<VersionState>,
}

impl VersionChecker {
    pub fn new(
        probe: Arc<dyn InstalledVersionProbe>,
        feed: Arc<dyn LatestVersionFeed>,
        settings: Arc<SettingsStore>,
        changelog_base_url: &str,
    ) -> Self {
        Self {
            probe,
            feed,
            settings,
            changelog_base_url: changelog_base_url.trim_end_matches('/').to_string(),
            min_check_interval: Duration::seconds(DEFAULT_MIN_CHECK_INTERVAL_SECS),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(VersionState::default()),
        }
    }

    pub fn with_min_check_interval(mut self, secs: i64) -> Self {
        self.min_check_interval = Duration::seconds(secs);
        self
    }

    pub fn check_for_update(&self) -> CheckOutcome {
        self.check_for_update_at(Utc::now())
    }

    /// Fetches both versions concurrently unless throttled or already running.
    ///
    /// `now` is the start time. The throttle is stamped with the completion
    /// time, `now` plus the time both fetches took. Failures are logged at
    /// debug level and leave the previous value in place.
    pub fn check_for_update_at(&self, now: DateTime<Utc>) -> CheckOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            return CheckOutcome::InFlight;
        };

        if let Some(last) = self.lock().last_check {
            if now - last < self.min_check_interval {
                return CheckOutcome::Throttled;
            }
        }

        let started = Instant::now();
        let (installed, latest) = std::thread::scope(|scope| {
            let installed = scope.spawn(|| self.probe.installed_version());
            let latest = scope.spawn(|| self.feed.fetch_latest_version());
            (joined(installed.join()), joined(latest.join()))
        });

        let mut state = self.lock();
        match installed {
            Ok(version) => state.installed = Some(version),
            Err(e) => tracing::debug!("Installed version probe failed: {:#}", e),
        }
        match latest {
            Ok(version) => state.latest = Some(version),
            Err(e) => tracing::debug!("Latest version fetch failed: {:#}", e),
        }
        let elapsed = Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero());
        state.last_check = Some(now + elapsed);
        CheckOutcome::Checked
    }

    #[cfg(test)]
    pub fn state(&self) -> VersionState {
        self.lock().clone()
    }

    pub fn installed_version(&self) -> Option<String> {
        self.lock().installed.clone()
    }

    pub fn latest_version(&self) -> Option<String> {
        self.lock().latest.clone()
    }

    /// Both versions are known.
    pub fn has_checked(&self) -> bool {
        let state = self.lock();
        state.installed.is_some() && state.latest.is_some()
    }

    /// Latest is newer than installed and has not been dismissed.
    pub fn has_update(&self) -> bool {
        let state = self.lock();
        let (Some(installed), Some(latest)) = (&state.installed, &state.latest) else {
            return false;
        };
        if self.settings.dismissed_update_version().as_deref() == Some(latest.as_str()) {
            return false;
        }
        is_version_newer(latest, installed)
    }

    /// Both versions are known and latest is not newer. Ignores dismissal.
    pub fn is_up_to_date(&self) -> bool {
        let state = self.lock();
        match (&state.installed, &state.latest) {
            (Some(installed), Some(latest)) => !is_version_newer(latest, installed),
            _ => false,
        }
    }

    pub fn update_text(&self) -> String {
        let state = self.lock();
        match (&state.installed, &state.latest) {
            (Some(installed), Some(latest)) => {
                format!("Claude Code v{} \u{2192} v{} available", installed, latest)
            }
            _ => String::new(),
        }
    }

    pub fn up_to_date_text(&self) -> String {
        self.lock()
            .installed
            .as_ref()
            .map(|installed| format!("Claude Code v{} \u{2014} up to date", installed))
            .unwrap_or_default()
    }

    /// Release page for the latest version, or the installed one if latest is unknown.
    pub fn changelog_url(&self) -> Option<String> {
        let state = self.lock();
        state
            .latest
            .as_ref()
            .or(state.installed.as_ref())
            .map(|version| format!("{}/v{}", self.changelog_base_url, version))
    }

    /// Records the current latest version as dismissed. No-op when latest is unknown.
    pub fn dismiss(&self) -> Result<()> {
        let Some(latest) = self.latest_version() else {
            return Ok(());
        };
        self.settings.set_dismissed_update_version(&latest)
    }

    fn lock(&self) -> MutexGuard<'_, VersionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn joined(result: std::thread::Result<Result<String>>) -> Result<String> {
    result.unwrap_or_else(|_| Err(anyhow::anyhow!("version fetch panicked")))
}

#[cfg(test)]
#[path = "tests/checker_tests.rs"]
mod tests;
