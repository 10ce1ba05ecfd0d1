//! Service construction and the `watch` coordinator.
//!
//! The coordinator is the single owner of the poller and the checkers. Timers
//! and finished background work both arrive as [`AppEvent`]s on one channel,
//! so state is only ever touched from the event loop.

use crate::config::AppConfig;
use crate::history::{HistoryStore, SessionGrouping};
use crate::render;
use crate::scheduler::RepeatingTask;
use crate::settings::SettingsStore;
use crate::status::StatusChecker;
use crate::usage::credentials::{CredentialStore, FileCredentialStore};
use crate::usage::transport::{HttpTransport, UreqTransport};
use crate::usage::{SessionAuthClient, UsagePoller};
use crate::version::{CheckOutcome, CliVersionProbe, GithubReleaseFeed, VersionChecker};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn open_settings() -> Result<Arc<SettingsStore>> {
    Ok(Arc::new(SettingsStore::open_default()?))
}

pub fn open_credentials() -> Result<Arc<FileCredentialStore>> {
    Ok(Arc::new(FileCredentialStore::open_default()?))
}

/// Opens the default history log with the configured dedup window and grouping.
pub fn open_history(config: &AppConfig) -> Result<HistoryStore> {
    Ok(HistoryStore::open_default()?
        .with_dedup_window(config.history.dedup_window_secs)
        .with_grouping(SessionGrouping::from(&config.history)))
}

pub fn build_poller(
    config: &AppConfig,
    credentials: Arc<dyn CredentialStore>,
    settings: &SettingsStore,
) -> Result<UsagePoller> {
    let transport: Arc<dyn HttpTransport> =
        Arc::new(UreqTransport::new(config.usage.request_timeout()));
    let client = SessionAuthClient::new(
        transport,
        credentials,
        settings.client_identity(),
        &config.usage.base_url,
    );
    Ok(UsagePoller::new(
        client,
        open_history(config)?,
        config.usage.min_poll_age_secs,
    ))
}

pub fn build_version_checker(config: &AppConfig, settings: Arc<SettingsStore>) -> VersionChecker {
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new(Duration::from_secs(
        config.version.timeout_secs,
    )));
    VersionChecker::new(
        Arc::new(CliVersionProbe::new(config.version.cli_command.clone())),
        Arc::new(GithubReleaseFeed::new(
            transport,
            config.version.release_feed_url.clone(),
        )),
        settings,
        &config.version.changelog_base_url,
    )
    .with_min_check_interval(config.version.min_check_interval_secs)
}

pub fn build_status_checker(config: &AppConfig) -> StatusChecker {
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new(Duration::from_secs(
        config.status.timeout_secs,
    )));
    StatusChecker::new(transport, config.status.url.clone())
}

pub enum AppEvent {
    UsageTick,
    VersionTick,
    StatusTick,
    /// A blocking poll finished and hands the poller back.
    UsagePolled(Box<UsagePoller>),
    VersionChecked(CheckOutcome),
    StatusRefreshed,
}

/// Trigger periods for the three repeating tasks.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub usage: Duration,
    pub version: Duration,
    pub status: Duration,
}

impl From<&AppConfig> for Intervals {
    fn from(config: &AppConfig) -> Self {
        Self {
            usage: Duration::from_secs(config.usage.poll_interval_secs),
            version: Duration::from_secs(config.version.check_interval_secs),
            status: Duration::from_secs(config.status.interval_secs),
        }
    }
}

pub struct Coordinator {
    /// `None` while a poll runs on the blocking pool.
    poller: Option<UsagePoller>,
    version: Arc<VersionChecker>,
    status: Arc<StatusChecker>,
    last_status_text: Option<String>,
    announced_update: Option<String>,
    tx: mpsc::UnboundedSender<AppEvent>,
    rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl Coordinator {
    pub fn new(
        poller: UsagePoller,
        version: Arc<VersionChecker>,
        status: Arc<StatusChecker>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            poller: Some(poller),
            version,
            status,
            last_status_text: None,
            announced_update: None,
            tx,
            rx,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub fn poll_in_flight(&self) -> bool {
        self.poller.is_none()
    }

    #[cfg(test)]
    pub fn poller(&self) -> Option<&UsagePoller> {
        self.poller.as_ref()
    }

    /// Runs until Ctrl-C. Dropping the tasks on return cancels them.
    pub async fn run(mut self, intervals: Intervals) -> Result<()> {
        let _usage_task = RepeatingTask::spawn("usage", intervals.usage, self.sender(), || {
            AppEvent::UsageTick
        });
        let _version_task =
            RepeatingTask::spawn("version", intervals.version, self.sender(), || {
                AppEvent::VersionTick
            });
        let _status_task = RepeatingTask::spawn("status", intervals.status, self.sender(), || {
            AppEvent::StatusTick
        });

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                open = self.step() => {
                    if !open {
                        break;
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Interrupted; shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Receives and handles one event. Returns false when the channel is closed.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    pub fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::UsageTick => self.start_usage_poll(),
            AppEvent::VersionTick => self.start_version_check(),
            AppEvent::StatusTick => self.start_status_refresh(),
            AppEvent::UsagePolled(poller) => self.finish_usage_poll(*poller),
            AppEvent::VersionChecked(outcome) => self.finish_version_check(outcome),
            AppEvent::StatusRefreshed => self.finish_status_refresh(),
        }
    }

    fn start_usage_poll(&mut self) {
        if self.poll_in_flight() {
            tracing::debug!("Usage poll already in flight");
            return;
        }
        let now = Utc::now();
        if self.poller.as_ref().is_some_and(|p| !p.is_poll_needed(now)) {
            tracing::debug!("Latest usage is fresh; skipping poll");
            return;
        }
        let Some(mut poller) = self.poller.take() else {
            return;
        };

        let tx = self.sender();
        tokio::task::spawn_blocking(move || {
            // The outcome is kept on the poller itself.
            let _ = poller.poll();
            let _ = tx.send(AppEvent::UsagePolled(Box::new(poller)));
        });
    }

    fn finish_usage_poll(&mut self, poller: UsagePoller) {
        match (poller.last_error(), poller.latest()) {
            (Some(message), _) => println!("Usage: {}", message),
            (None, Some(report)) => {
                println!("{}\n", render::format_report(report, Utc::now()))
            }
            (None, None) => {}
        }
        self.poller = Some(poller);
    }

    fn start_version_check(&self) {
        let version = self.version.clone();
        let tx = self.sender();
        tokio::task::spawn_blocking(move || {
            let outcome = version.check_for_update();
            let _ = tx.send(AppEvent::VersionChecked(outcome));
        });
    }

    fn finish_version_check(&mut self, outcome: CheckOutcome) {
        if outcome != CheckOutcome::Checked {
            tracing::debug!("Version check skipped: {:?}", outcome);
            return;
        }
        if self.version.has_update() {
            let text = self.version.update_text();
            if self.announced_update.as_deref() != Some(text.as_str()) {
                println!("{}", text);
                if let Some(url) = self.version.changelog_url() {
                    println!("  {}", url);
                }
                self.announced_update = Some(text);
            }
        } else if self.version.is_up_to_date() {
            tracing::info!("{}", self.version.up_to_date_text());
        }
    }

    fn start_status_refresh(&self) {
        let status = self.status.clone();
        let tx = self.sender();
        tokio::task::spawn_blocking(move || {
            if status.refresh() {
                let _ = tx.send(AppEvent::StatusRefreshed);
            }
        });
    }

    fn finish_status_refresh(&mut self) {
        let Some(current) = self.status.last_known() else {
            return;
        };
        let text = self.status.status_text();
        if self.last_status_text.as_deref() != Some(text.as_str()) {
            println!("Claude status: {} ({})", text, current.description);
            self.last_status_text = Some(text);
        }
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
