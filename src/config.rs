use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub version: VersionConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub local_stats: LocalStatsConfig,
}

/// Usage endpoint and polling cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UsageConfig {
    /// Base of the web API, without trailing slash.
    #[serde(default = "default_usage_base_url")]
    pub base_url: String,
    #[serde(default = "default_usage_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// A tick only fetches when the latest report is older than this.
    #[serde(default = "default_min_poll_age_secs")]
    pub min_poll_age_secs: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            base_url: default_usage_base_url(),
            poll_interval_secs: default_usage_poll_interval_secs(),
            min_poll_age_secs: default_min_poll_age_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_usage_base_url() -> String {
    "https://claude.ai/api".to_string()
}

fn default_usage_poll_interval_secs() -> u64 {
    300
}

fn default_min_poll_age_secs() -> i64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Minimum age of the newest snapshot before another one is appended.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: i64,
    /// Rounding step applied to session reset timestamps.
    #[serde(default = "default_session_granularity_secs")]
    pub session_granularity_secs: i64,
    /// Merge buckets whose keys are one rounding step apart.
    #[serde(default = "default_true")]
    pub coalesce_adjacent_buckets: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            session_granularity_secs: default_session_granularity_secs(),
            coalesce_adjacent_buckets: true,
        }
    }
}

fn default_dedup_window_secs() -> i64 {
    60
}

fn default_session_granularity_secs() -> i64 {
    60
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionConfig {
    #[serde(default = "default_release_feed_url")]
    pub release_feed_url: String,
    #[serde(default = "default_changelog_base_url")]
    pub changelog_base_url: String,
    #[serde(default = "default_version_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Checks completed less than this long ago make a new check a no-op.
    #[serde(default = "default_min_check_interval_secs")]
    pub min_check_interval_secs: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
    /// Executable queried with `--version`.
    #[serde(default = "default_cli_command")]
    pub cli_command: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            release_feed_url: default_release_feed_url(),
            changelog_base_url: default_changelog_base_url(),
            check_interval_secs: default_version_check_interval_secs(),
            min_check_interval_secs: default_min_check_interval_secs(),
            timeout_secs: default_request_timeout_secs(),
            cli_command: default_cli_command(),
        }
    }
}

fn default_release_feed_url() -> String {
    "https://api.github.com/repos/anthropics/claude-code/releases/latest".to_string()
}

fn default_changelog_base_url() -> String {
    "https://github.com/anthropics/claude-code/releases/tag".to_string()
}

fn default_version_check_interval_secs() -> u64 {
    3600
}

fn default_min_check_interval_secs() -> i64 {
    1800
}

fn default_cli_command() -> String {
    "claude".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default = "default_status_url")]
    pub url: String,
    #[serde(default = "default_usage_poll_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_status_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            url: default_status_url(),
            interval_secs: default_usage_poll_interval_secs(),
            timeout_secs: default_status_timeout_secs(),
        }
    }
}

fn default_status_url() -> String {
    "https://status.claude.com/api/v2/status.json".to_string()
}

fn default_status_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocalStatsConfig {
    /// Overrides `~/.claude/stats-cache.json`.
    #[serde(default)]
    pub path: Option<std::path::PathBuf>,
}

impl AppConfig {
    /// Loads the config from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.history.session_granularity_secs <= 0 {
            anyhow::bail!(
                "history.session_granularity_secs must be positive, got {}",
                self.history.session_granularity_secs
            );
        }
        if self.usage.poll_interval_secs == 0 {
            anyhow::bail!("usage.poll_interval_secs must be positive");
        }
        if self.version.check_interval_secs == 0 {
            anyhow::bail!("version.check_interval_secs must be positive");
        }
        if self.status.interval_secs == 0 {
            anyhow::bail!("status.interval_secs must be positive");
        }
        Ok(())
    }
}

impl UsageConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
