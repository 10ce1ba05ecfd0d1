//! Where the installed and latest versions come from.

use crate::usage::transport::HttpTransport;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::process::Command;
use std::sync::{Arc, OnceLock};

pub trait InstalledVersionProbe: Send + Sync {
    fn installed_version(&self) -> Result<String>;
}

pub trait LatestVersionFeed: Send + Sync {
    fn fetch_latest_version(&self) -> Result<String>;
}

const VERSION_PATTERN: &str = r"\d+\.\d+\.\d+";

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(VERSION_PATTERN).ok())
        .as_ref()
}

/// First `major.minor.patch` run in `output`.
pub fn extract_version(output: &str) -> Option<String> {
    version_pattern()?
        .find(output)
        .map(|m| m.as_str().to_string())
}

/// Runs `<command> --version` and extracts the version it prints.
pub struct CliVersionProbe {
    command: String,
}

impl CliVersionProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl InstalledVersionProbe for CliVersionProbe {
    fn installed_version(&self) -> Result<String> {
        let path = which::which(&self.command)
            .with_context(|| format!("`{}` not found on PATH", self.command))?;

        let output = Command::new(&path)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to run {} --version", path.display()))?;

        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.command, output.status);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            anyhow::bail!("{} --version printed nothing", self.command);
        }
        extract_version(&stdout)
            .with_context(|| format!("No version in output: {}", stdout.trim()))
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Latest release tag from a GitHub releases endpoint.
pub struct GithubReleaseFeed {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl GithubReleaseFeed {
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

impl LatestVersionFeed for GithubReleaseFeed {
    fn fetch_latest_version(&self) -> Result<String> {
        let mut headers = vec![
            (
                "User-Agent".to_string(),
                format!("claude-code-stats/{}", env!("CARGO_PKG_VERSION")),
            ),
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
        ];
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        let response = self
            .transport
            .get(&self.url, &headers)
            .context("Failed to fetch latest release")?;
        if !response.is_success() {
            anyhow::bail!("Release feed returned HTTP {}", response.status);
        }

        let release: Release =
            serde_json::from_str(&response.body).context("Failed to parse release feed")?;
        Ok(strip_tag_prefix(&release.tag_name).to_string())
    }
}

/// Strips one leading `v` from a release tag.
pub fn strip_tag_prefix(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix('v').unwrap_or(tag)
}
