//! Summary of the Claude CLI's own activity cache (`~/.claude/stats-cache.json`).

use crate::paths;
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Messages per day treated as 100% in the daily estimate.
const DAILY_MESSAGE_SCALE: f64 = 20.0;
/// Messages per week treated as 100% in the weekly estimate.
const WEEKLY_MESSAGE_SCALE: f64 = 140.0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsCache {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub last_computed_date: Option<String>,
    #[serde(default)]
    pub daily_activity: Vec<DailyActivity>,
    #[serde(default)]
    pub daily_model_tokens: Vec<DailyModelTokens>,
    #[serde(default)]
    pub model_usage: HashMap<String, ModelUsage>,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub first_session_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub session_count: u64,
    #[serde(default)]
    pub tool_call_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyModelTokens {
    pub date: String,
    #[serde(default)]
    pub tokens_by_model: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUsageSummary {
    pub today_messages: u64,
    pub today_tokens: u64,
    pub week_messages: u64,
    pub week_tokens: u64,
    pub total_sessions: u64,
    pub total_messages: u64,
    pub primary_model: String,
}

impl LocalUsageSummary {
    /// Rough percentage of a day's typical capacity.
    pub fn today_usage_estimate(&self) -> f64 {
        (self.today_messages as f64 / DAILY_MESSAGE_SCALE).min(100.0)
    }

    /// Rough percentage of a week's typical capacity.
    pub fn week_usage_estimate(&self) -> f64 {
        (self.week_messages as f64 / WEEKLY_MESSAGE_SCALE).min(100.0)
    }
}

#[derive(Debug)]
pub enum LocalStatsError {
    FileNotFound(PathBuf),
    Read(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for LocalStatsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(
                f,
                "Stats file not found at {}. Use Claude Code first.",
                path.display()
            ),
            Self::Read(e) => write!(f, "Failed to read stats file: {}", e),
            Self::Parse(_) => write!(f, "Failed to parse stats file."),
        }
    }
}

impl std::error::Error for LocalStatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::FileNotFound(_) => None,
        }
    }
}

/// Default cache location, or `None` without a home directory.
pub fn default_stats_path() -> Option<PathBuf> {
    paths::claude_stats_cache_path().ok()
}

pub fn load_stats_cache(path: &Path) -> Result<StatsCache, LocalStatsError> {
    if !path.exists() {
        return Err(LocalStatsError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(LocalStatsError::Read)?;
    serde_json::from_str(&content).map_err(LocalStatsError::Parse)
}

/// Loads the cache at `path` and summarizes it against the local date.
pub fn fetch_local_stats(path: &Path) -> Result<LocalUsageSummary, LocalStatsError> {
    let cache = load_stats_cache(path)?;
    Ok(summarize(&cache, Local::now().date_naive()))
}

/// Summarizes `cache` as of `today`. The week covers dates on or after `today - 7 days`.
pub fn summarize(cache: &StatsCache, today: NaiveDate) -> LocalUsageSummary {
    let today_key = today.format("%Y-%m-%d").to_string();
    let week_start = today
        .checked_sub_days(Days::new(7))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string();

    let today_messages = cache
        .daily_activity
        .iter()
        .find(|day| day.date == today_key)
        .map(|day| day.message_count)
        .unwrap_or(0);
    let today_tokens = cache
        .daily_model_tokens
        .iter()
        .find(|day| day.date == today_key)
        .map(|day| day.tokens_by_model.values().sum::<u64>())
        .unwrap_or(0);

    // Dates are zero-padded ISO strings, so lexical order is chronological.
    let week_messages = cache
        .daily_activity
        .iter()
        .filter(|day| day.date >= week_start)
        .map(|day| day.message_count)
        .sum::<u64>();
    let week_tokens = cache
        .daily_model_tokens
        .iter()
        .filter(|day| day.date >= week_start)
        .flat_map(|day| day.tokens_by_model.values())
        .sum::<u64>();

    let primary_model = cache
        .model_usage
        .iter()
        .max_by(|(a_name, a), (b_name, b)| {
            a.output_tokens
                .cmp(&b.output_tokens)
                .then_with(|| b_name.cmp(a_name))
        })
        .map(|(name, _)| short_model_name(name))
        .unwrap_or_else(|| "Unknown".to_string());

    LocalUsageSummary {
        today_messages,
        today_tokens,
        week_messages,
        week_tokens,
        total_sessions: cache.total_sessions,
        total_messages: cache.total_messages,
        primary_model,
    }
}

/// Family name for a model id, or the id itself when unrecognized.
pub fn short_model_name(model: &str) -> String {
    let lower = model.to_ascii_lowercase();
    ["Opus", "Sonnet", "Haiku"]
        .into_iter()
        .find(|family| lower.contains(&family.to_ascii_lowercase()))
        .map(String::from)
        .unwrap_or_else(|| model.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CACHE: &str = r#"{
        "version": 1,
        "lastComputedDate": "2025-06-10",
        "dailyActivity": [
            {"date": "2025-06-02", "messageCount": 500, "sessionCount": 3, "toolCallCount": 40},
            {"date": "2025-06-03", "messageCount": 70, "sessionCount": 1, "toolCallCount": 9},
            {"date": "2025-06-09", "messageCount": 140, "sessionCount": 2, "toolCallCount": 12},
            {"date": "2025-06-10", "messageCount": 30, "sessionCount": 1, "toolCallCount": 5}
        ],
        "dailyModelTokens": [
            {"date": "2025-06-02", "tokensByModel": {"claude-opus-4": 9000}},
            {"date": "2025-06-09", "tokensByModel": {"claude-sonnet-4": 1000, "claude-opus-4": 500}},
            {"date": "2025-06-10", "tokensByModel": {"claude-sonnet-4": 200, "claude-haiku-3": 50}}
        ],
        "modelUsage": {
            "claude-opus-4-20250514": {"inputTokens": 10, "outputTokens": 300},
            "claude-sonnet-4-20250514": {"inputTokens": 99, "outputTokens": 800, "cacheReadInputTokens": 5}
        },
        "totalSessions": 7,
        "totalMessages": 740,
        "firstSessionDate": "2025-06-02T08:00:00Z"
    }"#;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_summarize_today_and_week() {
        let cache: StatsCache = serde_json::from_str(CACHE).unwrap();
        let summary = summarize(&cache, day("2025-06-10"));

        assert_eq!(summary.today_messages, 30);
        assert_eq!(summary.today_tokens, 250);
        // 2025-06-03 is exactly seven days back and counts.
        assert_eq!(summary.week_messages, 240);
        assert_eq!(summary.week_tokens, 1750);
        assert_eq!(summary.total_sessions, 7);
        assert_eq!(summary.total_messages, 740);
        assert_eq!(summary.primary_model, "Sonnet");
    }

    #[test]
    fn test_estimates_are_capped() {
        let mut summary = summarize(&StatsCache::default(), day("2025-06-10"));
        assert_eq!(summary.primary_model, "Unknown");
        assert_eq!(summary.today_usage_estimate(), 0.0);

        summary.today_messages = 30;
        summary.week_messages = 280;
        assert_eq!(summary.today_usage_estimate(), 1.5);
        assert_eq!(summary.week_usage_estimate(), 2.0);

        summary.today_messages = 5_000;
        summary.week_messages = 50_000;
        assert_eq!(summary.today_usage_estimate(), 100.0);
        assert_eq!(summary.week_usage_estimate(), 100.0);
    }

    #[test]
    fn test_short_model_name() {
        assert_eq!(short_model_name("claude-opus-4-20250514"), "Opus");
        assert_eq!(short_model_name("claude-3-5-haiku"), "Haiku");
        assert_eq!(short_model_name("gpt-x"), "gpt-x");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = fetch_local_stats(&dir.path().join("stats-cache.json")).unwrap_err();
        assert!(matches!(err, LocalStatsError::FileNotFound(_)));
        assert!(err.to_string().contains("Use Claude Code first"));
    }

    #[test]
    fn test_unparsable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats-cache.json");
        std::fs::write(&path, "{\"dailyActivity\": 3}").unwrap();
        assert!(matches!(
            load_stats_cache(&path),
            Err(LocalStatsError::Parse(_))
        ));
    }
}
