//! Plain-text rendering for CLI output.

use crate::local_stats::LocalUsageSummary;
use crate::usage::types::{SessionSummary, UsageReport, UsageSnapshot, UsageWindow};
use chrono::{DateTime, Duration, Local, Utc};

/// Length of the short session window.
const SESSION_WINDOW: i64 = 5 * 3600;
/// Length of the seven day windows.
const WEEKLY_WINDOW: i64 = 7 * 86400;
/// Percentage points of slack before usage counts as ahead or behind.
const PACE_THRESHOLD: f64 = 10.0;

/// Usage pace compared to time elapsed in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Ahead,
    OnTrack,
    Behind,
    Unknown,
}

impl Pace {
    fn label(&self) -> &'static str {
        match self {
            Pace::Ahead => "ahead of pace",
            Pace::OnTrack => "on track",
            Pace::Behind => "under pace",
            Pace::Unknown => "",
        }
    }
}

/// Compares utilization with the share of a `window_secs` window that has elapsed.
pub fn pace(window: &UsageWindow, window_secs: i64, now: DateTime<Utc>) -> Pace {
    let Some(resets_at) = window.resets_at else {
        return Pace::Unknown;
    };
    let total = window_secs as f64;
    let remaining = (resets_at - now).num_seconds().max(0) as f64;
    let elapsed_pct = (((total - remaining).max(0.0) / total) * 100.0).clamp(0.0, 100.0);

    let used = window.clamped_utilization();
    if used > elapsed_pct + PACE_THRESHOLD {
        Pace::Ahead
    } else if used < elapsed_pct - PACE_THRESHOLD {
        Pace::Behind
    } else {
        Pace::OnTrack
    }
}

/// Formats a countdown as `3d 4h 05m`, `2h 07m` or `12m`. Negative spans render as `0m`.
pub fn format_countdown(duration: Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs <= 0 {
        return "0m".to_string();
    }

    let days = total_secs / 86400;
    let hours = (total_secs % 86400) / 3600;
    let minutes = (total_secs % 3600) / 60;

    if days > 0 {
        if minutes > 0 {
            format!("{}d {}h {:02}m", days, hours, minutes)
        } else if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    } else if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn window_line(
    label: &str,
    window: &UsageWindow,
    window_secs: i64,
    now: DateTime<Utc>,
) -> String {
    let mut line = format!("{:<14} {:>5.1}%", label, window.clamped_utilization());
    if let Some(resets_at) = window.resets_at {
        line.push_str(&format!(
            "  resets in {}",
            format_countdown(resets_at - now)
        ));
    }
    let status = pace(window, window_secs, now);
    if status != Pace::Unknown {
        line.push_str(&format!("  ({})", status.label()));
    }
    line
}

pub fn format_report(report: &UsageReport, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        window_line("Session (5h)", &report.session, SESSION_WINDOW, now),
        window_line("Weekly (7d)", &report.weekly, WEEKLY_WINDOW, now),
    ];
    if let Some(sonnet) = &report.sonnet {
        lines.push(window_line("Sonnet (7d)", sonnet, WEEKLY_WINDOW, now));
    }
    if let Some(opus) = &report.opus {
        lines.push(window_line("Opus (7d)", opus, WEEKLY_WINDOW, now));
    }
    lines.push(format!(
        "Updated {}",
        report.fetched_at.with_timezone(&Local).format("%H:%M:%S")
    ));
    lines.join("\n")
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_history(snapshots: &[UsageSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No usage history yet.".to_string();
    }
    snapshots
        .iter()
        .map(|s| {
            let sonnet = s
                .sonnet_usage
                .map(|u| format!("  sonnet {:>5.1}%", u))
                .unwrap_or_default();
            format!(
                "{}  session {:>5.1}%  weekly {:>5.1}%{}",
                local_time(s.timestamp),
                s.session_usage,
                s.weekly_usage,
                sonnet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_sessions(summaries: &[SessionSummary]) -> String {
    if summaries.is_empty() {
        return "No sessions recorded yet.".to_string();
    }
    summaries
        .iter()
        .map(|s| {
            format!(
                "resets {}  peak {:>5.1}%  seen {} .. {}",
                local_time(s.session_resets_at),
                s.peak_usage,
                local_time(s.first_seen),
                local_time(s.last_seen)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_local_stats(summary: &LocalUsageSummary) -> String {
    [
        format!(
            "Today      {} messages, {} tokens (~{:.0}%)",
            summary.today_messages,
            summary.today_tokens,
            summary.today_usage_estimate()
        ),
        format!(
            "This week  {} messages, {} tokens (~{:.0}%)",
            summary.week_messages,
            summary.week_tokens,
            summary.week_usage_estimate()
        ),
        format!(
            "All time   {} messages in {} sessions",
            summary.total_messages, summary.total_sessions
        ),
        format!("Model      {}", summary.primary_model),
    ]
    .join("\n")
}
