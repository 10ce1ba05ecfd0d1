use super::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays scripted versions; `None` entries fail.
struct Scripted {
    answers: Mutex<VecDeque<Option<&'static str>>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(answers: &[Option<&'static str>]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn next(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().pop_front().flatten() {
            Some(version) => Ok(version.to_string()),
            None => Err(anyhow::anyhow!("unavailable")),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InstalledVersionProbe for Scripted {
    fn installed_version(&self) -> Result<String> {
        self.next()
    }
}

impl LatestVersionFeed for Scripted {
    fn fetch_latest_version(&self) -> Result<String> {
        self.next()
    }
}

fn at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

fn checker(probe: Arc<Scripted>, feed: Arc<Scripted>) -> VersionChecker {
    VersionChecker::new(
        probe,
        feed,
        Arc::new(SettingsStore::in_memory()),
        "https://github.com/anthropics/claude-code/releases/tag/",
    )
}

#[test]
fn test_second_check_within_interval_is_throttled() {
    let probe = Scripted::new(&[Some("1.0.30"), Some("1.0.30")]);
    let feed = Scripted::new(&[Some("1.0.31"), Some("1.0.32")]);
    let checker = checker(probe.clone(), feed.clone());

    assert_eq!(
        checker.check_for_update_at(at("2025-06-01T12:00:00Z")),
        CheckOutcome::Checked
    );
    assert_eq!(
        checker.check_for_update_at(at("2025-06-01T12:29:59Z")),
        CheckOutcome::Throttled
    );
    assert_eq!(probe.calls(), 1);
    assert_eq!(feed.calls(), 1);
    assert_eq!(checker.latest_version().as_deref(), Some("1.0.31"));

    assert_eq!(
        checker.check_for_update_at(at("2025-06-01T12:30:00Z")),
        CheckOutcome::Checked
    );
    assert_eq!(feed.calls(), 2);
    assert_eq!(checker.latest_version().as_deref(), Some("1.0.32"));
}

#[test]
fn test_update_available_then_dismissed() {
    let probe = Scripted::new(&[Some("1.0.30"), Some("1.0.30")]);
    let feed = Scripted::new(&[Some("1.0.31"), Some("1.0.32")]);
    let checker = checker(probe, feed);

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));

    assert!(checker.has_checked());
    assert!(checker.has_update());
    assert!(!checker.is_up_to_date());
    let text = checker.update_text();
    assert_eq!(text, "Claude Code v1.0.30 \u{2192} v1.0.31 available");

    checker.dismiss().unwrap();
    assert!(!checker.has_update());
    assert!(!checker.is_up_to_date());

    checker.check_for_update_at(at("2025-06-01T13:00:00Z"));
    assert_eq!(checker.latest_version().as_deref(), Some("1.0.32"));
    assert!(checker.has_update());
}

#[test]
fn test_up_to_date_ignores_dismissal() {
    let probe = Scripted::new(&[Some("1.0.31")]);
    let feed = Scripted::new(&[Some("1.0.31")]);
    let checker = checker(probe, feed);

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));
    checker.dismiss().unwrap();

    assert!(checker.is_up_to_date());
    assert!(!checker.has_update());
    assert_eq!(checker.up_to_date_text(), "Claude Code v1.0.31 \u{2014} up to date");
}

#[test]
fn test_one_failing_source_keeps_other_half() {
    let probe = Scripted::new(&[Some("1.0.30"), None]);
    let feed = Scripted::new(&[None, Some("1.0.31")]);
    let checker = checker(probe, feed);

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));
    assert_eq!(checker.installed_version().as_deref(), Some("1.0.30"));
    assert_eq!(checker.latest_version(), None);
    assert!(!checker.has_checked());
    assert!(!checker.has_update());
    assert!(!checker.is_up_to_date());
    assert_eq!(checker.update_text(), "");

    checker.check_for_update_at(at("2025-06-01T12:45:00Z"));
    assert_eq!(checker.installed_version().as_deref(), Some("1.0.30"));
    assert_eq!(checker.latest_version().as_deref(), Some("1.0.31"));
    assert!(checker.has_update());
}

#[test]
fn test_failed_check_still_counts_for_throttle() {
    let probe = Scripted::new(&[None, None]);
    let feed = Scripted::new(&[None, None]);
    let checker = checker(probe.clone(), feed);

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));
    assert_eq!(
        checker.check_for_update_at(at("2025-06-01T12:10:00Z")),
        CheckOutcome::Throttled
    );
    assert_eq!(probe.calls(), 1);
    let stamped = checker.state().last_check.unwrap();
    assert!(stamped >= at("2025-06-01T12:00:00Z"));
    assert!(stamped < at("2025-06-01T12:00:05Z"));
}

/// Answers after a fixed delay.
struct Slow(std::time::Duration);

impl LatestVersionFeed for Slow {
    fn fetch_latest_version(&self) -> Result<String> {
        std::thread::sleep(self.0);
        Ok("1.0.31".to_string())
    }
}

#[test]
fn test_throttle_counts_from_completion_of_slow_check() {
    let probe = Scripted::new(&[Some("1.0.30"), Some("1.0.30")]);
    let checker = VersionChecker::new(
        probe.clone(),
        Arc::new(Slow(std::time::Duration::from_millis(400))),
        Arc::new(SettingsStore::in_memory()),
        "https://example.test",
    );

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));

    // Interval measured from the start would have elapsed by now.
    let just_after_start_interval = at("2025-06-01T12:30:00Z") + Duration::milliseconds(100);
    assert_eq!(
        checker.check_for_update_at(just_after_start_interval),
        CheckOutcome::Throttled
    );
    assert_eq!(probe.calls(), 1);

    assert_eq!(
        checker.check_for_update_at(at("2025-06-01T12:31:00Z")),
        CheckOutcome::Checked
    );
    assert_eq!(probe.calls(), 2);
}

#[test]
fn test_changelog_url_prefers_latest() {
    let probe = Scripted::new(&[Some("1.0.30")]);
    let feed = Scripted::new(&[None]);
    let checker = checker(probe, feed);
    assert_eq!(checker.changelog_url(), None);

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));
    assert_eq!(
        checker.changelog_url().as_deref(),
        Some("https://github.com/anthropics/claude-code/releases/tag/v1.0.30")
    );
}

#[test]
fn test_dismiss_without_latest_is_noop() {
    let settings = Arc::new(SettingsStore::in_memory());
    let checker = VersionChecker::new(
        Scripted::new(&[]),
        Scripted::new(&[]),
        settings.clone(),
        "https://example.test",
    );
    checker.dismiss().unwrap();
    assert_eq!(settings.dismissed_update_version(), None);
}

#[test]
fn test_persisted_dismissal_applies_to_new_checker() {
    let settings = Arc::new(SettingsStore::in_memory());
    settings.set_dismissed_update_version("1.0.31").unwrap();
    let checker = VersionChecker::new(
        Scripted::new(&[Some("1.0.30")]),
        Scripted::new(&[Some("1.0.31")]),
        settings,
        "https://example.test",
    );

    checker.check_for_update_at(at("2025-06-01T12:00:00Z"));
    assert!(!checker.has_update());
}

/// Blocks inside the fetch until released, so a second check can overlap it.
struct Gate {
    entered: std::sync::mpsc::Sender<()>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl LatestVersionFeed for Gate {
    fn fetch_latest_version(&self) -> Result<String> {
        self.entered.send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok("2.0.0".to_string())
    }
}

#[test]
fn test_overlapping_check_is_noop() {
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel();
    let probe = Scripted::new(&[Some("1.0.0")]);
    let checker = Arc::new(VersionChecker::new(
        probe.clone(),
        Arc::new(Gate {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        }),
        Arc::new(SettingsStore::in_memory()),
        "https://example.test",
    ));

    let background = {
        let checker = checker.clone();
        std::thread::spawn(move || checker.check_for_update_at(at("2025-06-01T12:00:00Z")))
    };
    entered_rx.recv().unwrap();

    assert_eq!(
        checker.check_for_update_at(at("2025-06-01T12:00:01Z")),
        CheckOutcome::InFlight
    );

    release_tx.send(()).unwrap();
    assert_eq!(background.join().unwrap(), CheckOutcome::Checked);
    assert_eq!(probe.calls(), 1);
    assert_eq!(checker.latest_version().as_deref(), Some("2.0.0"));
}
