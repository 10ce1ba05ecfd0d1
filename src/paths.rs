//! Application-private storage paths.
//!
//! Everything the tool persists lives under one data directory:
//! - `usage_history.json` - Snapshot log
//! - `credentials.json` - Session key, cookie blob and organization override
//! - `settings.json` - Client identity and dismissed update marker
//! - `config.yaml` - Optional configuration
//! - `logs/claude-stats.log` - Log file written in watch mode

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Directory name under the platform data directory.
const APP_DIR: &str = "ClaudeCodeStats";

/// Fallback directory name under `$HOME` when no data directory is known.
const HOME_FALLBACK_DIR: &str = ".claude-code-stats";

thread_local! {
    static TEST_HOME: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

/// Guard returned by [`set_home_for_test`]; restores the previous override on drop.
#[cfg(test)]
pub struct TestHomeGuard {
    previous: Option<PathBuf>,
}

#[cfg(test)]
impl Drop for TestHomeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        TEST_HOME.with(|home| *home.borrow_mut() = previous);
    }
}

/// Redirects the data directory for the current thread.
#[cfg(test)]
pub fn set_home_for_test(dir: PathBuf) -> TestHomeGuard {
    let previous = TEST_HOME.with(|home| home.borrow_mut().replace(dir));
    TestHomeGuard { previous }
}

fn base_dir() -> Result<PathBuf> {
    if let Some(dir) = TEST_HOME.with(|home| home.borrow().clone()) {
        return Ok(dir);
    }
    if let Some(data) = dirs::data_dir() {
        return Ok(data.join(APP_DIR));
    }
    let home = dirs::home_dir().context("Could not determine home directory for app storage")?;
    Ok(home.join(HOME_FALLBACK_DIR))
}

/// Returns the application data directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if:
/// - Neither a data directory nor a home directory can be determined
/// - Directory creation fails
pub fn app_data_dir() -> Result<PathBuf> {
    let dir = base_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the snapshot log path: `<data>/usage_history.json`
pub fn history_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("usage_history.json"))
}

/// Returns the credential file path: `<data>/credentials.json`
pub fn credentials_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("credentials.json"))
}

/// Returns the settings file path: `<data>/settings.json`
pub fn settings_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("settings.json"))
}

/// Returns the default config path: `<data>/config.yaml`
pub fn config_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("config.yaml"))
}

/// Returns the logs directory: `<data>/logs/`
///
/// Creates the directory if it doesn't exist.
pub fn logs_dir() -> Result<PathBuf> {
    let dir = app_data_dir()?.join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the Claude CLI stats cache: `~/.claude/stats-cache.json`
pub fn claude_stats_cache_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".claude").join("stats-cache.json"))
}

/// Writes `contents` to `path` by writing a sibling temp file and renaming it over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    write_via_temp(path, contents, false)
}

/// Like [`write_atomic`], but the file is owner-only (0600 on unix) from the moment it exists.
pub fn write_private_atomic(path: &Path, contents: &str) -> Result<()> {
    write_via_temp(path, contents, true)
}

fn write_via_temp(path: &Path, contents: &str, private: bool) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");

    // A leftover temp file would keep its old permissions.
    match fs::remove_file(&temp_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to remove stale temp file: {}", temp_path.display())
            })
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    if private {
        owner_only(&mut options);
    }

    let written = options
        .open(&temp_path)
        .and_then(|mut file| file.write_all(contents.as_bytes()));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e)
            .with_context(|| format!("Failed to rename temp file to: {}", path.display()));
    }
    Ok(())
}

#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
}

#[cfg(not(unix))]
fn owner_only(_options: &mut OpenOptions) {}

#[cfg(test)]
#[path = "tests/paths_tests.rs"]
mod tests;
