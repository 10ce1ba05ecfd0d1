//! Small persisted preferences: client identity and the dismissed update marker.

use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Prefix of the anonymous id sent to the web API.
const ANONYMOUS_ID_PREFIX: &str = "claudeai.v1.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub anonymous_id: Option<String>,
    #[serde(default)]
    pub dismissed_update_version: Option<String>,
}

/// Identifiers attached to every web API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub device_id: String,
    pub anonymous_id: String,
}

/// Settings handle shared by the usage client and the version checker.
///
/// A store without a path keeps values in memory only.
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: Mutex<Settings>,
}

impl SettingsStore {
    /// Opens the store at the default settings path.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(paths::settings_path()?))
    }

    /// Opens the store at `path`; a missing or unreadable file starts empty.
    pub fn open(path: PathBuf) -> Self {
        let settings = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unparsable settings file {}: {}", path.display(), e);
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };
        Self {
            path: Some(path),
            settings: Mutex::new(settings),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            settings: Mutex::new(Settings::default()),
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Settings {
        self.lock().clone()
    }

    /// Returns the client identity, generating and persisting missing ids.
    pub fn client_identity(&self) -> ClientIdentity {
        let mut settings = self.lock();
        let mut changed = false;

        let device_id = settings
            .device_id
            .get_or_insert_with(|| {
                changed = true;
                new_device_id()
            })
            .clone();
        let anonymous_id = settings
            .anonymous_id
            .get_or_insert_with(|| {
                changed = true;
                new_anonymous_id()
            })
            .clone();

        if changed {
            if let Err(e) = self.persist(&settings) {
                tracing::warn!("Failed to persist client identity: {:#}", e);
            }
        }

        ClientIdentity {
            device_id,
            anonymous_id,
        }
    }

    pub fn dismissed_update_version(&self) -> Option<String> {
        self.lock().dismissed_update_version.clone()
    }

    pub fn set_dismissed_update_version(&self, version: &str) -> Result<()> {
        let mut settings = self.lock();
        settings.dismissed_update_version = Some(version.to_string());
        self.persist(&settings)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, settings: &Settings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        paths::write_atomic(path, &content)
    }
}

fn new_device_id() -> String {
    uuid::Uuid::new_v4().to_string().to_lowercase()
}

fn new_anonymous_id() -> String {
    format!("{}{}", ANONYMOUS_ID_PREFIX, new_device_id())
}
