//! Credential slots for the web session: session key, full cookie blob and
//! the persisted organization override.

use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Key-value slots the usage client reads and writes.
///
/// Clearing all three slots is the log-out operation.
pub trait CredentialStore: Send + Sync {
    fn session_key(&self) -> Option<String>;
    fn set_session_key(&self, value: Option<&str>) -> Result<()>;
    fn full_cookies(&self) -> Option<String>;
    fn set_full_cookies(&self, value: Option<&str>) -> Result<()>;
    fn organization_id(&self) -> Option<String>;
    fn set_organization_id(&self, value: Option<&str>) -> Result<()>;

    fn clear(&self) -> Result<()> {
        self.set_session_key(None)?;
        self.set_full_cookies(None)?;
        self.set_organization_id(None)
    }

    /// Cookie header value built from the stored slots.
    fn effective_cookies(&self) -> Option<String> {
        effective_cookies(
            self.session_key().as_deref(),
            self.full_cookies().as_deref(),
        )
    }
}

/// Combines the session key with the full browser cookie blob.
///
/// The blob carries the firewall clearance cookie; it is used verbatim when it
/// already contains `sessionKey=`, otherwise the key is prepended.
pub fn effective_cookies(session_key: Option<&str>, full_cookies: Option<&str>) -> Option<String> {
    let key = session_key.filter(|k| !k.is_empty());
    match full_cookies.filter(|c| !c.is_empty()) {
        Some(full) if full.contains("sessionKey=") => Some(full.to_string()),
        Some(full) => match key {
            Some(key) => Some(format!("sessionKey={}; {}", key, full)),
            None => Some(full.to_string()),
        },
        None => key.map(|key| format!("sessionKey={}", key)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CredentialSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_cookies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization_id: Option<String>,
}

impl CredentialSlots {
    fn set(slot: &mut Option<String>, value: Option<&str>) {
        *slot = value.filter(|v| !v.is_empty()).map(String::from);
    }
}

/// In-memory slots; nothing is persisted.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCredentialStore {
    slots: Mutex<CredentialSlots>,
}

#[cfg(test)]
impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_key(key: &str) -> Self {
        let store = Self::new();
        store.lock().session_key = Some(key.to_string());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CredentialSlots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
impl CredentialStore for MemoryCredentialStore {
    fn session_key(&self) -> Option<String> {
        self.lock().session_key.clone()
    }

    fn set_session_key(&self, value: Option<&str>) -> Result<()> {
        CredentialSlots::set(&mut self.lock().session_key, value);
        Ok(())
    }

    fn full_cookies(&self) -> Option<String> {
        self.lock().full_cookies.clone()
    }

    fn set_full_cookies(&self, value: Option<&str>) -> Result<()> {
        CredentialSlots::set(&mut self.lock().full_cookies, value);
        Ok(())
    }

    fn organization_id(&self) -> Option<String> {
        self.lock().organization_id.clone()
    }

    fn set_organization_id(&self, value: Option<&str>) -> Result<()> {
        CredentialSlots::set(&mut self.lock().organization_id, value);
        Ok(())
    }
}

/// Slots persisted as JSON, rewritten atomically on every change.
pub struct FileCredentialStore {
    path: PathBuf,
    slots: Mutex<CredentialSlots>,
}

impl FileCredentialStore {
    pub fn open_default() -> Result<Self> {
        Self::open(paths::credentials_path()?)
    }

    /// Opens the store; a missing file means no credentials yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        let slots = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read credentials: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse credentials: {}", path.display()))?
        } else {
            CredentialSlots::default()
        };
        Ok(Self {
            path,
            slots: Mutex::new(slots),
        })
    }

    fn update(&self, apply: impl FnOnce(&mut CredentialSlots)) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        apply(&mut slots);
        let content =
            serde_json::to_string_pretty(&*slots).context("Failed to serialize credentials")?;
        paths::write_private_atomic(&self.path, &content)
    }

    fn read(&self) -> CredentialSlots {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CredentialStore for FileCredentialStore {
    fn session_key(&self) -> Option<String> {
        self.read().session_key
    }

    fn set_session_key(&self, value: Option<&str>) -> Result<()> {
        self.update(|s| CredentialSlots::set(&mut s.session_key, value))
    }

    fn full_cookies(&self) -> Option<String> {
        self.read().full_cookies
    }

    fn set_full_cookies(&self, value: Option<&str>) -> Result<()> {
        self.update(|s| CredentialSlots::set(&mut s.full_cookies, value))
    }

    fn organization_id(&self) -> Option<String> {
        self.read().organization_id
    }

    fn set_organization_id(&self, value: Option<&str>) -> Result<()> {
        self.update(|s| CredentialSlots::set(&mut s.organization_id, value))
    }
}
