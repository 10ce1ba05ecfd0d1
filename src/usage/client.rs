//! Cookie-authenticated client for the claude.ai web usage API.
//!
//! One [`SessionAuthClient::fetch_usage`] call resolves the organization scope
//! (discovering it on first use), fetches the usage windows and classifies
//! every failure into a [`UsageError`]. Nothing is retried inside a call.

use super::credentials::CredentialStore;
use super::error::UsageError;
use super::transport::{HttpResponse, HttpTransport};
use super::types::{ApiUsageWindow, Organization, UsageReport, UsageResponse, UsageWindow};
use crate::settings::ClientIdentity;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Substrings that only appear on the bot-challenge interstitial.
const CHALLENGE_MARKERS: &[&str] = &["Just a moment", "cf_clearance"];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";
const SEC_CH_UA: &str = "\"Google Chrome\";v=\"143\", \"Chromium\";v=\"143\", \"Not A(Brand\";v=\"24\"";
const CLIENT_PLATFORM: &str = "web_claude_ai";
const CLIENT_VERSION: &str = "1.0.0";
const ORIGIN: &str = "https://claude.ai";
const REFERER: &str = "https://claude.ai/settings/usage";

/// Body prefix logged when a 2xx body fails to decode.
const BODY_LOG_PREFIX_CHARS: usize = 200;

pub struct SessionAuthClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    identity: ClientIdentity,
    base_url: String,
    organization_id: Option<String>,
}

impl SessionAuthClient {
    /// Creates a client. A persisted organization override seeds the cache.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialStore>,
        identity: ClientIdentity,
        base_url: &str,
    ) -> Self {
        let organization_id = credentials.organization_id();
        Self {
            transport,
            credentials,
            identity,
            base_url: base_url.trim_end_matches('/').to_string(),
            organization_id,
        }
    }

    /// The cached organization scope, if discovered.
    #[cfg(test)]
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    pub fn fetch_usage(&mut self) -> Result<UsageReport, UsageError> {
        self.fetch_usage_at(Utc::now())
    }

    /// Fetches usage, using `now` as the fetch time and as the fallback reset time.
    pub fn fetch_usage_at(&mut self, now: DateTime<Utc>) -> Result<UsageReport, UsageError> {
        let cookies = self
            .credentials
            .effective_cookies()
            .ok_or(UsageError::NoCredential)?;

        let org_id = match self.organization_id.clone() {
            Some(id) => id,
            None => {
                let id = self.discover_organization(&cookies)?;
                self.cache_organization(&id);
                id
            }
        };

        let url = format!("{}/organizations/{}/usage", self.base_url, org_id);
        let body = self.authorized_get(&url, &cookies)?;
        let response: UsageResponse = decode_body(&body)?;
        Ok(map_usage_response(&response, now))
    }

    fn discover_organization(&mut self, cookies: &str) -> Result<String, UsageError> {
        let url = format!("{}/organizations", self.base_url);
        let body = self.authorized_get(&url, cookies)?;
        let organizations: Vec<Organization> = decode_body(&body)?;

        let first = organizations
            .into_iter()
            .next()
            .filter(|org| !org.uuid.is_empty())
            .ok_or(UsageError::NoOrganization)?;
        tracing::info!("Discovered organization {} ({})", first.uuid, first.name);
        Ok(first.uuid)
    }

    fn authorized_get(&mut self, url: &str, cookies: &str) -> Result<String, UsageError> {
        let response = self
            .transport
            .get(url, &self.request_headers(cookies))
            .map_err(UsageError::Network)?;

        match classify_response(response) {
            Err(UsageError::Unauthorized) => {
                self.invalidate_organization();
                Err(UsageError::Unauthorized)
            }
            other => other,
        }
    }

    fn cache_organization(&mut self, id: &str) {
        self.organization_id = Some(id.to_string());
        if let Err(e) = self.credentials.set_organization_id(Some(id)) {
            tracing::warn!("Failed to persist organization id: {:#}", e);
        }
    }

    fn invalidate_organization(&mut self) {
        tracing::info!("Authorization rejected; clearing cached organization");
        self.organization_id = None;
        if let Err(e) = self.credentials.set_organization_id(None) {
            tracing::warn!("Failed to clear persisted organization id: {:#}", e);
        }
    }

    fn request_headers(&self, cookies: &str) -> Vec<(String, String)> {
        [
            ("Accept", "*/*"),
            ("Content-Type", "application/json"),
            ("Cookie", cookies),
            ("User-Agent", BROWSER_USER_AGENT),
            ("sec-ch-ua", SEC_CH_UA),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"macOS\""),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
            ("anthropic-client-platform", CLIENT_PLATFORM),
            ("anthropic-client-version", CLIENT_VERSION),
            ("anthropic-device-id", self.identity.device_id.as_str()),
            ("anthropic-anonymous-id", self.identity.anonymous_id.as_str()),
            ("Referer", REFERER),
            ("Origin", ORIGIN),
            ("Accept-Language", "en-US,en;q=0.9"),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
    }
}

/// Maps a status code and body onto the failure taxonomy.
///
/// Returns the body for 2xx responses that are not a challenge page.
pub fn classify_response(response: HttpResponse) -> Result<String, UsageError> {
    match response.status {
        401 | 403 => Err(UsageError::Unauthorized),
        status if !response.is_success() => Err(UsageError::InvalidResponse { status }),
        _ if is_challenge_page(&response.body) => Err(UsageError::ChallengeBlocked),
        _ => Ok(response.body),
    }
}

/// True when the body carries a challenge marker or starts with an HTML doctype.
pub fn is_challenge_page(body: &str) -> bool {
    if CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker)) {
        return true;
    }
    let head: String = body.trim_start().chars().take(15).collect();
    head.to_ascii_lowercase().starts_with("<!doctype html")
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, UsageError> {
    serde_json::from_str(body).map_err(|e| {
        if is_challenge_page(body) {
            return UsageError::ChallengeBlocked;
        }
        let prefix: String = body.chars().take(BODY_LOG_PREFIX_CHARS).collect();
        tracing::debug!("Undecodable usage response ({}): {}", e, prefix);
        UsageError::Decoding(e)
    })
}

/// Parses a reset timestamp: RFC 3339 with or without fractional seconds, else `now`.
pub fn parse_reset_time(value: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

fn map_window(window: &ApiUsageWindow, now: DateTime<Utc>) -> UsageWindow {
    UsageWindow {
        utilization: window.utilization,
        resets_at: window
            .resets_at
            .as_deref()
            .map(|value| parse_reset_time(value, now)),
    }
}

/// Required windows default to zero usage resetting `now`.
fn map_required_window(window: Option<&ApiUsageWindow>, now: DateTime<Utc>) -> UsageWindow {
    let mut mapped = window.map(|w| map_window(w, now)).unwrap_or(UsageWindow {
        utilization: 0.0,
        resets_at: None,
    });
    mapped.resets_at.get_or_insert(now);
    mapped
}

pub fn map_usage_response(response: &UsageResponse, now: DateTime<Utc>) -> UsageReport {
    UsageReport {
        session: map_required_window(response.five_hour.as_ref(), now),
        weekly: map_required_window(response.seven_day.as_ref(), now),
        sonnet: response.seven_day_sonnet.as_ref().map(|w| map_window(w, now)),
        opus: response.seven_day_opus.as_ref().map(|w| map_window(w, now)),
        fetched_at: now,
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
