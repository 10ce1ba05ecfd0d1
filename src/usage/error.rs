//! Failure taxonomy for the usage fetch path.

use std::fmt::{Display, Formatter};

/// Broad category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    Other,
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TransportErrorKind::Timeout => write!(f, "request timed out: {}", self.message),
            TransportErrorKind::Connection => write!(f, "connection failed: {}", self.message),
            TransportErrorKind::Other => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors that end a single usage fetch. None of them are retried.
#[derive(Debug)]
pub enum UsageError {
    /// No session key or cookie blob is configured.
    NoCredential,
    /// DNS, timeout or connection failure.
    Network(TransportError),
    /// Non-2xx status other than 401/403.
    InvalidResponse { status: u16 },
    /// 401 or 403. The cached organization has been cleared.
    Unauthorized,
    /// Discovery returned an empty organization list.
    NoOrganization,
    /// JSON body that does not match the expected schema.
    Decoding(serde_json::Error),
    /// A bot-mitigation page was served instead of JSON.
    ChallengeBlocked,
}

impl Display for UsageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCredential => write!(
                f,
                "No session key. Run `claude-stats login --session-key <key>` to configure."
            ),
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::InvalidResponse { status } => {
                write!(f, "Invalid response from claude.ai (HTTP {})", status)
            }
            Self::Unauthorized => write!(f, "Session expired. Update your cookie."),
            Self::NoOrganization => write!(f, "Could not find organization."),
            Self::Decoding(_) => write!(f, "Failed to parse usage data."),
            Self::ChallengeBlocked => write!(
                f,
                "Blocked by Cloudflare. Visit claude.ai in browser, then refresh."
            ),
        }
    }
}

impl std::error::Error for UsageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Decoding(e) => Some(e),
            _ => None,
        }
    }
}
