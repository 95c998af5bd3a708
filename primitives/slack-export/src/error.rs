//! Error types for the export pass.

use std::path::PathBuf;

/// Slack error codes that mean the token itself is unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "missing_scope",
    "no_permission",
    "not_allowed_token_type",
];

/// Slack error codes that are worth another attempt.
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ratelimited",
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

/// Errors that can stop an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("authentication failed for {method}: {reason}")]
    Auth { method: String, reason: String },

    #[error("{method} returned error: {error}")]
    Api { method: String, error: String },

    #[error("{method} still rate limited after {attempts} attempts")]
    RateLimited { method: String, attempts: u32 },

    #[error("{method} failed with status {status}")]
    Status { method: String, status: u16 },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ExportError {
    /// Classifies an `ok: false` payload from the Slack API.
    pub fn from_api(method: &str, error: &str) -> Self {
        if AUTH_ERROR_CODES.contains(&error) {
            Self::Auth {
                method: method.to_string(),
                reason: error.to_string(),
            }
        } else {
            Self::Api {
                method: method.to_string(),
                error: error.to_string(),
            }
        }
    }

    /// Whether another attempt at the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Api { error, .. } => TRANSIENT_ERROR_CODES.contains(&error.as_str()),
            _ => false,
        }
    }

    /// Whether the token was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
