//! Typed error taxonomy for the migration pipeline.
//!
//! Every error that crosses a module boundary is a [`MigrationError`] so the
//! retry engine can classify it and the CLI can map it to an exit code.
//! `anyhow` is still used at the application edges (main, test setup); the
//! seams between components speak this type.

use std::time::Duration;
use thiserror::Error;

/// Failure modes of the device-code / refresh-token flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// The user declined the device-code authorization prompt.
    Declined,
    /// The device code expired before the user completed sign-in.
    Expired,
    /// Polling stayed in `authorization_pending` past the overall deadline.
    PendingTimeout,
    /// The token endpoint rejected the device code itself.
    InvalidCode,
    /// The refresh-token exchange failed.
    Refresh,
}

impl AuthErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::PendingTimeout => "pending timeout",
            Self::InvalidCode => "invalid code",
            Self::Refresh => "refresh failed",
        }
    }
}

/// The error taxonomy. Kinds, retryability, and user-facing hints in one place.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Missing or malformed environment configuration. Fatal, never retried.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Source data violates the expected shape. Collected per entity and
    /// summarized; aborts the project only on structural fields.
    #[error("validation error{}: {message}", entity_suffix(.entity))]
    Validation {
        message: String,
        entity: Option<String>,
    },

    /// Network or HTTP transport failure. Candidate for retry.
    #[error("connection error{}: {message}", status_suffix(.status))]
    Connection {
        message: String,
        /// HTTP status, when the failure had a response at all.
        status: Option<u16>,
        /// OS-level error code (ETIMEDOUT, ECONNREFUSED, ...), when known.
        code: Option<String>,
        /// Server-indicated Retry-After, when present (429 responses).
        retry_after_ms: Option<u64>,
    },

    /// Token acquisition or refresh failure. Not retried at unit level.
    #[error("authentication error ({}): {message}", .kind.as_str())]
    Auth {
        kind: AuthErrorKind,
        message: String,
    },

    /// Retrieved successfully but semantically invalid source data.
    #[error("data error{}: {message}", entity_suffix(.entity))]
    Data {
        message: String,
        entity: Option<String>,
    },

    /// Target-side 403 on a structural operation. Fatal.
    #[error("permission error: {message}")]
    Permission { message: String },

    /// The run was cancelled from outside.
    #[error("cancelled")]
    Cancelled,
}

fn entity_suffix(entity: &Option<String>) -> String {
    match entity {
        Some(e) => format!(" [{}]", e),
        None => String::new(),
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" (HTTP {})", s),
        None => String::new(),
    }
}

/// Network error codes treated as transient.
const TRANSIENT_CODES: &[&str] = &[
    "ETIMEDOUT",
    "ECONNABORTED",
    "ECONNREFUSED",
    "ENOTFOUND",
    "ENETUNREACH",
];

impl MigrationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            entity: None,
        }
    }

    pub fn validation_for(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            entity: Some(entity.into()),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
            entity: None,
        }
    }

    pub fn data_for(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
            entity: Some(entity.into()),
        }
    }

    pub fn auth(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Auth {
            kind,
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// Connection failure with an HTTP status attached.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            status: Some(status),
            code: None,
            retry_after_ms: None,
        }
    }

    /// Rate limit (429) with the server-indicated Retry-After.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::Connection {
            message: message.into(),
            status: Some(429),
            code: None,
            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
        }
    }

    /// Map a reqwest transport error into the taxonomy.
    ///
    /// Errors with a response status keep it; pure transport errors carry the
    /// closest OS-level code we can infer so the classifier treats them as
    /// transient.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let code = if err.is_timeout() {
            Some("ETIMEDOUT".to_string())
        } else if err.is_connect() {
            Some("ECONNREFUSED".to_string())
        } else {
            None
        };
        Self::Connection {
            message: err.to_string(),
            status,
            code,
            retry_after_ms: None,
        }
    }

    /// Retry classification. The table:
    ///
    /// | condition                         | retryable |
    /// |-----------------------------------|-----------|
    /// | HTTP 404 (read-after-write)       | yes       |
    /// | HTTP 429                          | yes       |
    /// | HTTP 5xx                          | yes       |
    /// | transient network codes           | yes       |
    /// | HTTP 401 / 403                    | no        |
    /// | other HTTP 4xx                    | no        |
    /// | connection with no status/code    | yes       |
    /// | everything else in the taxonomy   | no        |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { status, code, .. } => match status {
                Some(404) | Some(429) => true,
                Some(s) if *s >= 500 => true,
                Some(_) => false,
                None => match code {
                    Some(c) => TRANSIENT_CODES.contains(&c.as_str()),
                    // No status, no code: treat as transient.
                    None => true,
                },
            },
            _ => false,
        }
    }

    /// Server-indicated delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Connection {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// One-line "what to do" hint for the user-visible failure summary.
    ///
    /// Explicit per kind where the fix is known; keyword-inferred otherwise.
    pub fn hint(&self) -> String {
        match self {
            Self::Configuration { message } => {
                if message.contains("SMARTSHEET_API_TOKEN") {
                    "Set SMARTSHEET_API_TOKEN to a valid Smartsheet API token (26 alphanumeric characters).".into()
                } else if message.contains("TENANT_ID") || message.contains("CLIENT_ID") {
                    "Set TENANT_ID and CLIENT_ID to the Azure AD app registration values.".into()
                } else if message.contains("PROJECT_ONLINE_URL") {
                    "Set PROJECT_ONLINE_URL to your PWA root, e.g. https://contoso.sharepoint.com/sites/pwa.".into()
                } else {
                    "Check the environment configuration and re-run `pmo-migrate config`.".into()
                }
            }
            Self::Auth { kind, .. } => match kind {
                AuthErrorKind::Declined => {
                    "Sign-in was declined. Re-run and approve the device-code prompt.".into()
                }
                AuthErrorKind::Expired | AuthErrorKind::PendingTimeout => {
                    "The sign-in window elapsed. Re-run and complete the device-code prompt promptly.".into()
                }
                AuthErrorKind::InvalidCode => {
                    "Verify TENANT_ID and CLIENT_ID match the app registration, then re-run.".into()
                }
                AuthErrorKind::Refresh => {
                    "The cached token could not be refreshed. Run `pmo-migrate auth:clear` and sign in again.".into()
                }
            },
            Self::Permission { .. } => {
                "Grant the API token owner access to the target workspace (PMO Standards requires owner).".into()
            }
            Self::Connection {
                status: Some(429),
                retry_after_ms,
                ..
            } => match retry_after_ms {
                Some(ms) => format!(
                    "Rate limited; the server asked to wait {}s. Re-run, or lower the request rate.",
                    ms / 1000
                ),
                None => "Rate limited. Wait a minute and retry, or lower the request rate.".into(),
            },
            Self::Connection { .. } => {
                "Check network connectivity to the source and target endpoints, then retry.".into()
            }
            Self::Cancelled => "The run was cancelled; re-run to resume (completed work is reused).".into(),
            Self::Validation { message, .. } | Self::Data { message, .. } => {
                // Keyword inference for the free-form kinds.
                let lower = message.to_lowercase();
                if lower.contains("token") {
                    "Check the configured credentials and re-authenticate.".into()
                } else if lower.contains("rate limit") {
                    "Wait for the indicated interval and retry.".into()
                } else {
                    "Fix the flagged source record in Project Online, or re-run to skip past it.".into()
                }
            }
        }
    }

    /// Process exit code for a run that failed with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Data { .. } => 1,
            Self::Auth { .. } => 2,
            Self::Configuration { .. } => 3,
            Self::Connection { .. } | Self::Permission { .. } => 4,
            Self::Cancelled => 5,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;
