// ── Core error types ──
//
// User-facing errors from poolsync-core. Consumers never match on raw HTTP
// details; the `From<poolsync_api::Error>` impl translates transport-layer
// errors into the session's taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Device did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Device is busy (HTTP {status}), try again shortly")]
    DeviceBusy { status: u16 },

    // ── Credential errors ────────────────────────────────────────────
    #[error("Device rejected the stored credential; pair again")]
    Unauthorized,

    #[error("No credential for this device; run pairing first")]
    NotPaired,

    // ── Pairing errors ───────────────────────────────────────────────
    #[error("Pairing timed out after {waited_secs}s without a button press")]
    PairingTimeout { waited_secs: u64 },

    #[error("Device rejected pairing: {reason}")]
    PairingRejected { reason: String },

    #[error("A pairing attempt is already in progress for this device")]
    PairingInProgress,

    #[error("Pairing was cancelled")]
    PairingCancelled,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed response from device: {message}")]
    MalformedResponse { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Device returned an error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to persist credential: {message}")]
    Persistence { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::DeviceBusy { .. }
        )
    }

    /// Returns `true` when the only way forward is to pair again.
    pub fn requires_pairing(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NotPaired)
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<poolsync_api::Error> for CoreError {
    fn from(err: poolsync_api::Error) -> Self {
        match err {
            poolsync_api::Error::Unauthorized { .. } => CoreError::Unauthorized,
            poolsync_api::Error::InvalidCredential => CoreError::Config {
                message: "stored access credential is not a valid header value".into(),
            },
            poolsync_api::Error::Connection { url, reason } => {
                CoreError::ConnectionFailed { url, reason }
            }
            poolsync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            poolsync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            poolsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid device URL: {e}"),
            },
            poolsync_api::Error::ClientBuild(msg) => CoreError::Internal(msg),
            poolsync_api::Error::DeviceBusy { status } => CoreError::DeviceBusy { status },
            poolsync_api::Error::Status { status, body } => CoreError::Api {
                message: if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    format!("HTTP {status}: {}", body.trim())
                },
                status: Some(status),
            },
            poolsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedResponse { message }
            }
        }
    }
}
