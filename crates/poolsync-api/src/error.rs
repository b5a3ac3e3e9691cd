use thiserror::Error;

/// Top-level error type for the `poolsync-api` crate.
///
/// Connection-level failures (`Connection`, `Timeout`) are kept apart from
/// well-formed error responses sent by the device (`Unauthorized`,
/// `DeviceBusy`, `Status`) and from protocol violations (`Deserialization`).
/// `poolsync-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The device rejected the access password (HTTP 401/403).
    #[error("Device rejected the access credential (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The stored password cannot be sent as a header value.
    #[error("Access credential contains characters that cannot be sent in a header")]
    InvalidCredential,

    // ── Transport ───────────────────────────────────────────────────
    /// Host unreachable, connection refused, or connection reset.
    #[error("Cannot connect to device at {url}: {reason}")]
    Connection { url: String, reason: String },

    /// No response within the configured timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Any other HTTP transport error.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Device responses ────────────────────────────────────────────
    /// The device is busy or temporarily failing; safe to retry later.
    #[error("Device busy (HTTP {status})")]
    DeviceBusy { status: u16 },

    /// Any other non-success status.
    #[error("Device returned HTTP {status}")]
    Status { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The body could not be parsed as JSON, with the raw body for debugging.
    #[error("Malformed response: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the device rejected the credential and the
    /// caller has to pair again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` if this is a transient error worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Connection { .. } | Self::Timeout { .. } | Self::DeviceBusy { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if the device answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status }
            | Self::DeviceBusy { status }
            | Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify a `reqwest` send failure into connection / timeout / other.
    pub(crate) fn from_send(err: reqwest::Error, url: &url::Url, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else if err.is_connect() || err.is_request() {
            Self::Connection {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Timeout { timeout_secs: 5 }.is_transient());
        assert!(Error::DeviceBusy { status: 503 }.is_transient());
        assert!(
            Error::Connection {
                url: "http://10.0.0.2/".into(),
                reason: "refused".into()
            }
            .is_transient()
        );
        assert!(!Error::Unauthorized { status: 401 }.is_transient());
        assert!(
            !Error::Deserialization {
                message: "eof".into(),
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn status_extraction() {
        assert_eq!(Error::Unauthorized { status: 403 }.status(), Some(403));
        assert_eq!(
            Error::Status {
                status: 404,
                body: String::new()
            }
            .status(),
            Some(404)
        );
        assert_eq!(Error::Timeout { timeout_secs: 1 }.status(), None);
    }
}
