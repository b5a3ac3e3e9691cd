//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use poolsync_config::ConfigError;
use poolsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const BUSY: i32 = 4;
    pub const PAIRING: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(poolsync::connection_failed),
        help(
            "Check that the controller is powered on and reachable on the local network.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(poolsync::timeout),
        help("Increase the timeout with --timeout or check the device's Wi-Fi signal.")
    )]
    Timeout { seconds: u64 },

    #[error("Device is busy (HTTP {status})")]
    #[diagnostic(
        code(poolsync::busy),
        help("The controller handles one request at a time. Try again in a few seconds.")
    )]
    DeviceBusy { status: u16 },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("The device rejected the stored credential")]
    #[diagnostic(
        code(poolsync::unauthorized),
        help("Pair again: poolsync pair --profile {profile}")
    )]
    Unauthorized { profile: String },

    #[error("No credential configured for profile '{profile}'")]
    #[diagnostic(
        code(poolsync::not_paired),
        help(
            "Pair with the device first: poolsync pair <device-ip>\n\
             Or set the POOLSYNC_PASSWORD environment variable."
        )
    )]
    NotPaired { profile: String },

    // ── Pairing ──────────────────────────────────────────────────────
    #[error("Pairing timed out after {seconds}s")]
    #[diagnostic(
        code(poolsync::pairing_timeout),
        help("Press the push-link button on the controller while pairing is waiting.")
    )]
    PairingTimeout { seconds: u64 },

    #[error("Pairing failed: {reason}")]
    #[diagnostic(code(poolsync::pairing_failed))]
    PairingFailed { reason: String },

    #[error("Pairing was cancelled")]
    #[diagnostic(code(poolsync::pairing_cancelled))]
    PairingCancelled,

    // ── Device data ──────────────────────────────────────────────────
    #[error("Unexpected response from device: {message}")]
    #[diagnostic(
        code(poolsync::malformed_response),
        help("Run with -vv to log the raw response.")
    )]
    MalformedResponse { message: String },

    #[error("Device error: {message}")]
    #[diagnostic(code(poolsync::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poolsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(poolsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: poolsync pair <device-ip> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(poolsync::no_config),
        help(
            "Pair with a device: poolsync pair <device-ip>\n\
             Or pass --device. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{0}")]
    #[diagnostic(code(poolsync::config))]
    Config(String),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::DeviceBusy { .. } => exit_code::BUSY,
            Self::Unauthorized { .. } | Self::NotPaired { .. } => exit_code::AUTH,
            Self::PairingTimeout { .. } | Self::PairingFailed { .. } => exit_code::PAIRING,
            Self::PairingCancelled => exit_code::INTERRUPTED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to credential errors.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::Unauthorized { .. } => Self::Unauthorized {
                profile: name.into(),
            },
            Self::NotPaired { .. } => Self::NotPaired {
                profile: name.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceBusy { status } => Self::DeviceBusy { status },
            CoreError::Unauthorized => Self::Unauthorized {
                profile: "default".into(),
            },
            CoreError::NotPaired => Self::NotPaired {
                profile: "default".into(),
            },
            CoreError::PairingTimeout { waited_secs } => Self::PairingTimeout {
                seconds: waited_secs,
            },
            CoreError::PairingRejected { reason } => Self::PairingFailed { reason },
            CoreError::PairingInProgress => Self::PairingFailed {
                reason: "another pairing attempt is in progress".into(),
            },
            CoreError::PairingCancelled => Self::PairingCancelled,
            CoreError::MalformedResponse { message } => Self::MalformedResponse { message },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "value".into(),
                reason: message,
            },
            CoreError::Api { message, status } => Self::ApiError {
                message: match status {
                    Some(code) => format!("HTTP {code}: {message}"),
                    None => message,
                },
            },
            CoreError::Config { message } | CoreError::Persistence { message } => {
                Self::Config(message)
            }
            CoreError::Internal(message) => Self::ApiError { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => Self::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}
