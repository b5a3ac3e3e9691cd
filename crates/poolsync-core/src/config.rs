// ── Runtime session configuration ──
//
// These types describe *how* to talk to one PoolSync device. They never
// touch disk; the CLI builds a `SessionConfig` from its profile and hands
// it in.

use std::collections::BTreeMap;
use std::time::Duration;

use poolsync_api::TransportConfig;
use url::Url;

use crate::error::CoreError;
use crate::model::{SubDeviceKind, TemperatureUnit};

/// Polling faster than this is refused by the session.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Default polling interval.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(120);

/// Timing for the push-button pairing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingConfig {
    /// Delay between link-status polls.
    pub poll_interval: Duration,
    /// Hard upper bound on the whole attempt, whatever the device reports.
    pub ceiling: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            ceiling: Duration::from_secs(150),
        }
    }
}

/// Configuration for a session with a single device.
///
/// Built by the CLI, passed to `DeviceSession`; core never reads config files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device root URL (e.g., `http://192.168.1.50/`).
    pub device_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Background refresh interval. Clamped to [`MIN_UPDATE_INTERVAL`].
    pub update_interval: Duration,
    /// Unit the device reports temperatures and setpoints in.
    pub temperature_unit: TemperatureUnit,
    /// Forced sub-device kinds by slot, bypassing field-signature detection.
    pub slot_overrides: BTreeMap<u32, SubDeviceKind>,
    /// Pairing loop timing.
    pub pairing: PairingConfig,
}

impl SessionConfig {
    /// Configuration with defaults for everything but the device address.
    pub fn new(device_url: Url) -> Self {
        Self {
            device_url,
            timeout: poolsync_api::transport::DEFAULT_TIMEOUT,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            temperature_unit: TemperatureUnit::default(),
            slot_overrides: BTreeMap::new(),
            pairing: PairingConfig::default(),
        }
    }

    /// Configuration for a bare IP address or `host:port`.
    pub fn for_host(host: &str) -> Result<Self, CoreError> {
        Ok(Self::new(poolsync_api::device_base_url(host)?))
    }

    /// Refresh interval after applying the minimum.
    pub fn effective_update_interval(&self) -> Duration {
        self.update_interval.max(MIN_UPDATE_INTERVAL)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.timeout)
    }
}
