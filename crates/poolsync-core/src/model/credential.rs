// ── Access credential ──

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

/// The secret issued by the device at pairing time, plus the hardware
/// identifier of the device that issued it.
///
/// Immutable once created. The password never appears in `Debug` output.
#[derive(Debug, Clone)]
pub struct Credential {
    access_password: SecretString,
    device_mac: String,
    paired_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_password: SecretString,
        device_mac: impl Into<String>,
        paired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_password,
            device_mac: device_mac.into(),
            paired_at,
        }
    }

    pub fn access_password(&self) -> &SecretString {
        &self.access_password
    }

    /// MAC address as reported by the device.
    pub fn device_mac(&self) -> &str {
        &self.device_mac
    }

    pub fn paired_at(&self) -> DateTime<Utc> {
        self.paired_at
    }

    /// Whether both credentials carry the same access password.
    pub fn same_password(&self, other: &Credential) -> bool {
        self.access_password.expose_secret() == other.access_password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let cred = Credential::new(
            SecretString::from("topsecret".to_string()),
            "AA:BB:CC:DD:EE:FF",
            Utc::now(),
        );
        let dbg = format!("{cred:?}");
        assert!(!dbg.contains("topsecret"));
        assert!(dbg.contains("AA:BB:CC:DD:EE:FF"));
    }
}
