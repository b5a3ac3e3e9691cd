// Wire types for the PoolSync API.
//
// The status payload is returned as `serde_json::Value` because its shape
// varies by firmware; only the small pairing and write bodies are typed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Response to both `pushLink&start` and `pushLink&status`.
///
/// While waiting for the button press the device reports `timeRemaining`.
/// Once pressed it reports `password` and `macAddress` instead.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushLinkStatus {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub time_remaining: Option<i64>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Anything else the firmware sent along.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl PushLinkStatus {
    /// Password, if present and non-blank.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// MAC address, if present and non-blank.
    pub fn mac_address(&self) -> Option<&str> {
        self.mac_address
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

impl fmt::Debug for PushLinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushLinkStatus")
            .field("time_remaining", &self.time_remaining)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("mac_address", &self.mac_address)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Body of a `cmd=devices` PATCH: `{"config": {"<key>": <int>}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceConfigPatch {
    pub config: BTreeMap<String, i64>,
}

impl DeviceConfigPatch {
    /// A patch that sets a single config key.
    pub fn single(key: impl Into<String>, value: i64) -> Self {
        let mut config = BTreeMap::new();
        config.insert(key.into(), value);
        Self { config }
    }
}

/// Accept `120`, `120.0`, or `"120"` for integer fields.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn waiting_status() {
        let status: PushLinkStatus = serde_json::from_value(json!({ "timeRemaining": 95 })).unwrap();
        assert_eq!(status.time_remaining, Some(95));
        assert!(status.password().is_none());
    }

    #[test]
    fn linked_status() {
        let status: PushLinkStatus = serde_json::from_value(json!({
            "password": "abc123",
            "macAddress": "AA:BB:CC:DD:EE:FF"
        }))
        .unwrap();
        assert_eq!(status.password(), Some("abc123"));
        assert_eq!(status.mac_address(), Some("AA:BB:CC:DD:EE:FF"));
        assert!(!format!("{status:?}").contains("abc123"));
    }

    #[test]
    fn string_time_remaining_is_accepted() {
        let status: PushLinkStatus =
            serde_json::from_value(json!({ "timeRemaining": "42" })).unwrap();
        assert_eq!(status.time_remaining, Some(42));
    }

    #[test]
    fn blank_password_is_ignored() {
        let status: PushLinkStatus =
            serde_json::from_value(json!({ "password": "  ", "macAddress": "" })).unwrap();
        assert!(status.password().is_none());
        assert!(status.mac_address().is_none());
    }

    #[test]
    fn patch_body_shape() {
        let patch = DeviceConfigPatch::single("chlorOutput", 45);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "config": { "chlorOutput": 45 } })
        );
    }
}
