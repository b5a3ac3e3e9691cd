// ── Device snapshot types ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::field::{FieldDiagnostic, FieldValue, Temperature};

/// Stable field names used in [`SubDeviceState::fields`].
pub mod fields {
    pub const WATER_TEMP: &str = "water_temp";
    pub const SALT_PPM: &str = "salt_ppm";
    pub const FLOW_RATE: &str = "flow_rate";
    pub const OUTPUT_PERCENT: &str = "output_percent";
    pub const BOOST_REMAINING: &str = "boost_remaining";
    pub const FORWARD_CURRENT: &str = "forward_current";
    pub const REVERSE_CURRENT: &str = "reverse_current";
    pub const OUTPUT_VOLTAGE: &str = "output_voltage";
    pub const CELL_SERIAL: &str = "cell_serial";
    pub const CELL_FW_VERSION: &str = "cell_fw_version";
    pub const CELL_HW_VERSION: &str = "cell_hw_version";

    pub const AIR_TEMP: &str = "air_temp";
    pub const MODE: &str = "mode";
    pub const SETPOINT: &str = "setpoint";
    pub const COMPRESSOR_RPM: &str = "compressor_rpm";
    pub const STATE_FLAGS: &str = "state_flags";
    pub const CTRL_FLAGS: &str = "ctrl_flags";
}

/// Factory name the device ships with; replaced by a MAC-based name for display.
const FACTORY_NAME: &str = "PoolSync®";

/// Equipment type of a sub-device slot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubDeviceKind {
    #[serde(alias = "chlorSync")]
    #[strum(to_string = "chlorinator", serialize = "chlorsync")]
    Chlorinator,
    #[serde(alias = "heatPump")]
    #[strum(to_string = "heat_pump", serialize = "heatpump")]
    HeatPump,
    Unknown,
}

/// Heat-pump operating mode, as written to `config.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HeatPumpMode {
    Off,
    Heat,
    Cool,
}

impl HeatPumpMode {
    /// Map a device mode code. Codes outside 0–2 return `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Heat),
            2 => Some(Self::Cool),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Cool => 2,
        }
    }
}

/// What the heat pump is doing right now, derived from its flag words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HeatPumpActivity {
    Off,
    Idle,
    Heating,
    Cooling,
}

/// Controller-level information from the `poolSync` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemInfo {
    pub name: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,
    /// Board temperature in °C.
    pub board_temp: Option<f64>,
    /// Wi-Fi signal strength in dBm.
    pub rssi: Option<i64>,
    /// The device's own clock.
    pub device_time: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
}

/// One equipment module as reported in a single poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubDeviceState {
    pub slot: u32,
    pub kind: SubDeviceKind,
    /// Name the module reports in `nodeAttr.name`.
    pub name: Option<String>,
    pub online: bool,
    pub fault: bool,
    pub fault_codes: Vec<i64>,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<FieldDiagnostic>,
}

impl SubDeviceState {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn temperature(&self, name: &str) -> Option<&Temperature> {
        match self.fields.get(name)? {
            FieldValue::Temperature(t) => Some(t),
            _ => None,
        }
    }

    /// Numeric value of any field.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(FieldValue::as_f64)
    }

    fn integer(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(FieldValue::as_i64)
    }

    // ── Chlorinator ──────────────────────────────────────────────────

    pub fn output_percent(&self) -> Option<f64> {
        self.number(fields::OUTPUT_PERCENT)
    }

    pub fn salt_ppm(&self) -> Option<f64> {
        self.number(fields::SALT_PPM)
    }

    // ── Heat pump ────────────────────────────────────────────────────

    pub fn mode_code(&self) -> Option<i64> {
        self.integer(fields::MODE)
    }

    pub fn heat_pump_mode(&self) -> Option<HeatPumpMode> {
        self.mode_code().and_then(HeatPumpMode::from_code)
    }

    pub fn setpoint(&self) -> Option<&Temperature> {
        self.temperature(fields::SETPOINT)
    }

    /// Heating in mode 1 once the state word passes 257.
    pub fn is_heating_active(&self) -> bool {
        self.mode_code() == Some(1) && self.state_flags().is_some_and(|s| s > 257)
    }

    /// Only meaningful in heat mode; always false otherwise.
    pub fn fan_running(&self) -> bool {
        self.mode_code() == Some(1) && self.state_flags().is_some_and(|s| s >= 264)
    }

    pub fn compressor_running(&self) -> bool {
        self.mode_code() == Some(1) && self.ctrl_flags().is_some_and(|c| c >= 397)
    }

    pub fn water_flow(&self) -> bool {
        self.ctrl_flags().is_some_and(|c| c & 1 == 1)
    }

    /// Combine mode and flag words into a single activity value.
    ///
    /// Returns `None` unless mode and both flag words are present.
    pub fn heat_pump_activity(&self) -> Option<HeatPumpActivity> {
        let mode = self.heat_pump_mode()?;
        let state = self.state_flags()?;
        let ctrl = self.ctrl_flags()?;
        Some(match mode {
            HeatPumpMode::Off => HeatPumpActivity::Off,
            HeatPumpMode::Heat if state > 257 && ctrl >= 397 => HeatPumpActivity::Heating,
            HeatPumpMode::Cool if state >= 272 && ctrl >= 445 => HeatPumpActivity::Cooling,
            HeatPumpMode::Heat | HeatPumpMode::Cool => HeatPumpActivity::Idle,
        })
    }

    fn state_flags(&self) -> Option<i64> {
        self.integer(fields::STATE_FLAGS)
    }

    fn ctrl_flags(&self) -> Option<i64> {
        self.integer(fields::CTRL_FLAGS)
    }
}

/// Everything learned from one successful status poll.
///
/// Replaced wholesale on every refresh; never merged with an older one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub online: bool,
    pub system_fault: bool,
    pub service_mode: bool,
    pub system: SystemInfo,
    /// Ordered by slot; slots are unique.
    pub sub_devices: Vec<SubDeviceState>,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<FieldDiagnostic>,
}

impl DeviceSnapshot {
    pub fn sub_device(&self, slot: u32) -> Option<&SubDeviceState> {
        self.sub_devices.iter().find(|d| d.slot == slot)
    }

    /// Lowest-slot sub-device of the given kind.
    pub fn first_of_kind(&self, kind: SubDeviceKind) -> Option<&SubDeviceState> {
        self.sub_devices.iter().find(|d| d.kind == kind)
    }

    pub fn chlorinator(&self) -> Option<&SubDeviceState> {
        self.first_of_kind(SubDeviceKind::Chlorinator)
    }

    pub fn heat_pump(&self) -> Option<&SubDeviceState> {
        self.first_of_kind(SubDeviceKind::HeatPump)
    }

    /// Every diagnostic in the snapshot, including per-sub-device ones.
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &FieldDiagnostic> {
        self.diagnostics
            .iter()
            .chain(self.sub_devices.iter().flat_map(|d| d.diagnostics.iter()))
    }

    /// Name to show the user.
    ///
    /// The device's configured name, unless it still carries the factory
    /// name, in which case `PoolSync <last 6 of MAC>`.
    pub fn display_name(&self, mac: Option<&str>) -> String {
        match self.system.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() && name != FACTORY_NAME => name.to_string(),
            _ => fallback_name(mac),
        }
    }
}

fn fallback_name(mac: Option<&str>) -> String {
    let hex: String = mac
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect();
    if hex.len() < 6 {
        return "PoolSync".to_string();
    }
    format!("PoolSync {}", hex[hex.len() - 6..].to_uppercase())
}
