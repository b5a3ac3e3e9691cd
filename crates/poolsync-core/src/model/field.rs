// ── Typed field values ──

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Unit the device reports temperatures in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum TemperatureUnit {
    #[default]
    #[serde(alias = "f")]
    #[strum(to_string = "fahrenheit", serialize = "f")]
    Fahrenheit,
    #[serde(alias = "c")]
    #[strum(to_string = "celsius", serialize = "c")]
    Celsius,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Fahrenheit => "°F",
            Self::Celsius => "°C",
        }
    }

    /// Convert a value in this unit to Celsius.
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            Self::Celsius => value,
        }
    }

    /// Setpoints the heat pump accepts in this unit.
    pub fn setpoint_range(self) -> RangeInclusive<i64> {
        match self {
            Self::Fahrenheit => 40..=104,
            Self::Celsius => 5..=40,
        }
    }
}

/// A temperature as reported, with a normalized Celsius value alongside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TemperatureUnit,
    pub celsius: f64,
}

impl Temperature {
    pub fn new(value: f64, unit: TemperatureUnit) -> Self {
        Self {
            value,
            unit,
            celsius: unit.to_celsius(value),
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            TemperatureUnit::Celsius => write!(f, "{} {}", trim_float(self.value), self.unit.symbol()),
            TemperatureUnit::Fahrenheit => write!(
                f,
                "{} {} ({:.1} °C)",
                trim_float(self.value),
                self.unit.symbol(),
                self.celsius
            ),
        }
    }
}

/// A 0–100 percentage. `original` is set when the device reported
/// something outside the range and the value was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percent {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<f64>,
}

impl Percent {
    /// Clamp into range, remembering the reported value if it changed.
    pub fn clamped(raw: f64) -> Self {
        let value = raw.clamp(0.0, 100.0);
        #[allow(clippy::float_cmp)]
        let original = (value != raw).then_some(raw);
        Self { value, original }
    }

    pub fn was_clamped(&self) -> bool {
        self.original.is_some()
    }
}

/// One decoded field of a sub-device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Temperature(Temperature),
    Percent(Percent),
    Ppm(f64),
    Rpm(f64),
    Milliamps(f64),
    Millivolts(f64),
    Seconds(i64),
    /// Enumerated mode code, passed through as reported.
    Code(i64),
    /// Firmware bit field.
    Flags(i64),
    Text(String),
    /// Any other scalar, kept verbatim.
    Raw(serde_json::Value),
}

impl FieldValue {
    /// Numeric view of the field. Temperatures yield their native value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Temperature(t) => Some(t.value),
            Self::Percent(p) => Some(p.value),
            Self::Ppm(v) | Self::Rpm(v) | Self::Milliamps(v) | Self::Millivolts(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Seconds(v) | Self::Code(v) | Self::Flags(v) => Some(*v as f64),
            Self::Raw(v) => v.as_f64(),
            Self::Text(_) => None,
        }
    }

    /// Integer view of the field, when it holds a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Seconds(v) | Self::Code(v) | Self::Flags(v) => Some(*v),
            Self::Raw(v) => v.as_i64(),
            other => other.as_f64().and_then(whole_number),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Raw(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature(t) => t.fmt(f),
            Self::Percent(p) => write!(f, "{}%", trim_float(p.value)),
            Self::Ppm(v) => write!(f, "{} ppm", trim_float(*v)),
            Self::Rpm(v) => write!(f, "{} rpm", trim_float(*v)),
            Self::Milliamps(v) => write!(f, "{} mA", trim_float(*v)),
            Self::Millivolts(v) => write!(f, "{} mV", trim_float(*v)),
            Self::Seconds(v) => write!(f, "{v}s"),
            Self::Code(v) | Self::Flags(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Raw(v) => match v {
                serde_json::Value::String(s) => f.write_str(s),
                other => write!(f, "{other}"),
            },
        }
    }
}

/// A field the decoder could not interpret cleanly.
///
/// `path` is the device-side location, e.g. `devices.0.status.saltPPM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiagnostic {
    pub path: String,
    pub message: String,
}

impl FieldDiagnostic {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn whole_number(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15).then_some(v as i64)
}

/// `82.0` prints as `82`, `27.5` stays `27.5`.
fn trim_float(v: f64) -> String {
    whole_number(v).map_or_else(|| format!("{v:.1}"), |i| i.to_string())
}
