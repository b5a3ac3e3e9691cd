// ── Command API ──
//
// Every write to the device is a `ControlTarget` plus an integer value.
// `encode` validates both against the last snapshot before anything goes
// on the wire.

pub mod encode;

use std::ops::RangeInclusive;

use poolsync_api::DeviceConfigPatch;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::model::{SubDeviceKind, TemperatureUnit};

pub use encode::encode;

/// A writable control on one of the sub-devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ControlTarget {
    /// Chlorinator output, 0–100 %.
    ChlorinatorOutputPercent,
    /// Heat-pump mode code (0 = off, 1 = heat, 2 = cool).
    HeatPumpMode,
    /// Heat-pump setpoint in the device's native unit.
    HeatPumpSetpoint,
}

impl ControlTarget {
    /// Sub-device kind this control belongs to.
    pub fn kind(self) -> SubDeviceKind {
        match self {
            Self::ChlorinatorOutputPercent => SubDeviceKind::Chlorinator,
            Self::HeatPumpMode | Self::HeatPumpSetpoint => SubDeviceKind::HeatPump,
        }
    }

    /// Key written under `config` in the PATCH body.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::ChlorinatorOutputPercent => "chlorOutput",
            Self::HeatPumpMode => "mode",
            Self::HeatPumpSetpoint => "setpoint",
        }
    }

    /// Values the device accepts.
    pub fn legal_range(self, unit: TemperatureUnit) -> RangeInclusive<i64> {
        match self {
            Self::ChlorinatorOutputPercent => 0..=100,
            Self::HeatPumpMode => 0..=2,
            Self::HeatPumpSetpoint => unit.setpoint_range(),
        }
    }
}

/// A validated write, ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRequest {
    pub target: ControlTarget,
    /// Sub-device slot the write is addressed to.
    pub slot: u32,
    pub key: &'static str,
    pub value: i64,
}

impl ControlRequest {
    /// The `{"config": {key: value}}` body.
    pub fn patch(&self) -> DeviceConfigPatch {
        DeviceConfigPatch::single(self.key, self.value)
    }
}
