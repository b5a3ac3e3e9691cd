// Pure validation and encoding of control writes. No I/O.

use tracing::debug;

use crate::error::CoreError;
use crate::model::{DeviceSnapshot, TemperatureUnit};

use super::{ControlRequest, ControlTarget};

/// Validate `value` for `target` and address it to the matching sub-device.
///
/// Fails with [`CoreError::ValidationFailed`] when the value is out of
/// range, when there is no snapshot yet, or when the snapshot has no
/// sub-device of the kind the target controls.
pub fn encode(
    target: ControlTarget,
    value: i64,
    snapshot: Option<&DeviceSnapshot>,
    unit: TemperatureUnit,
) -> Result<ControlRequest, CoreError> {
    let range = target.legal_range(unit);
    if !range.contains(&value) {
        let suffix = match target {
            ControlTarget::HeatPumpSetpoint => format!(" {}", unit.symbol()),
            ControlTarget::ChlorinatorOutputPercent => "%".to_string(),
            ControlTarget::HeatPumpMode => String::new(),
        };
        return Err(CoreError::validation(format!(
            "{target} must be between {}{suffix} and {}{suffix}, got {value}",
            range.start(),
            range.end()
        )));
    }

    let snapshot = snapshot.ok_or_else(|| {
        CoreError::validation(format!(
            "cannot address {target}: no device status yet, refresh first"
        ))
    })?;

    let kind = target.kind();
    let sub_device = snapshot.first_of_kind(kind).ok_or_else(|| {
        CoreError::validation(format!("device reports no {kind} for {target}"))
    })?;

    let request = ControlRequest {
        target,
        slot: sub_device.slot,
        key: target.config_key(),
        value,
    };
    debug!(?request, "encoded control write");
    Ok(request)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{SubDeviceKind, SubDeviceState, SystemInfo};

    fn sub_device(slot: u32, kind: SubDeviceKind) -> SubDeviceState {
        SubDeviceState {
            slot,
            kind,
            name: None,
            online: true,
            fault: false,
            fault_codes: Vec::new(),
            fields: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn snapshot(devices: Vec<SubDeviceState>) -> DeviceSnapshot {
        DeviceSnapshot {
            online: true,
            system_fault: false,
            service_mode: false,
            system: SystemInfo::default(),
            sub_devices: devices,
            fetched_at: Utc::now(),
            diagnostics: Vec::new(),
        }
    }

    fn both() -> DeviceSnapshot {
        snapshot(vec![
            sub_device(0, SubDeviceKind::Chlorinator),
            sub_device(1, SubDeviceKind::HeatPump),
        ])
    }

    #[test]
    fn output_percent_is_addressed_to_chlorinator_slot() {
        let snap = both();
        let req = encode(
            ControlTarget::ChlorinatorOutputPercent,
            45,
            Some(&snap),
            TemperatureUnit::Fahrenheit,
        )
        .unwrap();
        assert_eq!(req.slot, 0);
        assert_eq!(req.key, "chlorOutput");
        assert_eq!(
            serde_json::to_value(req.patch()).unwrap(),
            json!({ "config": { "chlorOutput": 45 } })
        );
    }

    #[test]
    fn heat_pump_targets_use_heat_pump_slot() {
        let snap = both();
        let mode = encode(ControlTarget::HeatPumpMode, 2, Some(&snap), TemperatureUnit::Fahrenheit)
            .unwrap();
        assert_eq!((mode.slot, mode.key, mode.value), (1, "mode", 2));

        let sp = encode(
            ControlTarget::HeatPumpSetpoint,
            82,
            Some(&snap),
            TemperatureUnit::Fahrenheit,
        )
        .unwrap();
        assert_eq!((sp.slot, sp.key, sp.value), (1, "setpoint", 82));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let snap = both();
        let f = TemperatureUnit::Fahrenheit;
        for (target, value) in [
            (ControlTarget::ChlorinatorOutputPercent, -1),
            (ControlTarget::ChlorinatorOutputPercent, 101),
            (ControlTarget::HeatPumpMode, 3),
            (ControlTarget::HeatPumpMode, -1),
            (ControlTarget::HeatPumpSetpoint, 39),
            (ControlTarget::HeatPumpSetpoint, 105),
        ] {
            let err = encode(target, value, Some(&snap), f).unwrap_err();
            assert!(
                matches!(err, CoreError::ValidationFailed { .. }),
                "{target} {value}: {err:?}"
            );
        }
    }

    #[test]
    fn range_boundaries_are_accepted() {
        let snap = both();
        let f = TemperatureUnit::Fahrenheit;
        assert!(encode(ControlTarget::ChlorinatorOutputPercent, 0, Some(&snap), f).is_ok());
        assert!(encode(ControlTarget::ChlorinatorOutputPercent, 100, Some(&snap), f).is_ok());
        assert!(encode(ControlTarget::HeatPumpSetpoint, 40, Some(&snap), f).is_ok());
        assert!(encode(ControlTarget::HeatPumpSetpoint, 104, Some(&snap), f).is_ok());
    }

    #[test]
    fn celsius_setpoint_range() {
        let snap = both();
        let c = TemperatureUnit::Celsius;
        assert!(encode(ControlTarget::HeatPumpSetpoint, 28, Some(&snap), c).is_ok());
        assert!(encode(ControlTarget::HeatPumpSetpoint, 82, Some(&snap), c).is_err());
        assert!(encode(ControlTarget::HeatPumpSetpoint, 4, Some(&snap), c).is_err());
    }

    #[test]
    fn missing_kind_or_snapshot_is_rejected() {
        let chlor_only = snapshot(vec![sub_device(0, SubDeviceKind::Chlorinator)]);
        let err = encode(
            ControlTarget::HeatPumpMode,
            1,
            Some(&chlor_only),
            TemperatureUnit::Fahrenheit,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));

        let err = encode(
            ControlTarget::ChlorinatorOutputPercent,
            10,
            None,
            TemperatureUnit::Fahrenheit,
        )
        .unwrap_err();
        assert!(err.to_string().contains("refresh first"));
    }
}
