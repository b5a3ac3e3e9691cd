// ── Status payload decoding ──
//
// Turns the loosely-typed `cmd=poolSync&all` JSON into a `DeviceSnapshot`.
// Decoding is permissive: a field that cannot be interpreted becomes a
// diagnostic and everything else still decodes. A payload without the
// `poolSync` and `devices` blocks is rejected: devices answer errors with a
// 2xx JSON body of some other shape.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::model::{
    DeviceSnapshot, FieldDiagnostic, FieldValue, Percent, SubDeviceKind, SubDeviceState,
    SystemInfo, Temperature, TemperatureUnit, fields,
};

/// Sections of a sub-device block whose scalars become fields.
const SECTIONS: [&str; 3] = ["status", "config", "system"];

// ── Field tables ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Conversion {
    Temperature,
    Percent,
    Ppm,
    Rpm,
    Milliamps,
    Millivolts,
    Seconds,
    Code,
    Flags,
    Text,
    Number,
}

struct FieldDef {
    section: &'static str,
    key: &'static str,
    name: &'static str,
    conversion: Conversion,
}

const fn def(
    section: &'static str,
    key: &'static str,
    name: &'static str,
    conversion: Conversion,
) -> FieldDef {
    FieldDef {
        section,
        key,
        name,
        conversion,
    }
}

const CHLORINATOR_FIELDS: &[FieldDef] = &[
    def("status", "waterTemp", fields::WATER_TEMP, Conversion::Temperature),
    def("status", "saltPPM", fields::SALT_PPM, Conversion::Ppm),
    def("status", "flowRate", fields::FLOW_RATE, Conversion::Number),
    def("config", "chlorOutput", fields::OUTPUT_PERCENT, Conversion::Percent),
    def("status", "boostRemaining", fields::BOOST_REMAINING, Conversion::Seconds),
    def("status", "fwdCurrent", fields::FORWARD_CURRENT, Conversion::Milliamps),
    def("status", "revCurrent", fields::REVERSE_CURRENT, Conversion::Milliamps),
    def("status", "outVoltage", fields::OUTPUT_VOLTAGE, Conversion::Millivolts),
    def("system", "cellSerialNum", fields::CELL_SERIAL, Conversion::Text),
    def("system", "cellFwVersion", fields::CELL_FW_VERSION, Conversion::Text),
    def("system", "cellHwVersion", fields::CELL_HW_VERSION, Conversion::Text),
];

const HEAT_PUMP_FIELDS: &[FieldDef] = &[
    def("status", "waterTemp", fields::WATER_TEMP, Conversion::Temperature),
    def("status", "airTemp", fields::AIR_TEMP, Conversion::Temperature),
    def("config", "mode", fields::MODE, Conversion::Code),
    def("config", "setpoint", fields::SETPOINT, Conversion::Temperature),
    def("status", "compRPM", fields::COMPRESSOR_RPM, Conversion::Rpm),
    def("status", "stateFlags", fields::STATE_FLAGS, Conversion::Flags),
    def("status", "ctrlFlags", fields::CTRL_FLAGS, Conversion::Flags),
];

/// Keys whose presence identifies a chlorinator.
const CHLORINATOR_SIGNATURE: &[(&str, &str)] = &[
    ("status", "saltPPM"),
    ("status", "flowRate"),
    ("status", "fwdCurrent"),
    ("status", "revCurrent"),
    ("config", "chlorOutput"),
];

/// Keys whose presence identifies a heat pump.
const HEAT_PUMP_SIGNATURE: &[(&str, &str)] = &[
    ("status", "compRPM"),
    ("status", "airTemp"),
    ("config", "setpoint"),
];

// ── Options ─────────────────────────────────────────────────────────

/// Decoder settings taken from the session configuration.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub temperature_unit: TemperatureUnit,
    pub slot_overrides: BTreeMap<u32, SubDeviceKind>,
}

impl From<&SessionConfig> for DecodeOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            temperature_unit: config.temperature_unit,
            slot_overrides: config.slot_overrides.clone(),
        }
    }
}

// ── Entry point ─────────────────────────────────────────────────────

/// Decode a full status payload.
pub fn decode_snapshot(
    payload: &Value,
    options: &DecodeOptions,
) -> Result<DeviceSnapshot, CoreError> {
    let root = payload
        .as_object()
        .ok_or_else(|| CoreError::MalformedResponse {
            message: format!("status payload is {}, expected an object", kind_of(payload)),
        })?;

    let pool_sync = match root.get("poolSync") {
        Some(Value::Object(map)) => map,
        Some(other) => return Err(malformed("poolSync", &format!("is {}", kind_of(other)))),
        None => return Err(malformed("poolSync", "is missing")),
    };
    let devices = match root.get("devices") {
        Some(value @ (Value::Object(_) | Value::Array(_))) => value,
        Some(Value::Null) | None => return Err(malformed("devices", "is missing")),
        Some(other) => return Err(malformed("devices", &format!("is {}", kind_of(other)))),
    };

    let mut diagnostics = Vec::new();

    let online = flag_at(pool_sync, &["status", "online"], "poolSync", &mut diagnostics);
    let service_mode = flag_at(
        pool_sync,
        &["config", "serviceMode"],
        "poolSync",
        &mut diagnostics,
    );
    let system_fault = match pool_sync.get("faults") {
        None | Some(Value::Null) => false,
        Some(value) => parse_fault_codes(value, "poolSync.faults", &mut diagnostics)
            .iter()
            .any(|c| *c != 0),
    };

    let system = decode_system(pool_sync, &mut diagnostics);
    let hints = device_type_hints(root.get("deviceType"));
    let sub_devices = decode_sub_devices(devices, &hints, options, &mut diagnostics);

    let snapshot = DeviceSnapshot {
        online,
        system_fault,
        service_mode,
        system,
        sub_devices,
        fetched_at: Utc::now(),
        diagnostics,
    };

    debug!(
        sub_devices = snapshot.sub_devices.len(),
        diagnostics = snapshot.all_diagnostics().count(),
        "status payload decoded"
    );

    Ok(snapshot)
}

fn malformed(block: &str, problem: &str) -> CoreError {
    CoreError::MalformedResponse {
        message: format!("status payload `{block}` block {problem}"),
    }
}

// ── System block ────────────────────────────────────────────────────

fn decode_system(pool_sync: &Map<String, Value>, diags: &mut Vec<FieldDiagnostic>) -> SystemInfo {
    let mut info = SystemInfo::default();

    if let Some(v) = lookup(pool_sync, &["config", "name"]) {
        info.name = text(v);
    }
    if let Some(v) = lookup(pool_sync, &["system", "fwVersion"]) {
        info.firmware_version = text(v);
    }
    if let Some(v) = lookup(pool_sync, &["system", "hwVersion"]) {
        info.hardware_version = text(v);
    }
    if let Some(v) = lookup(pool_sync, &["status", "boardTemp"]) {
        info.board_temp = number_or_diag(v, "poolSync.status.boardTemp", diags);
    }
    if let Some(v) = lookup(pool_sync, &["status", "rssi"]) {
        info.rssi = integer_or_diag(v, "poolSync.status.rssi", diags);
    }
    if let Some(v) = lookup(pool_sync, &["status", "dateTime"]).filter(|v| !v.is_null()) {
        info.device_time = v.as_str().and_then(parse_device_time);
        if info.device_time.is_none() {
            diags.push(FieldDiagnostic::new(
                "poolSync.status.dateTime",
                format!("unrecognized timestamp {v}"),
            ));
        }
    }
    if let Some(v) = lookup(pool_sync, &["stats", "upTimeSecs"]) {
        info.uptime_secs = integer_or_diag(v, "poolSync.stats.upTimeSecs", diags)
            .and_then(|n| u64::try_from(n).ok());
    }

    info
}

/// RFC 3339 first, then the bare `YYYY-MM-DDTHH:MM:SS` some firmware emits (taken as UTC).
fn parse_device_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ── Sub-devices ─────────────────────────────────────────────────────

/// `deviceType` maps slot → `"chlorSync"` / `"heatPump"` on most firmware.
fn device_type_hints(raw: Option<&Value>) -> BTreeMap<u32, SubDeviceKind> {
    let entries: Vec<(Option<u32>, &Value)> = match raw {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.trim().parse().ok(), v)).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (u32::try_from(i).ok(), v))
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|(slot, v)| {
            let kind = SubDeviceKind::from_str(v.as_str()?.trim()).ok()?;
            Some((slot?, kind))
        })
        .filter(|(_, kind)| *kind != SubDeviceKind::Unknown)
        .collect()
}

fn decode_sub_devices(
    raw: &Value,
    hints: &BTreeMap<u32, SubDeviceKind>,
    options: &DecodeOptions,
    diags: &mut Vec<FieldDiagnostic>,
) -> Vec<SubDeviceState> {
    let mut slots: BTreeMap<u32, &Value> = BTreeMap::new();

    match raw {
        Value::Object(map) => {
            for (key, value) in map {
                let Ok(slot) = key.trim().parse::<u32>() else {
                    diags.push(FieldDiagnostic::new(
                        format!("devices.{key}"),
                        "slot key is not a non-negative integer; entry skipped",
                    ));
                    continue;
                };
                match slots.entry(slot) {
                    Entry::Vacant(entry) => {
                        entry.insert(value);
                    }
                    Entry::Occupied(_) => diags.push(FieldDiagnostic::new(
                        format!("devices.{key}"),
                        format!("duplicate slot {slot}; entry ignored"),
                    )),
                }
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                if let Ok(slot) = u32::try_from(index) {
                    slots.insert(slot, value);
                }
            }
        }
        _ => {}
    }

    slots
        .into_iter()
        .map(|(slot, value)| decode_sub_device(slot, value, hints.get(&slot).copied(), options))
        .collect()
}

fn decode_sub_device(
    slot: u32,
    raw: &Value,
    hint: Option<SubDeviceKind>,
    options: &DecodeOptions,
) -> SubDeviceState {
    let prefix = format!("devices.{slot}");
    let mut diagnostics = Vec::new();

    let Some(block) = raw.as_object() else {
        diagnostics.push(FieldDiagnostic::new(
            prefix,
            format!("expected an object, got {}", kind_of(raw)),
        ));
        return SubDeviceState {
            slot,
            kind: options
                .slot_overrides
                .get(&slot)
                .copied()
                .or(hint)
                .unwrap_or(SubDeviceKind::Unknown),
            name: None,
            online: false,
            fault: false,
            fault_codes: Vec::new(),
            fields: BTreeMap::new(),
            diagnostics,
        };
    };

    let kind = resolve_kind(slot, block, hint, options);

    let online = flag_at(block, &["nodeAttr", "online"], &prefix, &mut diagnostics);
    let name = lookup(block, &["nodeAttr", "name"]).and_then(text);
    let fault_codes = match block.get("faults") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => parse_fault_codes(v, &format!("{prefix}.faults"), &mut diagnostics),
    };

    let table: &[FieldDef] = match kind {
        SubDeviceKind::Chlorinator => CHLORINATOR_FIELDS,
        SubDeviceKind::HeatPump => HEAT_PUMP_FIELDS,
        SubDeviceKind::Unknown => &[],
    };

    let mut fields = BTreeMap::new();

    for section in SECTIONS {
        let Some(entries) = block.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in entries {
            if value.is_null() {
                continue;
            }
            let path = format!("{prefix}.{section}.{key}");
            match table.iter().find(|s| s.section == section && s.key == key) {
                None if value.is_object() || value.is_array() => {}
                Some(def) => {
                    match convert(value, def.conversion, options.temperature_unit, &path) {
                        Ok((field, note)) => {
                            if let Some(note) = note {
                                diagnostics.push(note);
                            }
                            fields.insert(def.name.to_string(), field);
                        }
                        Err(diag) => diagnostics.push(diag),
                    }
                }
                None => {
                    fields.insert(format!("{section}.{key}"), FieldValue::Raw(value.clone()));
                }
            }
        }
    }

    SubDeviceState {
        slot,
        kind,
        name,
        online,
        fault: fault_codes.iter().any(|c| *c != 0),
        fault_codes,
        fields,
        diagnostics,
    }
}

/// Override, then field signature, then the `deviceType` hint.
fn resolve_kind(
    slot: u32,
    block: &Map<String, Value>,
    hint: Option<SubDeviceKind>,
    options: &DecodeOptions,
) -> SubDeviceKind {
    if let Some(kind) = options.slot_overrides.get(&slot) {
        return *kind;
    }

    let chlor = signature_matches(block, CHLORINATOR_SIGNATURE);
    let heat = signature_matches(block, HEAT_PUMP_SIGNATURE);

    match chlor.cmp(&heat) {
        std::cmp::Ordering::Greater => SubDeviceKind::Chlorinator,
        std::cmp::Ordering::Less => SubDeviceKind::HeatPump,
        std::cmp::Ordering::Equal => hint.unwrap_or(SubDeviceKind::Unknown),
    }
}

fn signature_matches(block: &Map<String, Value>, signature: &[(&str, &str)]) -> usize {
    signature
        .iter()
        .filter(|(section, key)| {
            block
                .get(*section)
                .and_then(|s| s.get(*key))
                .is_some_and(|v| !v.is_null())
        })
        .count()
}

// ── Conversions ─────────────────────────────────────────────────────

/// Convert one known field. Returns the value plus an optional
/// informational diagnostic (e.g. a clamped percentage).
fn convert(
    value: &Value,
    conversion: Conversion,
    unit: TemperatureUnit,
    path: &str,
) -> Result<(FieldValue, Option<FieldDiagnostic>), FieldDiagnostic> {
    let bad = |expected: &str| {
        FieldDiagnostic::new(path, format!("expected {expected}, got {value}"))
    };

    let field = match conversion {
        Conversion::Temperature => {
            FieldValue::Temperature(Temperature::new(number(value).ok_or_else(|| bad("a number"))?, unit))
        }
        Conversion::Percent => {
            let pct = Percent::clamped(number(value).ok_or_else(|| bad("a number"))?);
            let note = pct.original.map(|orig| {
                FieldDiagnostic::new(
                    path,
                    format!("{orig} is outside 0-100; clamped to {}", pct.value),
                )
            });
            return Ok((FieldValue::Percent(pct), note));
        }
        Conversion::Ppm => FieldValue::Ppm(number(value).ok_or_else(|| bad("a number"))?),
        Conversion::Rpm => FieldValue::Rpm(number(value).ok_or_else(|| bad("a number"))?),
        Conversion::Milliamps => {
            FieldValue::Milliamps(number(value).ok_or_else(|| bad("a number"))?)
        }
        Conversion::Millivolts => {
            FieldValue::Millivolts(number(value).ok_or_else(|| bad("a number"))?)
        }
        Conversion::Seconds => FieldValue::Seconds(integer(value).ok_or_else(|| bad("an integer"))?),
        Conversion::Code => FieldValue::Code(integer(value).ok_or_else(|| bad("an integer"))?),
        Conversion::Flags => FieldValue::Flags(integer(value).ok_or_else(|| bad("an integer"))?),
        Conversion::Text => FieldValue::Text(text(value).ok_or_else(|| bad("text"))?),
        Conversion::Number => {
            number(value).ok_or_else(|| bad("a number"))?;
            FieldValue::Raw(value.clone())
        }
    };

    Ok((field, None))
}

/// Numbers, or strings holding a number.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_or_diag(value: &Value, path: &str, diags: &mut Vec<FieldDiagnostic>) -> Option<f64> {
    if value.is_null() {
        return None;
    }
    let parsed = number(value);
    if parsed.is_none() {
        diags.push(FieldDiagnostic::new(path, format!("expected a number, got {value}")));
    }
    parsed
}

fn integer_or_diag(value: &Value, path: &str, diags: &mut Vec<FieldDiagnostic>) -> Option<i64> {
    if value.is_null() {
        return None;
    }
    let parsed = integer(value);
    if parsed.is_none() {
        diags.push(FieldDiagnostic::new(path, format!("expected an integer, got {value}")));
    }
    parsed
}

/// Booleans arrive as `true`/`false` or `0`/`1`. Absent means `false`.
fn flag_at(
    map: &Map<String, Value>,
    path: &[&str],
    prefix: &str,
    diags: &mut Vec<FieldDiagnostic>,
) -> bool {
    match lookup(map, path) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(other) => {
            diags.push(FieldDiagnostic::new(
                format!("{prefix}.{}", path.join(".")),
                format!("expected a boolean, got {other}"),
            ));
            false
        }
    }
}

/// Fault codes come as an array of integers, or a single integer/boolean.
fn parse_fault_codes(value: &Value, path: &str, diags: &mut Vec<FieldDiagnostic>) -> Vec<i64> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let code = integer(item);
                if code.is_none() {
                    diags.push(FieldDiagnostic::new(
                        format!("{path}.{i}"),
                        format!("expected an integer fault code, got {item}"),
                    ));
                }
                code
            })
            .collect(),
        Value::Bool(b) => vec![i64::from(*b)],
        other => match integer(other) {
            Some(code) => vec![code],
            None => {
                diags.push(FieldDiagnostic::new(
                    path,
                    format!("expected fault codes, got {other}"),
                ));
                Vec::new()
            }
        },
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(map.get(*first)?, |v, key| v.get(*key))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
