//! `poolsync status`: one refresh, rendered.

use std::fmt::Write as _;
use std::time::Duration;

use tabled::Tabled;

use poolsync_core::{
    DeviceSession, DeviceSnapshot, FieldValue, SubDeviceKind, SubDeviceState, fields,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SubDeviceRow {
    #[tabled(rename = "Slot")]
    slot: u32,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Readings")]
    readings: String,
}

pub async fn handle(session: &DeviceSession, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = session.refresh().await?;
    let mac = device_mac(session);
    let out = render_snapshot(&snapshot, mac.as_deref(), global)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub(crate) fn device_mac(session: &DeviceSession) -> Option<String> {
    session
        .credential()
        .map(|c| c.device_mac().to_string())
        .filter(|m| !m.is_empty())
}

pub(crate) fn render_snapshot(
    snapshot: &DeviceSnapshot,
    mac: Option<&str>,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let color = output::should_color(global.color);
    output::render_single(global.output, snapshot, |snap| {
        snapshot_detail(snap, mac, color)
    })
}

fn snapshot_detail(snap: &DeviceSnapshot, mac: Option<&str>, color: bool) -> String {
    let mut out = String::new();

    let state = if snap.online {
        output::status_word("online", !snap.system_fault, color)
    } else {
        output::status_word("offline", false, color)
    };
    let _ = write!(out, "{}  {state}", snap.display_name(mac));
    if snap.system_fault {
        let _ = write!(out, "  {}", output::status_word("system fault", false, color));
    }
    if snap.service_mode {
        out.push_str("  (service mode)");
    }
    out.push('\n');

    let mut facts = Vec::new();
    if let Some(fw) = &snap.system.firmware_version {
        facts.push(format!("firmware {fw}"));
    }
    if let Some(temp) = snap.system.board_temp {
        facts.push(format!("board {temp:.1} °C"));
    }
    if let Some(rssi) = snap.system.rssi {
        facts.push(format!("wifi {rssi} dBm"));
    }
    if let Some(uptime) = snap.system.uptime_secs {
        facts.push(format!(
            "up {}",
            humantime::format_duration(Duration::from_secs(uptime))
        ));
    }
    if !facts.is_empty() {
        let _ = writeln!(out, "{}", facts.join(", "));
    }

    if snap.sub_devices.is_empty() {
        out.push_str("No equipment reported.");
    } else {
        let rows: Vec<SubDeviceRow> = snap
            .sub_devices
            .iter()
            .map(|device| SubDeviceRow {
                slot: device.slot,
                kind: device.kind.to_string(),
                name: device.name.clone().unwrap_or_default(),
                status: device_status(device, color),
                readings: readings(device),
            })
            .collect();
        out.push_str(&output::render_table(&rows));
    }

    for diag in snap.all_diagnostics() {
        let _ = write!(out, "\nwarning: {}: {}", diag.path, diag.message);
    }
    out
}

fn device_status(device: &SubDeviceState, color: bool) -> String {
    if device.fault {
        let codes = device
            .fault_codes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let word = if codes.is_empty() {
            "fault".to_string()
        } else {
            format!("fault {codes}")
        };
        output::status_word(&word, false, color)
    } else if device.online {
        output::status_word("online", true, color)
    } else {
        output::status_word("offline", false, color)
    }
}

/// One-line summary of the interesting fields for the sub-device's kind.
fn readings(device: &SubDeviceState) -> String {
    let mut parts = Vec::new();
    match device.kind {
        SubDeviceKind::Chlorinator => {
            push_field(&mut parts, device, fields::OUTPUT_PERCENT, "output");
            push_field(&mut parts, device, fields::SALT_PPM, "salt");
            push_field(&mut parts, device, fields::WATER_TEMP, "water");
            if let Some(boost) = device
                .field(fields::BOOST_REMAINING)
                .and_then(FieldValue::as_i64)
                .filter(|secs| *secs > 0)
            {
                parts.push(format!("boost {boost}s"));
            }
        }
        SubDeviceKind::HeatPump => {
            match device.heat_pump_mode() {
                Some(mode) => parts.push(format!("mode {mode}")),
                None => push_field(&mut parts, device, fields::MODE, "mode"),
            }
            push_field(&mut parts, device, fields::SETPOINT, "setpoint");
            push_field(&mut parts, device, fields::WATER_TEMP, "water");
            push_field(&mut parts, device, fields::AIR_TEMP, "air");
            if let Some(activity) = device.heat_pump_activity() {
                parts.push(activity.to_string());
            }
        }
        SubDeviceKind::Unknown => {
            parts.push(format!("{} fields", device.fields.len()));
        }
    }
    parts.join(", ")
}

fn push_field(parts: &mut Vec<String>, device: &SubDeviceState, key: &str, label: &str) {
    if let Some(value) = device.field(key) {
        parts.push(format!("{label} {value}"));
    }
}
