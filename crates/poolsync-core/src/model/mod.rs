// ── Domain model ──
//
// Every type here is the canonical, decoded view of a PoolSync device.
// Consumers (CLI, session callers) depend on these and never on raw JSON.

pub mod credential;
pub mod field;
pub mod snapshot;

// ── Re-exports ──────────────────────────────────────────────────────

pub use credential::Credential;
pub use field::{FieldDiagnostic, FieldValue, Percent, Temperature, TemperatureUnit};
pub use snapshot::{
    DeviceSnapshot, HeatPumpActivity, HeatPumpMode, SubDeviceKind, SubDeviceState, SystemInfo,
    fields,
};
