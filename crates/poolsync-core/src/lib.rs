// poolsync-core: Pairing, status decoding, and command encoding for one
// PoolSync device, composed behind a `DeviceSession`.

pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod model;
pub mod pairing;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{ControlRequest, ControlTarget, encode};
pub use config::{PairingConfig, SessionConfig};
pub use decode::decode_snapshot;
pub use error::CoreError;
pub use pairing::{LinkChannel, PairingState};
pub use session::{CredentialStore, DeviceSession};

pub use model::{
    Credential, DeviceSnapshot, FieldDiagnostic, FieldValue, HeatPumpActivity, HeatPumpMode,
    Percent, SubDeviceKind, SubDeviceState, SystemInfo, Temperature, TemperatureUnit, fields,
};
