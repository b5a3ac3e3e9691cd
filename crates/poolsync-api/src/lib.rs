// poolsync-api: Async Rust client for the PoolSync local HTTP API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod pushlink;
pub mod status;
pub mod transport;

pub use auth::{AUTHORIZATION_HEADER, USER_HEADER, USER_HEADER_VALUE};
pub use client::{PoolSyncClient, device_base_url};
pub use error::Error;
pub use models::{DeviceConfigPatch, PushLinkStatus};
pub use transport::TransportConfig;
