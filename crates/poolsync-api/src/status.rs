// Authenticated endpoints: full status read and per-device config writes.

use reqwest::Method;
use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use crate::client::PoolSyncClient;
use crate::error::Error;
use crate::models::DeviceConfigPatch;

impl PoolSyncClient {
    /// Fetch the complete device state.
    ///
    /// `GET /api/poolsync?cmd=poolSync&all`
    ///
    /// Returns loosely-typed JSON because the field set varies by
    /// firmware and by which accessories are attached.
    pub async fn get_all_data(&self, password: &SecretString) -> Result<Value, Error> {
        let url = self.api_url("cmd=poolSync&all")?;
        debug!("fetching full device state");
        self.send::<()>(Method::GET, url, Some(password), None).await
    }

    /// Write config keys on one attached device.
    ///
    /// `PATCH /api/poolsync?cmd=devices&device={slot}` with
    /// `{"config": {"<key>": <value>}}`
    pub async fn patch_device_config(
        &self,
        password: &SecretString,
        slot: u32,
        patch: &DeviceConfigPatch,
    ) -> Result<Value, Error> {
        let url = self.api_url(&format!("cmd=devices&device={slot}"))?;
        debug!(slot, keys = ?patch.config.keys().collect::<Vec<_>>(), "patching device config");
        self.send(Method::PATCH, url, Some(password), Some(patch)).await
    }
}
