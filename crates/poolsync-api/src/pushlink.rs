// Pairing ("push link") endpoints
//
// Neither call is authenticated: the whole point is to obtain the password.

use reqwest::Method;
use tracing::debug;

use crate::client::PoolSyncClient;
use crate::error::Error;
use crate::models::PushLinkStatus;

impl PoolSyncClient {
    /// Open the pairing window on the device.
    ///
    /// `PUT /api/poolsync?cmd=pushLink&start`
    ///
    /// The device answers with the number of seconds the user has left to
    /// press the physical button.
    pub async fn start_pushlink(&self) -> Result<PushLinkStatus, Error> {
        let url = self.api_url("cmd=pushLink&start")?;
        debug!("starting push link");
        let value = self.send::<()>(Method::PUT, url, None, None).await?;
        decode_pushlink(value)
    }

    /// Poll the pairing window.
    ///
    /// `GET /api/poolsync?cmd=pushLink&status`
    pub async fn pushlink_status(&self) -> Result<PushLinkStatus, Error> {
        let url = self.api_url("cmd=pushLink&status")?;
        debug!("polling push link status");
        let value = self.send::<()>(Method::GET, url, None, None).await?;
        decode_pushlink(value)
    }
}

/// An empty body is treated as "nothing to report yet".
fn decode_pushlink(value: serde_json::Value) -> Result<PushLinkStatus, Error> {
    if value.is_null() {
        return Ok(PushLinkStatus::default());
    }
    let body = value.to_string();
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
