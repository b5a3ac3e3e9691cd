// PoolSync HTTP client
//
// Wraps `reqwest::Client` with PoolSync-specific URL construction, header
// injection, and response classification. Endpoint groups (pairing, status)
// are implemented as inherent methods in separate files to keep this module
// focused on transport mechanics.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::request_headers;
use crate::error::Error;
use crate::transport::{DEFAULT_TIMEOUT, TransportConfig};

/// Path of the single API endpoint; operations are selected by query string.
const API_PATH: &str = "api/poolsync";

/// Body snippets in logs and errors are cut to this many characters.
const SNIPPET_CHARS: usize = 200;

/// Raw HTTP client for one PoolSync device.
///
/// Every call is a single request/response exchange with an explicit
/// timeout. There is no retry at this layer; callers get a classified
/// [`Error`] and decide.
#[derive(Debug, Clone)]
pub struct PoolSyncClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl PoolSyncClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the device root, e.g. `http://192.168.1.50/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Create a client for a bare IP address or `host:port`.
    pub fn for_host(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Self::new(device_base_url(host)?, transport)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/poolsync?{query}`.
    pub(crate) fn api_url(&self, query: &str) -> Result<Url, Error> {
        let mut url = self.base_url.join(API_PATH)?;
        url.set_query(Some(query));
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send one request and classify the response.
    ///
    /// `password` is attached as the `authorization` header when present.
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        password: Option<&SecretString>,
        body: Option<&B>,
    ) -> Result<Value, Error> {
        debug!(%method, %url, authenticated = password.is_some(), "sending request");

        let mut request = self
            .http
            .request(method, url.clone())
            .headers(request_headers(password)?)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Error::from_send(e, &url, self.timeout.as_secs()))?;

        self.parse_response(resp, &url).await
    }

    /// Classify the status, then parse the body as JSON regardless of the
    /// advertised content type (the firmware often says `text/plain`).
    async fn parse_response(&self, resp: reqwest::Response, url: &Url) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_send(e, url, self.timeout.as_secs()))?;

        debug!(%url, status = status.as_u16(), body = %snippet(&body), "response received");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }

        if is_busy(status) {
            return Err(Error::DeviceBusy {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Turn user input (`192.168.1.50`, `pool.local:8080`, or a full URL) into
/// the device base URL.
pub fn device_base_url(host: &str) -> Result<Url, Error> {
    let host = host.trim().trim_end_matches('/');
    let raw = if host.contains("://") {
        format!("{host}/")
    } else {
        format!("http://{host}/")
    };
    Ok(Url::parse(&raw)?)
}

/// Statuses that mean "try again later" rather than "you did something wrong".
fn is_busy(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_from_bare_ip() {
        let url = device_base_url("192.168.1.50").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.50/");
    }

    #[test]
    fn base_url_keeps_port_and_scheme() {
        assert_eq!(
            device_base_url(" 10.0.0.7:8080/ ").unwrap().as_str(),
            "http://10.0.0.7:8080/"
        );
        assert_eq!(
            device_base_url("http://pool.local").unwrap().as_str(),
            "http://pool.local/"
        );
    }

    #[test]
    fn api_url_carries_flag_query() {
        let client = PoolSyncClient::with_client(
            reqwest::Client::new(),
            device_base_url("192.168.1.50").unwrap(),
        );
        let url = client.api_url("cmd=pushLink&start").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.50/api/poolsync?cmd=pushLink&start");
    }

    #[test]
    fn busy_statuses() {
        assert!(is_busy(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_busy(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_busy(StatusCode::NOT_FOUND));
        assert!(!is_busy(StatusCode::OK));
    }
}
