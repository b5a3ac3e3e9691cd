// ── Device session ──
//
// Lifecycle of one PoolSync device: pairing, status refresh, control
// writes, and an optional background refresh loop. Requests to the device
// are serialized through a single async lock; callers queue behind it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use poolsync_api::{PoolSyncClient, PushLinkStatus};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{ControlRequest, ControlTarget, encode};
use crate::config::{MIN_UPDATE_INTERVAL, SessionConfig};
use crate::decode::{DecodeOptions, decode_snapshot};
use crate::error::CoreError;
use crate::model::{Credential, DeviceSnapshot};
use crate::pairing::{LinkChannel, PairingState, run_pairing};

/// Where a freshly issued credential goes.
///
/// Implemented by the configuration layer; the session only calls it once
/// per successful pairing.
pub trait CredentialStore: Send + Sync {
    /// Persist `credential` for the device at `device` (host or host:port).
    fn save(&self, device: &str, credential: &Credential) -> Result<(), CoreError>;
}

/// A session with a single PoolSync device.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Holds the current credential
/// and the last snapshot; everything else is configuration.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    decode: DecodeOptions,
    client: PoolSyncClient,
    /// One request in flight per device.
    io: Mutex<()>,
    credential: watch::Sender<Option<Credential>>,
    snapshot: watch::Sender<Option<Arc<DeviceSnapshot>>>,
    pairing: watch::Sender<PairingState>,
    pairing_active: AtomicBool,
}

impl DeviceSession {
    /// Create an unpaired session. Does not touch the network.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let client = PoolSyncClient::new(config.device_url.clone(), &config.transport())?;
        Ok(Self::with_client(config, client))
    }

    /// Create a session around an existing client.
    pub fn with_client(config: SessionConfig, client: PoolSyncClient) -> Self {
        let decode = DecodeOptions::from(&config);
        let (credential, _) = watch::channel(None);
        let (snapshot, _) = watch::channel(None);
        let (pairing, _) = watch::channel(PairingState::Idle);

        Self {
            inner: Arc::new(SessionInner {
                config,
                decode,
                client,
                io: Mutex::new(()),
                credential,
                snapshot,
                pairing,
                pairing_active: AtomicBool::new(false),
            }),
        }
    }

    /// Start from a previously stored credential.
    pub fn with_credential(self, credential: Credential) -> Self {
        self.inner.credential.send_replace(Some(credential));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// `host` or `host:port` of the device, as used for credential storage.
    pub fn device_address(&self) -> String {
        let url = &self.inner.config.device_url;
        match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => url.to_string(),
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.credential.borrow().clone()
    }

    pub fn is_paired(&self) -> bool {
        self.inner.credential.borrow().is_some()
    }

    /// The most recent successful snapshot, if any.
    pub fn last_snapshot(&self) -> Option<Arc<DeviceSnapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<DeviceSnapshot>>> {
        self.inner.snapshot.subscribe()
    }

    /// Subscribe to pairing progress.
    pub fn pairing_progress(&self) -> watch::Receiver<PairingState> {
        self.inner.pairing.subscribe()
    }

    // ── Pairing ──────────────────────────────────────────────────

    /// Pair with the device and persist the resulting credential.
    pub async fn pair(&self, store: &dyn CredentialStore) -> Result<Credential, CoreError> {
        self.pair_with(store, &CancellationToken::new()).await
    }

    /// Pair, giving up when `cancel` fires.
    ///
    /// A second call while one is running fails immediately with
    /// [`CoreError::PairingInProgress`].
    pub async fn pair_with(
        &self,
        store: &dyn CredentialStore,
        cancel: &CancellationToken,
    ) -> Result<Credential, CoreError> {
        let _guard = PairingGuard::acquire(&self.inner.pairing_active)?;
        self.inner.pairing.send_replace(PairingState::Idle);

        let link = SerializedLink {
            client: &self.inner.client,
            io: &self.inner.io,
        };
        let credential = run_pairing(&link, &self.inner.config.pairing, &self.inner.pairing, cancel)
            .await?;

        self.inner.credential.send_replace(Some(credential.clone()));

        let device = self.device_address();
        store.save(&device, &credential).map_err(|e| match e {
            CoreError::Persistence { .. } => e,
            other => CoreError::Persistence {
                message: other.to_string(),
            },
        })?;
        info!(device = %device, "credential stored");

        Ok(credential)
    }

    // ── Status ───────────────────────────────────────────────────

    /// Fetch and decode the full device status.
    ///
    /// The new snapshot replaces the previous one and is published to
    /// [`snapshots()`](Self::snapshots) subscribers. On any error the
    /// previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<DeviceSnapshot>, CoreError> {
        let _io = self.inner.io.lock().await;
        let credential = self.require_credential()?;

        let payload = self
            .inner
            .client
            .get_all_data(credential.access_password())
            .await
            .map_err(|e| self.classify(e, &credential))?;

        let snapshot = Arc::new(decode_snapshot(&payload, &self.inner.decode)?);
        for diag in snapshot.all_diagnostics() {
            debug!(path = %diag.path, message = %diag.message, "decode diagnostic");
        }

        self.inner.snapshot.send_replace(Some(Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Validate and send one control write.
    ///
    /// Validation runs against the last snapshot, so at least one
    /// successful [`refresh()`](Self::refresh) must precede this.
    pub async fn send_command(
        &self,
        target: ControlTarget,
        value: i64,
    ) -> Result<ControlRequest, CoreError> {
        self.require_credential()?;
        let snapshot = self.last_snapshot();
        let request = encode(
            target,
            value,
            snapshot.as_deref(),
            self.inner.config.temperature_unit,
        )?;

        let _io = self.inner.io.lock().await;
        let credential = self.require_credential()?;

        self.inner
            .client
            .patch_device_config(credential.access_password(), request.slot, &request.patch())
            .await
            .map_err(|e| self.classify(e, &credential))?;

        info!(
            target = %request.target,
            slot = request.slot,
            value = request.value,
            "control write accepted"
        );
        Ok(request)
    }

    // ── Background refresh ───────────────────────────────────────

    /// Refresh every `interval` (at least 10 s) until `cancel` fires.
    ///
    /// Failures are logged and the loop keeps going, except when the device
    /// no longer accepts the credential.
    pub fn spawn_refresh_task(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = interval.max(MIN_UPDATE_INTERVAL);
        tokio::spawn(refresh_task(self.clone(), interval, cancel))
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn require_credential(&self) -> Result<Credential, CoreError> {
        self.credential().ok_or(CoreError::NotPaired)
    }

    /// Map an API error; a rejected credential is dropped so later calls
    /// report `NotPaired`. A credential installed since `sent` went out
    /// is left alone.
    fn classify(&self, err: poolsync_api::Error, sent: &Credential) -> CoreError {
        if err.is_unauthorized() {
            let dropped = self.inner.credential.send_if_modified(|current| {
                if current.as_ref().is_some_and(|c| c.same_password(sent)) {
                    *current = None;
                    true
                } else {
                    false
                }
            });
            if dropped {
                warn!("device rejected the credential; pairing required");
            } else {
                debug!("rejected credential was already replaced");
            }
        }
        CoreError::from(err)
    }
}

async fn refresh_task(session: DeviceSession, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match session.refresh().await {
                    Ok(snapshot) => debug!(
                        sub_devices = snapshot.sub_devices.len(),
                        "periodic refresh complete"
                    ),
                    Err(e) if e.requires_pairing() => {
                        error!(error = %e, "stopping periodic refresh");
                        break;
                    }
                    Err(e) => warn!(error = %e, "periodic refresh failed"),
                }
            }
        }
    }
}

// ── Pairing plumbing ─────────────────────────────────────────────

/// Routes pairing calls through the session's request lock.
struct SerializedLink<'a> {
    client: &'a PoolSyncClient,
    io: &'a Mutex<()>,
}

impl LinkChannel for SerializedLink<'_> {
    fn start_link(&self) -> impl Future<Output = Result<PushLinkStatus, poolsync_api::Error>> + Send {
        async move {
            let _io = self.io.lock().await;
            self.client.start_pushlink().await
        }
    }

    fn link_status(
        &self,
    ) -> impl Future<Output = Result<PushLinkStatus, poolsync_api::Error>> + Send {
        async move {
            let _io = self.io.lock().await;
            self.client.pushlink_status().await
        }
    }
}

/// Clears the in-progress flag when the attempt ends, however it ends.
struct PairingGuard<'a>(&'a AtomicBool);

impl<'a> PairingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CoreError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::PairingInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for PairingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pairing_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        let first = PairingGuard::acquire(&flag).unwrap();
        assert!(matches!(
            PairingGuard::acquire(&flag),
            Err(CoreError::PairingInProgress)
        ));
        drop(first);
        assert!(PairingGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn device_address_keeps_explicit_port() {
        let session =
            DeviceSession::new(SessionConfig::for_host("192.168.1.50:8080").unwrap()).unwrap();
        assert_eq!(session.device_address(), "192.168.1.50:8080");

        let session = DeviceSession::new(SessionConfig::for_host("192.168.1.50").unwrap()).unwrap();
        assert_eq!(session.device_address(), "192.168.1.50");
        assert!(!session.is_paired());
    }
}
