// ── Push-button pairing ──
//
// Idle → LinkRequested → AwaitingButtonPress → Linked | Failed.
//
// The device opens a pairing window on request and reports how long it
// stays open. The user presses the physical button; the next status poll
// then carries the access password and the device MAC.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use poolsync_api::{PoolSyncClient, PushLinkStatus};
use secrecy::SecretString;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PairingConfig;
use crate::error::CoreError;
use crate::model::Credential;

/// Observable progress of a pairing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    LinkRequested,
    /// Waiting for the physical button. `remaining` is the device's own
    /// countdown, when it reports one.
    AwaitingButtonPress { remaining: Option<Duration> },
    Linked { device_mac: String },
    Failed { reason: String },
}

impl PairingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Linked { .. } | Self::Failed { .. })
    }
}

/// The two unauthenticated calls pairing needs.
///
/// `PoolSyncClient` implements this directly; the session wraps it so each
/// call holds the per-device request lock.
pub trait LinkChannel: Send + Sync {
    fn start_link(&self) -> impl Future<Output = Result<PushLinkStatus, poolsync_api::Error>> + Send;
    fn link_status(
        &self,
    ) -> impl Future<Output = Result<PushLinkStatus, poolsync_api::Error>> + Send;
}

impl LinkChannel for PoolSyncClient {
    fn start_link(&self) -> impl Future<Output = Result<PushLinkStatus, poolsync_api::Error>> + Send {
        self.start_pushlink()
    }

    fn link_status(
        &self,
    ) -> impl Future<Output = Result<PushLinkStatus, poolsync_api::Error>> + Send {
        self.pushlink_status()
    }
}

/// Drive one pairing attempt to completion.
///
/// Returns the new credential once a poll carries both a password and a
/// MAC. Fails with `PairingTimeout` when the device's window closes or the
/// client-side ceiling passes, `PairingCancelled` when `cancel` fires, and
/// `PairingRejected` on any non-transient error. Every state change is
/// published on `progress`.
pub async fn run_pairing<C: LinkChannel>(
    channel: &C,
    config: &PairingConfig,
    progress: &watch::Sender<PairingState>,
    cancel: &CancellationToken,
) -> Result<Credential, CoreError> {
    let result = drive(channel, config, progress, cancel).await;
    match &result {
        Ok(cred) => {
            info!(mac = cred.device_mac(), "pairing complete");
            progress.send_replace(PairingState::Linked {
                device_mac: cred.device_mac().to_string(),
            });
        }
        Err(e) => {
            warn!(error = %e, "pairing failed");
            progress.send_replace(PairingState::Failed {
                reason: e.to_string(),
            });
        }
    }
    result
}

async fn drive<C: LinkChannel>(
    channel: &C,
    config: &PairingConfig,
    progress: &watch::Sender<PairingState>,
    cancel: &CancellationToken,
) -> Result<Credential, CoreError> {
    let started = Instant::now();
    let ceiling = started + config.ceiling;

    if cancel.is_cancelled() {
        return Err(CoreError::PairingCancelled);
    }

    progress.send_replace(PairingState::LinkRequested);
    debug!("requesting pairing window");

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(CoreError::PairingCancelled),
        () = tokio::time::sleep_until(ceiling) => {
            return Err(timed_out(started));
        }
        res = channel.start_link() => res.map_err(start_failure)?,
    };

    if let Some(cred) = credential_from(&opened) {
        return Ok(cred);
    }

    let mut deadline = window_deadline(&opened, ceiling)?.ok_or_else(|| timed_out(started))?;
    info!(
        remaining_secs = opened.time_remaining,
        "pairing window open; press the button on the PoolSync"
    );
    progress.send_replace(PairingState::AwaitingButtonPress {
        remaining: remaining_from(&opened),
    });

    loop {
        // Wait one poll interval, but never past the deadline.
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::PairingCancelled),
            () = tokio::time::sleep_until((Instant::now() + config.poll_interval).min(deadline)) => {}
        }

        if Instant::now() >= deadline {
            return Err(timed_out(started));
        }

        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::PairingCancelled),
            () = tokio::time::sleep_until(deadline) => return Err(timed_out(started)),
            res = channel.link_status() => res,
        };

        let status = match polled {
            Ok(status) => status,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "pairing poll failed; retrying");
                continue;
            }
            Err(e) => {
                return Err(CoreError::PairingRejected {
                    reason: e.to_string(),
                });
            }
        };

        if let Some(cred) = credential_from(&status) {
            return Ok(cred);
        }

        if status.password().is_some() {
            debug!("device sent a password without a MAC; still waiting");
        }

        match window_deadline(&status, ceiling)? {
            Some(next) => deadline = next,
            None => return Err(timed_out(started)),
        }

        debug!(remaining_secs = status.time_remaining, "button not pressed yet");
        progress.send_replace(PairingState::AwaitingButtonPress {
            remaining: remaining_from(&status),
        });
    }
}

/// Both a password and a MAC are required; either alone is not a link.
fn credential_from(status: &PushLinkStatus) -> Option<Credential> {
    let password = status.password()?;
    let mac = status.mac_address()?;
    Some(Credential::new(
        SecretString::from(password.to_string()),
        mac,
        Utc::now(),
    ))
}

/// Deadline implied by the device's countdown, capped by the ceiling.
///
/// `Ok(None)` means the device says the window is already closed. A
/// response without a countdown keeps the ceiling.
fn window_deadline(status: &PushLinkStatus, ceiling: Instant) -> Result<Option<Instant>, CoreError> {
    match status.time_remaining {
        Some(secs) if secs <= 0 => Ok(None),
        Some(secs) => {
            let secs = u64::try_from(secs).map_err(|e| CoreError::Internal(e.to_string()))?;
            Ok(Some((Instant::now() + Duration::from_secs(secs)).min(ceiling)))
        }
        None => Ok(Some(ceiling)),
    }
}

fn remaining_from(status: &PushLinkStatus) -> Option<Duration> {
    status
        .time_remaining
        .and_then(|s| u64::try_from(s).ok())
        .map(Duration::from_secs)
}

fn timed_out(started: Instant) -> CoreError {
    CoreError::PairingTimeout {
        waited_secs: started.elapsed().as_secs(),
    }
}

/// Connection problems keep their own classification; anything else the
/// device says in response to the start request is a rejection.
fn start_failure(err: poolsync_api::Error) -> CoreError {
    if err.is_transient() {
        CoreError::from(err)
    } else {
        CoreError::PairingRejected {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    type Reply = Result<PushLinkStatus, poolsync_api::Error>;

    /// Replays canned responses; hangs once the script runs out.
    struct ScriptedChannel {
        start: Mutex<Option<Reply>>,
        polls: Mutex<VecDeque<Reply>>,
        poll_count: AtomicUsize,
    }

    impl ScriptedChannel {
        fn new(start: Reply, polls: Vec<Reply>) -> Self {
            Self {
                start: Mutex::new(Some(start)),
                polls: Mutex::new(polls.into()),
                poll_count: AtomicUsize::new(0),
            }
        }

        fn polls(&self) -> usize {
            self.poll_count.load(Ordering::SeqCst)
        }
    }

    impl LinkChannel for ScriptedChannel {
        fn start_link(&self) -> impl Future<Output = Reply> + Send {
            let reply = self.start.lock().unwrap().take();
            async move {
                match reply {
                    Some(r) => r,
                    None => std::future::pending().await,
                }
            }
        }

        fn link_status(&self) -> impl Future<Output = Reply> + Send {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
            let reply = self.polls.lock().unwrap().pop_front();
            async move {
                match reply {
                    Some(r) => r,
                    None => std::future::pending().await,
                }
            }
        }
    }

    fn waiting(secs: i64) -> Reply {
        Ok(PushLinkStatus {
            time_remaining: Some(secs),
            ..PushLinkStatus::default()
        })
    }

    fn linked(password: &str, mac: &str) -> Reply {
        Ok(PushLinkStatus {
            password: Some(password.into()),
            mac_address: Some(mac.into()),
            ..PushLinkStatus::default()
        })
    }

    async fn run(channel: &ScriptedChannel) -> (Result<Credential, CoreError>, PairingState) {
        let (tx, rx) = watch::channel(PairingState::Idle);
        let cancel = CancellationToken::new();
        let result = run_pairing(channel, &PairingConfig::default(), &tx, &cancel).await;
        let last = rx.borrow().clone();
        (result, last)
    }

    #[tokio::test(start_paused = true)]
    async fn links_on_third_poll() {
        let channel = ScriptedChannel::new(
            waiting(120),
            vec![waiting(115), waiting(110), linked("pw-3", "AA:BB:CC:00:00:03")],
        );

        let (result, last) = run(&channel).await;
        let cred = result.unwrap();
        assert_eq!(cred.access_password().expose_secret(), "pw-3");
        assert_eq!(cred.device_mac(), "AA:BB:CC:00:00:03");
        assert_eq!(channel.polls(), 3);
        assert_eq!(
            last,
            PairingState::Linked {
                device_mac: "AA:BB:CC:00:00:03".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn password_without_mac_is_not_a_link() {
        let half = Ok(PushLinkStatus {
            password: Some("pw".into()),
            time_remaining: Some(100),
            ..PushLinkStatus::default()
        });
        let channel = ScriptedChannel::new(
            waiting(120),
            vec![half, linked("pw", "AA:BB:CC:DD:EE:FF")],
        );

        let (result, _) = run(&channel).await;
        assert_eq!(result.unwrap().device_mac(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(channel.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_window_fails_with_timeout() {
        let channel = ScriptedChannel::new(waiting(12), vec![waiting(7), waiting(2), waiting(0)]);

        let (result, last) = run(&channel).await;
        assert!(matches!(result, Err(CoreError::PairingTimeout { .. })), "{result:?}");
        assert!(matches!(last, PairingState::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn device_deadline_bounds_a_silent_device() {
        let channel = ScriptedChannel::new(waiting(30), Vec::new());
        let started = Instant::now();

        let (result, _) = run(&channel).await;
        assert!(matches!(result, Err(CoreError::PairingTimeout { .. })));
        assert!(started.elapsed() <= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_bounds_a_device_that_keeps_extending() {
        let polls = (0..100).map(|_| waiting(120)).collect();
        let channel = ScriptedChannel::new(waiting(120), polls);
        let started = Instant::now();

        let (result, _) = run(&channel).await;
        assert!(matches!(result, Err(CoreError::PairingTimeout { .. })));
        assert!(started.elapsed() <= PairingConfig::default().ceiling);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_keep_polling() {
        let channel = ScriptedChannel::new(
            waiting(120),
            vec![
                Err(poolsync_api::Error::DeviceBusy { status: 503 }),
                Err(poolsync_api::Error::Timeout { timeout_secs: 30 }),
                linked("pw", "AA:BB:CC:DD:EE:FF"),
            ],
        );

        let (result, _) = run(&channel).await;
        assert!(result.is_ok());
        assert_eq!(channel.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hard_error_rejects() {
        let channel = ScriptedChannel::new(
            waiting(120),
            vec![Err(poolsync_api::Error::Status {
                status: 404,
                body: String::new(),
            })],
        );

        let (result, _) = run(&channel).await;
        assert!(matches!(result, Err(CoreError::PairingRejected { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_device_on_start_keeps_connection_error() {
        let channel = ScriptedChannel::new(
            Err(poolsync_api::Error::Connection {
                url: "http://10.0.0.9/".into(),
                reason: "refused".into(),
            }),
            Vec::new(),
        );

        let (result, _) = run(&channel).await;
        assert!(matches!(result, Err(CoreError::ConnectionFailed { .. })));
        assert_eq!(channel.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_seen_within_one_interval() {
        let polls = (0..100).map(|_| waiting(120)).collect();
        let channel = ScriptedChannel::new(waiting(120), polls);
        let (tx, _rx) = watch::channel(PairingState::Idle);
        let cancel = CancellationToken::new();
        let config = PairingConfig::default();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = run_pairing(&channel, &config, &tx, &cancel).await;
        assert!(matches!(result, Err(CoreError::PairingCancelled)));
        assert!(started.elapsed() <= Duration::from_secs(7) + config.poll_interval);
        assert!(matches!(*tx.borrow(), PairingState::Failed { .. }));
    }

    #[tokio::test]
    async fn already_cancelled_never_touches_the_device() {
        let channel = ScriptedChannel::new(waiting(120), Vec::new());
        let (tx, _rx) = watch::channel(PairingState::Idle);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_pairing(&channel, &PairingConfig::default(), &tx, &cancel).await;
        assert!(matches!(result, Err(CoreError::PairingCancelled)));
        assert!(channel.start.lock().unwrap().is_some());
    }
}
