//! `poolsync pair`: push-link pairing with a live countdown.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use poolsync_config::{Config, ProfileCredentialStore, SecretStorage};
use poolsync_core::{DeviceSession, PairingState};

use crate::cli::{GlobalOpts, PairArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Paired {
    profile: String,
    device: String,
    mac: String,
    paired_at: chrono::DateTime<chrono::Utc>,
    storage: &'static str,
}

pub async fn handle(args: &PairArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let active = config::resolve(cfg, global, args.device_ip.as_deref())?;
    let session = DeviceSession::new(active.session.clone())?;

    let storage = if args.plaintext || !global.use_keyring() {
        SecretStorage::Plaintext
    } else {
        SecretStorage::Keyring
    };
    let store = ProfileCredentialStore::new(active.name.clone(), storage);

    let spinner = if global.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Contacting {}...", session.device_address()));

    let cancel = CancellationToken::new();
    let mut progress = session.pairing_progress();
    let pairing = session.pair_with(&store, &cancel);
    tokio::pin!(pairing);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            result = &mut pairing => break result,
            changed = progress.changed() => {
                if changed.is_ok() {
                    let state = progress.borrow_and_update().clone();
                    spinner.set_message(describe(&state));
                }
            }
            _ = &mut ctrl_c, if !cancel.is_cancelled() => {
                spinner.set_message("Cancelling...");
                cancel.cancel();
            }
        }
    };
    spinner.finish_and_clear();

    let credential = result.map_err(|e| CliError::from(e).for_profile(&active.name))?;

    let paired = Paired {
        profile: active.name.clone(),
        device: session.device_address(),
        mac: credential.device_mac().to_string(),
        paired_at: credential.paired_at(),
        storage: match store.stored_in().unwrap_or(storage) {
            SecretStorage::Keyring => "keyring",
            SecretStorage::Plaintext => "config",
        },
    };
    let out = output::render_single(global.output, &paired, |p| {
        format!(
            "Paired with {} ({}); credential saved to profile '{}' ({})",
            p.device, p.mac, p.profile, p.storage
        )
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn describe(state: &PairingState) -> String {
    match state {
        PairingState::Idle => "Preparing...".into(),
        PairingState::LinkRequested => "Requesting link...".into(),
        PairingState::AwaitingButtonPress {
            remaining: Some(remaining),
        } => format!(
            "Press the push-link button on the device ({} left)",
            humantime::format_duration(Duration::from_secs(remaining.as_secs()))
        ),
        PairingState::AwaitingButtonPress { remaining: None } => {
            "Press the push-link button on the device".into()
        }
        PairingState::Linked { device_mac } => format!("Linked with {device_mac}"),
        PairingState::Failed { reason } => format!("Pairing failed: {reason}"),
    }
}
