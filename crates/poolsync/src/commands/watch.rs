//! `poolsync watch`: background refresh loop, printing each snapshot.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use poolsync_config::validate_update_interval;
use poolsync_core::{CoreError, DeviceSession, DeviceSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::status::{device_mac, render_snapshot};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    session: &DeviceSession,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let interval = match args.interval {
        Some(secs) => {
            let interval = Duration::from_secs(secs);
            validate_update_interval(interval)?;
            interval
        }
        None => session.config().effective_update_interval(),
    };
    let limit = args.count.unwrap_or(u64::MAX);
    if limit == 0 {
        return Ok(());
    }

    let mut updates = session.snapshots();
    let first = session.refresh().await?;
    let _ = updates.borrow_and_update();
    print_snapshot(session, &first, global)?;
    if limit == 1 {
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut task = session.spawn_refresh_task(interval, cancel.clone());
    let mut task_done = false;
    tracing::info!(interval = ?interval, "watching device");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut shown = 1;
    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let latest = updates.borrow_and_update().clone();
                let Some(snapshot) = latest else { continue };
                if let Err(e) = print_snapshot(session, &snapshot, global) {
                    break Err(e);
                }
                shown += 1;
                if shown >= limit {
                    break Ok(());
                }
            }
            _ = &mut task => {
                // The refresh loop only ends on its own when the device
                // stops accepting the credential.
                task_done = true;
                break Err(CliError::from(CoreError::Unauthorized));
            }
        }
    };

    cancel.cancel();
    if !task_done {
        let _ = task.await;
    }
    result
}

fn print_snapshot(
    session: &DeviceSession,
    snapshot: &DeviceSnapshot,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mac = device_mac(session);
    let out = render_snapshot(snapshot, mac.as_deref(), global)?;
    output::print_output(&out, global.quiet);
    if !global.quiet && global.output == OutputFormat::Table {
        println!();
    }
    Ok(())
}
