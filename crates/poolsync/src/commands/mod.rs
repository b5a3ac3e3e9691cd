//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod config_cmd;
pub mod pair;
pub mod set;
pub mod status;
pub mod watch;

use poolsync_core::DeviceSession;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    session: &DeviceSession,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(session, global).await,
        Command::Set(args) => set::handle(session, args, global).await,
        Command::Watch(args) => watch::handle(session, &args, global).await,
        // Pair, Config, and Completions are handled before dispatch
        Command::Pair(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
