mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "poolsync", &mut std::io::stdout());
            Ok(())
        }

        Command::Config(args) => {
            let cfg = config::load()?;
            commands::config_cmd::handle(args, cfg, &cli.global)
        }

        Command::Pair(ref args) => {
            let cfg = config::load()?;
            commands::pair::handle(args, &cfg, &cli.global).await
        }

        // Everything else talks to a paired device
        cmd => {
            let cfg = config::load()?;
            let active = config::resolve(&cfg, &cli.global, None)?;
            let session = active.open_session(cli.global.use_keyring())?;
            if !session.is_paired() {
                return Err(CliError::NotPaired {
                    profile: active.name,
                });
            }

            tracing::debug!(command = ?cmd, profile = %active.name, "dispatching command");
            commands::dispatch(cmd, &session, &cli.global)
                .await
                .map_err(|e| e.for_profile(&active.name))
        }
    }
}
