//! Config subcommand handlers.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use poolsync_config::{self as pconfig, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::available_profiles;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

#[derive(Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    active: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Paired")]
    paired_at: String,
    #[tabled(rename = "Interval")]
    interval: String,
}

pub fn handle(args: ConfigArgs, cfg: Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let shown = redacted(cfg);
            let out = output::render_single(global.output, &shown, |c| {
                toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unrenderable: {e}>"))
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&pconfig::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetInterval { seconds } => {
            pconfig::validate_update_interval(Duration::from_secs(seconds))?;
            let mut cfg = file_only()?;
            let name = cfg.active_profile_name(global.profile.as_deref());
            let available = available_profiles(&cfg);
            let profile = cfg
                .profiles
                .get_mut(&name)
                .ok_or_else(|| CliError::ProfileNotFound {
                    name: name.clone(),
                    available,
                })?;
            profile.update_interval = Some(seconds);
            pconfig::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Profile '{name}' now refreshes every {seconds}s");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let default = cfg.active_profile_name(None);
            let rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    active: if *name == default { "*" } else { "" },
                    name: name.clone(),
                    device: p.device_ip.clone(),
                    mac: p.mac.clone().unwrap_or_default(),
                    paired_at: p
                        .paired_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default(),
                    interval: format!(
                        "{}s",
                        p.update_interval.unwrap_or(cfg.defaults.update_interval)
                    ),
                })
                .collect();
            let out = output::render_single(global.output, &rows, |r| {
                if r.is_empty() {
                    "No profiles configured. Run: poolsync pair <device-ip>".into()
                } else {
                    output::render_table(r)
                }
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = file_only()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            pconfig::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

/// Re-read the file without environment overrides before rewriting it.
fn file_only() -> Result<Config, CliError> {
    Ok(pconfig::load_config_file(&pconfig::config_path())?)
}

/// Copy of the config with stored passwords masked.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}
