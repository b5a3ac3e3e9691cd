//! Resolve the active profile and CLI overrides into a ready session.
//!
//! The core never reads files; it receives a pre-built `SessionConfig` and,
//! when one is stored, the credential.

use poolsync_config::{self as config, Config, Profile};
use poolsync_core::{Credential, DeviceSession, SessionConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The profile a command runs against, after CLI overrides.
#[derive(Debug)]
pub struct ActiveProfile {
    pub name: String,
    pub profile: Profile,
    pub session: SessionConfig,
}

impl ActiveProfile {
    /// Stored credential for this profile, if any.
    pub fn credential(&self, use_keyring: bool) -> Option<Credential> {
        config::resolve_credential_with(&self.profile, &self.name, use_keyring)
    }

    /// A session seeded with the stored credential.
    pub fn open_session(&self, use_keyring: bool) -> Result<DeviceSession, CliError> {
        let session = DeviceSession::new(self.session.clone())?;
        Ok(match self.credential(use_keyring) {
            Some(credential) => session.with_credential(credential),
            None => session,
        })
    }
}

/// Load the config file, failing on parse errors but not on absence.
pub fn load() -> Result<Config, CliError> {
    Ok(config::load_config()?)
}

/// Resolve the profile for this invocation.
///
/// `device` (from a positional argument or `--device`) replaces the
/// profile's address; without a profile it stands alone.
pub fn resolve(
    cfg: &Config,
    global: &GlobalOpts,
    device: Option<&str>,
) -> Result<ActiveProfile, CliError> {
    let name = cfg.active_profile_name(global.profile.as_deref());
    let device = device.or(global.device.as_deref());

    let mut profile = match (cfg.profiles.get(&name), device) {
        (Some(existing), Some(ip)) => Profile {
            device_ip: ip.to_string(),
            ..existing.clone()
        },
        (Some(existing), None) => existing.clone(),
        (None, Some(ip)) => Profile::new(ip),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config::config_path().display().to_string(),
            });
        }
    };

    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(unit) = global.unit {
        profile.temperature_unit = Some(unit);
    }

    let session = config::profile_to_session_config(&profile, &cfg.defaults)?;
    tracing::debug!(profile = %name, device = %session.device_url, "resolved profile");

    Ok(ActiveProfile {
        name,
        profile,
        session,
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["poolsync"];
        argv.extend_from_slice(args);
        argv.push("status");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn sample() -> Config {
        toml::from_str(
            r#"
default_profile = "backyard"

[profiles.backyard]
device_ip = "192.168.1.50"
timeout = 10
"#,
        )
        .unwrap()
    }

    #[test]
    fn flags_override_profile() {
        let active = resolve(
            &sample(),
            &global(&["--timeout", "3", "--device", "10.0.0.9", "--unit", "c"]),
            None,
        )
        .unwrap();
        assert_eq!(active.name, "backyard");
        assert_eq!(active.session.device_url.as_str(), "http://10.0.0.9/");
        assert_eq!(active.session.timeout.as_secs(), 3);
        assert_eq!(
            active.session.temperature_unit,
            poolsync_core::TemperatureUnit::Celsius
        );
    }

    #[test]
    fn device_without_profile_stands_alone() {
        let active = resolve(&Config::default(), &global(&[]), Some("10.1.1.1:8080")).unwrap();
        assert_eq!(active.name, "default");
        assert_eq!(active.session.device_url.as_str(), "http://10.1.1.1:8080/");
    }

    #[test]
    fn missing_profile_is_reported() {
        let err = resolve(&sample(), &global(&["--profile", "spa"]), None).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "backyard"));

        let err = resolve(&Config::default(), &global(&[]), None).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }
}
