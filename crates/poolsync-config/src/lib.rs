//! Shared configuration for the PoolSync CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! credential persistence after pairing, and translation to
//! `poolsync_core::SessionConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use poolsync_core::config::MIN_UPDATE_INTERVAL;
use poolsync_core::{
    CoreError, Credential, CredentialStore, SessionConfig, SubDeviceKind, TemperatureUnit,
};

/// Keyring service name.
const KEYRING_SERVICE: &str = "poolsync";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "POOLSYNC_CONFIG";

/// Environment variable holding an access password for any profile.
pub const PASSWORD_ENV: &str = "POOLSYNC_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick the profile name: explicit choice, then `default_profile`, then `"default"`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(String::from)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Refresh interval in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            update_interval: default_update_interval(),
            temperature_unit: TemperatureUnit::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_update_interval() -> u64 {
    120
}

/// A named device profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Device IP address or `host:port`.
    pub device_ip: String,

    /// Device MAC address, recorded at pairing time.
    pub mac: Option<String>,

    /// When the stored credential was issued.
    pub paired_at: Option<DateTime<Utc>>,

    /// Access password (plaintext; the keyring is preferred).
    pub password: Option<String>,

    /// Environment variable name containing the access password.
    pub password_env: Option<String>,

    /// Override refresh interval in seconds.
    pub update_interval: Option<u64>,

    /// Override temperature unit.
    pub temperature_unit: Option<TemperatureUnit>,

    /// Override timeout in seconds.
    pub timeout: Option<u64>,

    /// Forced sub-device kinds keyed by slot number.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slot_overrides: BTreeMap<String, SubDeviceKind>,
}

impl Profile {
    pub fn new(device_ip: impl Into<String>) -> Self {
        Self {
            device_ip: device_ip.into(),
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `POOLSYNC_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "poolsync", "poolsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poolsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit path, layered over defaults and under
/// `POOLSYNC_` environment variables (`POOLSYNC_DEFAULTS__TIMEOUT=60`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POOLSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load only what is written in the file at `path`, over built-in
/// defaults. Use this before rewriting the file so environment overrides
/// are not persisted.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve the access password: profile env var, `POOLSYNC_PASSWORD`,
/// system keyring, then plaintext in the config file.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_password_with(profile, profile_name, true)
}

/// As [`resolve_password`], optionally skipping the keyring.
pub fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    use_keyring: bool,
) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(val));
    }

    // 3. System keyring
    if use_keyring {
        if let Ok(pw) = keyring_entry(profile_name).and_then(|entry| {
            entry
                .get_password()
                .map_err(|e| ConfigError::Keyring(e.to_string()))
        }) {
            return Some(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    profile
        .password
        .as_ref()
        .filter(|pw| !pw.is_empty())
        .map(|pw| SecretString::from(pw.clone()))
}

/// Build the stored credential for a profile, if it has been paired.
pub fn resolve_credential(profile: &Profile, profile_name: &str) -> Option<Credential> {
    resolve_credential_with(profile, profile_name, true)
}

pub fn resolve_credential_with(
    profile: &Profile,
    profile_name: &str,
    use_keyring: bool,
) -> Option<Credential> {
    let password = resolve_password_with(profile, profile_name, use_keyring)?;
    Some(Credential::new(
        password,
        profile.mac.clone().unwrap_or_default(),
        profile.paired_at.unwrap_or_else(Utc::now),
    ))
}

// ── Session config ──────────────────────────────────────────────────

/// Build a `SessionConfig` from a profile and the global defaults.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    if profile.device_ip.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "device_ip".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config =
        SessionConfig::for_host(&profile.device_ip).map_err(|e| ConfigError::Validation {
            field: "device_ip".into(),
            reason: e.to_string(),
        })?;

    let interval = Duration::from_secs(profile.update_interval.unwrap_or(defaults.update_interval));
    validate_update_interval(interval)?;

    config.update_interval = interval;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.temperature_unit = profile.temperature_unit.unwrap_or(defaults.temperature_unit);

    for (slot, kind) in &profile.slot_overrides {
        let slot: u32 = slot.trim().parse().map_err(|_| ConfigError::Validation {
            field: "slot_overrides".into(),
            reason: format!("slot '{slot}' is not a non-negative integer"),
        })?;
        config.slot_overrides.insert(slot, *kind);
    }

    Ok(config)
}

/// Reject intervals below the device's minimum.
pub fn validate_update_interval(interval: Duration) -> Result<(), ConfigError> {
    if interval < MIN_UPDATE_INTERVAL {
        return Err(ConfigError::Validation {
            field: "update_interval".into(),
            reason: format!(
                "must be at least {}s, got {}s",
                MIN_UPDATE_INTERVAL.as_secs(),
                interval.as_secs()
            ),
        });
    }
    Ok(())
}

// ── Credential persistence ──────────────────────────────────────────

/// Where the access password ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStorage {
    /// OS keyring, falling back to plaintext if the keyring is unavailable.
    Keyring,
    /// Plaintext in the config file.
    Plaintext,
}

/// Backend for passwords kept outside the config file.
pub trait PasswordVault: Send + Sync {
    fn store(&self, profile: &str, password: &str) -> Result<(), ConfigError>;

    /// Remove the profile's entry. A missing entry is not an error.
    fn remove(&self, profile: &str) -> Result<(), ConfigError>;
}

/// The OS keyring, one entry per profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsKeyring;

impl PasswordVault for OsKeyring {
    fn store(&self, profile: &str, password: &str) -> Result<(), ConfigError> {
        keyring_entry(profile)?
            .set_password(password)
            .map_err(|e| ConfigError::Keyring(e.to_string()))
    }

    fn remove(&self, profile: &str) -> Result<(), ConfigError> {
        match keyring_entry(profile)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ConfigError::Keyring(e.to_string())),
        }
    }
}

/// Writes a freshly paired credential into a profile of the config file.
pub struct ProfileCredentialStore {
    path: PathBuf,
    profile: String,
    storage: SecretStorage,
    vault: Arc<dyn PasswordVault>,
    used: Mutex<Option<SecretStorage>>,
}

impl std::fmt::Debug for ProfileCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileCredentialStore")
            .field("path", &self.path)
            .field("profile", &self.profile)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl ProfileCredentialStore {
    /// Store into `profile` of the canonical config file.
    pub fn new(profile: impl Into<String>, storage: SecretStorage) -> Self {
        Self::at(config_path(), profile, storage)
    }

    /// Store into `profile` of the config file at `path`.
    pub fn at(path: impl Into<PathBuf>, profile: impl Into<String>, storage: SecretStorage) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
            storage,
            vault: Arc::new(OsKeyring),
            used: Mutex::new(None),
        }
    }

    /// Replace the OS keyring with another vault.
    #[must_use]
    pub fn with_vault(mut self, vault: Arc<dyn PasswordVault>) -> Self {
        self.vault = vault;
        self
    }

    /// Where the last saved password actually went. `None` before the
    /// first save.
    pub fn stored_in(&self) -> Option<SecretStorage> {
        self.used.lock().ok().and_then(|used| *used)
    }

    /// Write the credential and return where the password went.
    ///
    /// A password kept in the file clears the profile's vault entry, since
    /// the vault is consulted first on lookup.
    pub fn persist(&self, device: &str, credential: &Credential) -> Result<SecretStorage, ConfigError> {
        let mut cfg = if self.path.exists() {
            load_config_file(&self.path)?
        } else {
            Config::default()
        };
        let password = credential.access_password().expose_secret();

        let used = match self.storage {
            SecretStorage::Keyring => match self.vault.store(&self.profile, password) {
                Ok(()) => SecretStorage::Keyring,
                Err(e) => {
                    warn!(error = %e, "keyring unavailable; storing password in config file");
                    SecretStorage::Plaintext
                }
            },
            SecretStorage::Plaintext => SecretStorage::Plaintext,
        };
        if used == SecretStorage::Plaintext {
            if let Err(e) = self.vault.remove(&self.profile) {
                debug!(error = %e, profile = %self.profile, "keyring entry not cleared");
            }
        }

        let profile = cfg
            .profiles
            .entry(self.profile.clone())
            .or_insert_with(|| Profile::new(device));
        profile.device_ip = device.to_string();
        profile.mac = Some(credential.device_mac().to_string()).filter(|m| !m.is_empty());
        profile.paired_at = Some(credential.paired_at());
        profile.password = match used {
            SecretStorage::Keyring => None,
            SecretStorage::Plaintext => Some(password.to_string()),
        };

        if cfg.profiles.len() == 1 {
            cfg.default_profile = Some(self.profile.clone());
        }

        save_config_to(&self.path, &cfg)?;
        if let Ok(mut slot) = self.used.lock() {
            *slot = Some(used);
        }
        Ok(used)
    }
}

impl CredentialStore for ProfileCredentialStore {
    fn save(&self, device: &str, credential: &Credential) -> Result<(), CoreError> {
        self.persist(device, credential)
            .map(|_| ())
            .map_err(|e| CoreError::Persistence {
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "backyard"

[defaults]
output = "json"
update_interval = 60
temperature_unit = "celsius"

[profiles.backyard]
device_ip = "192.168.1.50"
mac = "AA:BB:CC:DD:EE:FF"
paired_at = "2024-06-01T12:00:00Z"
password = "plain-pw"
update_interval = 30

[profiles.backyard.slot_overrides]
0 = "chlorinator"
1 = "heat_pump"

[profiles.spa]
device_ip = "10.0.0.8:8080"
"#;

    #[test]
    fn parses_profiles_and_defaults() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.active_profile_name(None), "backyard");
        assert_eq!(cfg.active_profile_name(Some("spa")), "spa");
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.defaults.temperature_unit, TemperatureUnit::Celsius);

        let backyard = cfg.profile("backyard").unwrap();
        assert_eq!(backyard.mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(
            backyard.slot_overrides.get("1"),
            Some(&SubDeviceKind::HeatPump)
        );
        assert!(matches!(
            cfg.profile("garage"),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn profile_becomes_session_config() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        let session = profile_to_session_config(cfg.profile("backyard").unwrap(), &cfg.defaults)
            .unwrap();
        assert_eq!(session.device_url.as_str(), "http://192.168.1.50/");
        assert_eq!(session.update_interval, Duration::from_secs(30));
        assert_eq!(session.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(session.slot_overrides.get(&1), Some(&SubDeviceKind::HeatPump));

        let spa = profile_to_session_config(cfg.profile("spa").unwrap(), &cfg.defaults).unwrap();
        assert_eq!(spa.device_url.as_str(), "http://10.0.0.8:8080/");
        assert_eq!(spa.update_interval, Duration::from_secs(60));
    }

    #[test]
    fn short_interval_is_rejected() {
        let mut profile = Profile::new("192.168.1.50");
        profile.update_interval = Some(5);
        let err = profile_to_session_config(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "update_interval"));
    }

    #[test]
    fn bad_slot_override_is_rejected() {
        let mut profile = Profile::new("192.168.1.50");
        profile
            .slot_overrides
            .insert("first".into(), SubDeviceKind::Chlorinator);
        assert!(profile_to_session_config(&profile, &Defaults::default()).is_err());
    }

    #[test]
    fn plaintext_password_resolves_without_keyring() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        let cred = resolve_credential_with(cfg.profile("backyard").unwrap(), "backyard", false)
            .unwrap();
        assert_eq!(cred.access_password().expose_secret(), "plain-pw");
        assert_eq!(cred.device_mac(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(cred.paired_at().to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn unpaired_profile_has_no_credential() {
        let profile = Profile::new("10.0.0.8");
        if std::env::var(PASSWORD_ENV).is_err() {
            assert!(resolve_credential_with(&profile, "spa", false).is_none());
        }
    }

    #[test]
    fn store_writes_profile_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let store = ProfileCredentialStore::at(&path, "pool", SecretStorage::Plaintext)
            .with_vault(Arc::new(MemoryVault::default()));

        let paired_at = DateTime::parse_from_rfc3339("2024-07-04T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let cred = Credential::new(
            SecretString::from("issued-pw".to_string()),
            "11:22:33:44:55:66",
            paired_at,
        );
        store.save("192.168.1.77", &cred).unwrap();

        let cfg: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("pool"));
        let profile = cfg.profile("pool").unwrap();
        assert_eq!(profile.device_ip, "192.168.1.77");
        assert_eq!(profile.mac.as_deref(), Some("11:22:33:44:55:66"));
        assert_eq!(profile.paired_at, Some(paired_at));
        assert_eq!(profile.password.as_deref(), Some("issued-pw"));
    }

    #[test]
    fn store_preserves_other_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = ProfileCredentialStore::at(&path, "spa", SecretStorage::Plaintext)
            .with_vault(Arc::new(MemoryVault::default()));
        let cred = Credential::new(SecretString::from("spa-pw".to_string()), "AB", Utc::now());
        store.save("10.0.0.8:8080", &cred).unwrap();

        let cfg: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("backyard"));
        assert_eq!(cfg.profiles.len(), 2);
        assert_eq!(cfg.profile("backyard").unwrap().password.as_deref(), Some("plain-pw"));
        assert_eq!(cfg.profile("spa").unwrap().password.as_deref(), Some("spa-pw"));
    }

    #[derive(Default)]
    struct MemoryVault {
        entries: Mutex<BTreeMap<String, String>>,
        broken: bool,
    }

    impl MemoryVault {
        fn holding(profile: &str, password: &str) -> Arc<Self> {
            let vault = Self::default();
            vault
                .entries
                .lock()
                .unwrap()
                .insert(profile.into(), password.into());
            Arc::new(vault)
        }

        fn get(&self, profile: &str) -> Option<String> {
            self.entries.lock().unwrap().get(profile).cloned()
        }
    }

    impl PasswordVault for MemoryVault {
        fn store(&self, profile: &str, password: &str) -> Result<(), ConfigError> {
            if self.broken {
                return Err(ConfigError::Keyring("no backend".into()));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(profile.into(), password.into());
            Ok(())
        }

        fn remove(&self, profile: &str) -> Result<(), ConfigError> {
            self.entries.lock().unwrap().remove(profile);
            Ok(())
        }
    }

    fn issued(password: &str) -> Credential {
        Credential::new(
            SecretString::from(password.to_string()),
            "11:22:33:44:55:66",
            Utc::now(),
        )
    }

    #[test]
    fn keyring_storage_keeps_password_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let vault = Arc::new(MemoryVault::default());
        let store = ProfileCredentialStore::at(&path, "pool", SecretStorage::Keyring)
            .with_vault(vault.clone());

        assert_eq!(store.stored_in(), None);
        let used = store.persist("192.168.1.77", &issued("kept-pw")).unwrap();

        assert_eq!(used, SecretStorage::Keyring);
        assert_eq!(store.stored_in(), Some(SecretStorage::Keyring));
        assert_eq!(vault.get("pool").as_deref(), Some("kept-pw"));
        let cfg = load_config_file(&path).unwrap();
        assert_eq!(cfg.profile("pool").unwrap().password, None);
    }

    #[test]
    fn plaintext_save_clears_stale_keyring_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let vault = MemoryVault::holding("pool", "old-pw");
        let store = ProfileCredentialStore::at(&path, "pool", SecretStorage::Plaintext)
            .with_vault(vault.clone());

        store.save("192.168.1.77", &issued("new-pw")).unwrap();

        assert_eq!(vault.get("pool"), None);
        assert_eq!(store.stored_in(), Some(SecretStorage::Plaintext));
        let cfg = load_config_file(&path).unwrap();
        assert_eq!(cfg.profile("pool").unwrap().password.as_deref(), Some("new-pw"));
    }

    #[test]
    fn broken_keyring_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let vault = Arc::new(MemoryVault {
            broken: true,
            ..MemoryVault::default()
        });
        let store = ProfileCredentialStore::at(&path, "pool", SecretStorage::Keyring)
            .with_vault(vault);

        let used = store.persist("192.168.1.77", &issued("fallback-pw")).unwrap();

        assert_eq!(used, SecretStorage::Plaintext);
        let cfg = load_config_file(&path).unwrap();
        assert_eq!(
            cfg.profile("pool").unwrap().password.as_deref(),
            Some("fallback-pw")
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }
}
