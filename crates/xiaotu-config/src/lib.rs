//! Shared configuration for XiaoTu tools.
//!
//! TOML profiles, client-id resolution (env + keyring + plaintext), the
//! cached session each profile carries between runs, and translation to
//! `xiaotu_core::AccountConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use xiaotu_core::{AccountConfig, DEFAULT_HOST, SessionSnapshot};

const KEYRING_SERVICE: &str = "xiaotu";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("no client id configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile `name`, or the default one when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }

    /// Replace the cached session of profile `name`.
    pub fn set_session(
        &mut self,
        name: &str,
        session: Option<SessionSnapshot>,
    ) -> Result<(), ConfigError> {
        let profile = self
            .profiles
            .get_mut(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })?;
        profile.session = session;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub log_responses: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            log_responses: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named account profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Vendor base URL.
    #[serde(default = "default_host")]
    pub host: String,

    /// WeChat openid of the resident.
    #[serde(default)]
    pub openid: String,

    /// Client id (plaintext -- prefer keyring or env var).
    pub client_id: Option<String>,

    /// Environment variable name containing the client id.
    pub client_id_env: Option<String>,

    /// Outbound proxy URL.
    pub proxy: Option<String>,

    /// Path to an extra CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override response logging.
    pub log_responses: Option<bool>,

    /// Override timeout, in seconds.
    pub timeout: Option<u64>,

    /// Override the polling interval, in seconds.
    pub refresh_interval: Option<u64>,

    /// Session cached by the last successful login.
    pub session: Option<SessionSnapshot>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            openid: String::new(),
            client_id: None,
            client_id_env: None,
            proxy: None,
            ca_cert: None,
            log_responses: None,
            timeout: None,
            refresh_interval: None,
            session: None,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "xiaotu", "xiaotu").map_or_else(
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
    p.push("xiaotu");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Environment keys use the `XIAOTU_` prefix with `__` as the nesting
/// separator, e.g. `XIAOTU_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("XIAOTU_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/client-id"))
}

/// Resolve the client id: profile env var, then keyring, then plaintext.
pub fn resolve_client_id(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's client_id_env → env var lookup
    if let Some(ref env_name) = profile.client_id_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref id) = profile.client_id {
        return Ok(SecretString::from(id.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store the client id of `profile_name` in the system keyring.
pub fn store_client_id(profile_name: &str, client_id: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(client_id)?;
    Ok(())
}

/// Build an `AccountConfig` from a profile, falling back to `defaults`.
pub fn profile_to_account_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<AccountConfig, ConfigError> {
    let host: url::Url = profile.host.parse().map_err(|_| ConfigError::Validation {
        field: "host".into(),
        reason: format!("invalid URL: {}", profile.host),
    })?;

    if profile.openid.is_empty() {
        return Err(ConfigError::Validation {
            field: "openid".into(),
            reason: format!("profile '{profile_name}' has no openid"),
        });
    }

    let proxy = profile
        .proxy
        .as_deref()
        .map(|p| {
            p.parse::<url::Url>().map_err(|_| ConfigError::Validation {
                field: "proxy".into(),
                reason: format!("invalid URL: {p}"),
            })
        })
        .transpose()?;

    let client_id = resolve_client_id(profile, profile_name)?;

    let mut config = AccountConfig::new(host, profile.openid.clone(), client_id);
    config.session = profile.session.clone();
    config.log_responses = profile.log_responses.unwrap_or(defaults.log_responses);
    config.proxy = proxy;
    config.ca_cert = profile.ca_cert.clone();
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(secs) = profile.refresh_interval {
        config.refresh_interval = Duration::from_secs(secs);
    }
    Ok(config)
}
