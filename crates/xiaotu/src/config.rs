//! Profile resolution for the CLI: config file + flag overrides, and
//! write-back of the cached session after each run.

use secrecy::SecretString;
use tracing::debug;

use xiaotu_config::{
    Config, Profile, config_path, load_config, load_config_or_default, profile_to_account_config,
    save_config,
};
use xiaotu_core::{AccountConfig, Coordinator};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// A resolved account, ready to build a coordinator from.
pub struct Resolved {
    pub profile_name: String,
    /// Whether the profile lives in the config file (and can store a session).
    pub persisted: bool,
    pub config: AccountConfig,
}

/// The profile selected by `--profile` or the config's default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build an `AccountConfig` from the config file, profile, and CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let (mut profile, persisted) = match cfg.profiles.get(&profile_name) {
        Some(profile) => (profile.clone(), true),
        None => (Profile::default(), false),
    };

    // No profile found -- flags / env vars have to carry the whole account
    if !persisted && global.openid.is_none() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref openid) = global.openid {
        profile.openid.clone_from(openid);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    if let Some(ref id) = global.client_id {
        profile.client_id = Some(id.clone());
    }

    let mut config = profile_to_account_config(&profile, &profile_name, &cfg.defaults)?;
    if let Some(ref id) = global.client_id {
        config.client_id = SecretString::from(id.clone());
    }

    Ok(Resolved {
        profile_name,
        persisted,
        config,
    })
}

// ── Command context ──────────────────────────────────────────────────

/// What every account-bound command gets.
pub struct Context {
    pub coordinator: Coordinator,
    pub profile_name: String,
    persisted: bool,
}

impl Context {
    pub fn new(resolved: Resolved) -> Result<Self, CliError> {
        let coordinator = Coordinator::new(resolved.config)?;
        Ok(Self {
            coordinator,
            profile_name: resolved.profile_name,
            persisted: resolved.persisted,
        })
    }

    /// Write the coordinator's current session back into the profile.
    ///
    /// No-op for flag-only accounts or when the stored session is current.
    pub fn persist_session(&self) -> Result<(), CliError> {
        if !self.persisted {
            return Ok(());
        }

        let snapshot = self.coordinator.session_snapshot();
        let mut cfg = load_config()?;
        let unchanged = cfg
            .profiles
            .get(&self.profile_name)
            .is_none_or(|p| p.session == snapshot);
        if unchanged {
            return Ok(());
        }

        cfg.set_session(&self.profile_name, snapshot)?;
        save_config(&cfg)?;
        debug!(profile = %self.profile_name, "session stored");
        Ok(())
    }
}
