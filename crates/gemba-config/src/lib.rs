//! Shared configuration for the gemba CLI.
//!
//! TOML profiles, token resolution (env + plaintext), and translation to
//! `gemba_core::MonitorConfig`. The CLI adds flag-aware overrides on top.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gemba_core::{MonitorConfig, RetryConfig, RetryStrategy};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

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

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by explicit name, falling back to
    /// `default_profile`. A missing explicit name is an error; a missing
    /// default silently yields `None`.
    pub fn select_profile(&self, name: Option<&str>) -> Result<Option<&Profile>, ConfigError> {
        match name {
            Some(name) => self
                .profiles
                .get(name)
                .map(Some)
                .ok_or_else(|| ConfigError::UnknownProfile {
                    profile: name.into(),
                }),
            None => Ok(self
                .default_profile
                .as_deref()
                .and_then(|name| self.profiles.get(name))),
        }
    }
}

/// A named server profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "https://mes.factory.example").
    pub url: Option<String>,

    /// Bearer token (plaintext — prefer `auth_token_env`).
    pub auth_token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub auth_token_env: Option<String>,

    /// Retry strategy: "fixed" or "exponential".
    pub retry_strategy: Option<String>,

    /// Inter-attempt delay in milliseconds.
    pub retry_delay_ms: Option<u64>,

    /// Attempt bound; 0 means retry forever.
    pub retry_max_attempts: Option<u32>,

    /// Delay cap in milliseconds (exponential strategy).
    pub retry_max_delay_ms: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "gemba").map_or_else(
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
    p.push("gemba");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("GEMBA_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

/// Starter config written by `gemba config init`.
pub fn starter_config() -> Config {
    let mut profiles = HashMap::new();
    profiles.insert(
        "default".to_owned(),
        Profile {
            url: Some("http://127.0.0.1:8080".into()),
            ..Profile::default()
        },
    );
    Config {
        default_profile: Some("default".into()),
        profiles,
    }
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the bearer token from a profile: env var first, plaintext
/// second, and `None` when neither is set. Anonymous access is the
/// common deployment, so an absent token is not an error.
pub fn resolve_token(profile: &Profile) -> Option<SecretString> {
    if let Some(ref env_name) = profile.auth_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    profile
        .auth_token
        .as_ref()
        .map(|token| SecretString::from(token.clone()))
}

// ── Translation to MonitorConfig ────────────────────────────────────

fn parse_strategy(raw: &str) -> Result<RetryStrategy, ConfigError> {
    match raw {
        "fixed" => Ok(RetryStrategy::Fixed),
        "exponential" => Ok(RetryStrategy::Exponential),
        other => Err(ConfigError::Validation {
            field: "retry_strategy".into(),
            reason: format!("expected 'fixed' or 'exponential', got '{other}'"),
        }),
    }
}

/// Build a `MonitorConfig` from a profile — no CLI flag overrides.
pub fn profile_to_monitor_config(profile: &Profile) -> Result<MonitorConfig, ConfigError> {
    let mut config = MonitorConfig::default();

    if let Some(ref raw) = profile.url {
        config.url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }

    config.auth_token = resolve_token(profile);

    let mut retry = RetryConfig::default();
    if let Some(ref raw) = profile.retry_strategy {
        retry.strategy = parse_strategy(raw)?;
    }
    if let Some(ms) = profile.retry_delay_ms {
        retry.delay = Duration::from_millis(ms);
    }
    if let Some(max) = profile.retry_max_attempts {
        retry.max_attempts = (max > 0).then_some(max);
    }
    if let Some(ms) = profile.retry_max_delay_ms {
        retry.max_delay = Duration::from_millis(ms);
    }
    config.retry = retry;

    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────
