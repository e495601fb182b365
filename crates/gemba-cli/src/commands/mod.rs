//! Command handlers: bridge CLI args -> monitor -> rendered output.

pub mod config_cmd;
pub mod status;
pub mod watch;

use std::time::Duration;

use secrecy::SecretString;

use gemba_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `MonitorConfig` from the config file, profile, and CLI overrides.
pub fn build_monitor_config(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let cfg = gemba_config::load_config_or_default();
    let profile = cfg.select_profile(global.profile.as_deref())?;

    let mut monitor = match profile {
        Some(profile) => gemba_config::profile_to_monitor_config(profile)?,
        None => {
            // No profile at all: flags/env must at least name a server.
            if global.url.is_none() {
                return Err(CliError::NoServer {
                    path: gemba_config::config_path().display().to_string(),
                });
            }
            MonitorConfig::default()
        }
    };

    if let Some(ref raw) = global.url {
        monitor.url = raw.parse().map_err(|_| CliError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }
    if let Some(ref token) = global.auth_token {
        monitor.auth_token = Some(SecretString::from(token.clone()));
    }
    if let Some(ms) = global.retry_delay_ms {
        monitor.retry.delay = Duration::from_millis(ms);
    }
    if let Some(max) = global.retry_max_attempts {
        monitor.retry.max_attempts = (max > 0).then_some(max);
    }

    Ok(monitor)
}
