//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and config failures into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use gemba_core::CoreError;

/// Exit codes used by the binary.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Lost the monitoring channel: {reason}")]
    #[diagnostic(
        code(gemba::channel_failed),
        help(
            "All reconnection attempts were used up.\n\
             Check that the server is reachable, then rerun the command.\n\
             Tune retries with --retry-delay-ms / --retry-max-attempts."
        )
    )]
    ChannelFailed { reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No server configured")]
    #[diagnostic(
        code(gemba::no_server),
        help(
            "Pass --url, set GEMBA_URL, or create a profile with: gemba config init\n\
             Expected config at: {path}"
        )
    )]
    NoServer { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gemba::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(gemba::config))]
    Config(#[from] gemba_config::ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(gemba::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Core ─────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(gemba::core))]
    Core(#[from] CoreError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No snapshot arrived within {seconds}s")]
    #[diagnostic(
        code(gemba::timeout),
        help("Increase --timeout or check that the server is pushing updates.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode snapshot as JSON: {0}")]
    #[diagnostic(code(gemba::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChannelFailed { .. } => exit_code::CONNECTION,
            Self::Core(err) => match err {
                CoreError::ReconnectionExhausted { .. } | CoreError::ConnectionFailed { .. } => {
                    exit_code::CONNECTION
                }
                CoreError::Config { .. } => exit_code::USAGE,
            },
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoServer { .. }
            | Self::Validation { .. }
            | Self::ConfigExists { .. }
            | Self::Config(
                gemba_config::ConfigError::UnknownProfile { .. }
                | gemba_config::ConfigError::Validation { .. },
            ) => exit_code::USAGE,
            Self::Config(_) | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}
