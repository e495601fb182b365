// ── Core error types ──
//
// User-facing errors from gemba-core. Consumers of the monitor never see
// raw transport errors; transport conditions are represented as observable
// state, and these variants cover the operations that can fail directly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cannot connect to monitoring endpoint: {reason}")]
    ConnectionFailed { reason: String },

    /// The retry bound was exhausted; the channel is in its terminal failed
    /// state and needs an explicit restart.
    #[error("reconnection attempts exhausted after {attempts} attempts")]
    ReconnectionExhausted { attempts: u32 },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl From<gemba_api::Error> for CoreError {
    fn from(err: gemba_api::Error) -> Self {
        match err {
            gemba_api::Error::Connect(reason)
            | gemba_api::Error::Stream(reason)
            | gemba_api::Error::Send(reason) => CoreError::ConnectionFailed { reason },
            gemba_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            gemba_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("unsupported URL scheme: {scheme}"),
            },
        }
    }
}
