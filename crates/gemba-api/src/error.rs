use thiserror::Error;

/// Transport-level error type for the `gemba-api` crate.
///
/// Frame decode failures are deliberately NOT represented here -- a bad
/// payload is a per-frame condition handled by
/// [`DecodeError`](crate::snapshot::DecodeError) and never tears down the
/// connection. `gemba-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket handshake or connection establishment failed.
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    /// The stream produced an error mid-connection (abrupt close,
    /// protocol violation, network failure).
    #[error("WebSocket stream error: {0}")]
    Stream(String),

    /// Sending an outbound message failed.
    #[error("WebSocket send failed: {0}")]
    Send(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The monitor endpoint can only be derived from http(s)/ws(s) URLs.
    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },
}
