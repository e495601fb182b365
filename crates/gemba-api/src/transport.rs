//! Transport abstraction and the production WebSocket implementation.
//!
//! The channel state machine in `gemba-core` is generic over [`Transport`]
//! so its retry/teardown behavior can be exercised against scripted
//! transports in tests. [`WsTransport`] is the production implementation
//! over tokio-tungstenite.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// Path of the monitoring endpoint relative to the server origin.
pub const MONITOR_PATH: &str = "/ws/monitor";

// ── Traits ───────────────────────────────────────────────────────────

/// Opens message-oriented connections to the monitoring endpoint.
///
/// Explicit `Send` bounds on the returned futures let the channel task be
/// spawned for any implementation.
pub trait Transport: Send + Sync + 'static {
    type Conn: Connection + Send;

    fn connect(&self, url: &Url) -> impl Future<Output = Result<Self::Conn, Error>> + Send;
}

/// One live bidirectional connection.
pub trait Connection: Send {
    /// Next inbound text frame. `None` means the connection ended cleanly
    /// (close frame or end of stream); `Some(Err(_))` means it failed.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<String, Error>>> + Send;

    /// Send one outbound text frame.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Close the connection. Best effort; errors are ignored.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// ── URL derivation ───────────────────────────────────────────────────

/// Derive the monitoring endpoint URL from the server origin.
///
/// The WebSocket scheme follows the origin's: `https`/`wss` map to `wss`,
/// `http`/`ws` map to `ws`.
pub fn monitor_url(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = base.join(MONITOR_PATH)?;
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: scheme.to_owned(),
    })?;
    Ok(url)
}

// ── WsTransport ──────────────────────────────────────────────────────

/// Production transport over tokio-tungstenite.
///
/// The reference deployment sends no credential on the handshake; whether
/// the server enforces one is a deployment decision, so an optional bearer
/// token can be attached as an `Authorization` header on the upgrade
/// request.
#[derive(Default)]
pub struct WsTransport {
    bearer_token: Option<SecretString>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `Authorization: Bearer <token>` to the upgrade request.
    pub fn with_bearer_token(token: SecretString) -> Self {
        Self {
            bearer_token: Some(token),
        }
    }
}

impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn connect(&self, url: &Url) -> Result<WsConnection, Error> {
        tracing::info!(url = %url, "connecting to monitoring endpoint");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::Connect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref token) = self.bearer_token {
            request = request.with_header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        tracing::info!("monitoring endpoint connected");
        Ok(WsConnection { inner: stream })
    }
}

/// A live WebSocket connection to the monitoring endpoint.
pub struct WsConnection {
    inner: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<String, Error>> {
        loop {
            match self.inner.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(text.as_str().to_owned()));
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                    } else {
                        tracing::info!("close frame received (no payload)");
                    }
                    return None;
                }
                Some(Ok(_)) => {
                    // Ping/Pong are handled by tungstenite; Binary frames
                    // are not part of the protocol.
                }
                Some(Err(e)) => return Some(Err(Error::Stream(e.to_string()))),
                None => {
                    tracing::info!("stream ended");
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), Error> {
        self.inner
            .send(tungstenite::Message::text(text))
            .await
            .map_err(|e| Error::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────────
