// ── Monitor facade ──
//
// The subscriber surface consumers observe. Explicitly constructed and
// independently instantiable: every monitor owns its own cells and channel
// task, so two monitors (or a test harness) never share hidden state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use gemba_api::retry::RetryPolicy;
use gemba_api::snapshot::Snapshot;
use gemba_api::transport::{Transport, WsTransport, monitor_url};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::channel::{Cells, ChannelState, Command, Publisher, channel_loop};
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::stream::SnapshotStream;

const COMMAND_CHANNEL_SIZE: usize = 16;

// ── Monitor ──────────────────────────────────────────────────────────

/// Handle to one monitoring channel.
///
/// Cheaply cloneable via the inner `Arc`. `start`, `stop`, and `refresh`
/// all return immediately; effects are observed through the watch cells.
/// Dropping the last handle tears the channel task down.
pub struct Monitor<T: Transport> {
    inner: Arc<MonitorInner<T>>,
}

struct MonitorInner<T: Transport> {
    url: Url,
    transport: Arc<T>,
    policy: Arc<dyn RetryPolicy>,
    cells: Arc<Cells>,
    epoch: Arc<AtomicU64>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

struct Lifecycle {
    cancel: CancellationToken,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl<T: Transport> std::fmt::Debug for Monitor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("url", &self.inner.url)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Clone for Monitor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Monitor<WsTransport> {
    /// Build a monitor over the production WebSocket transport, attaching
    /// the configured bearer token (if any) to the handshake.
    pub fn from_config(config: MonitorConfig) -> Result<Self, CoreError> {
        let transport = match config.auth_token.clone() {
            Some(token) => WsTransport::with_bearer_token(token),
            None => WsTransport::new(),
        };
        Self::new(config, transport)
    }
}

impl<T: Transport> Monitor<T> {
    /// Create a monitor. Does NOT connect -- call [`start()`](Self::start).
    pub fn new(config: MonitorConfig, transport: T) -> Result<Self, CoreError> {
        let url = monitor_url(&config.url)?;
        let policy = config.retry.build_policy();

        Ok(Self {
            inner: Arc::new(MonitorInner {
                url,
                transport: Arc::new(transport),
                policy,
                cells: Arc::new(Cells::new()),
                epoch: Arc::new(AtomicU64::new(0)),
                lifecycle: Mutex::new(None),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Begin a lifecycle: reset the cells and spawn the channel task.
    ///
    /// Idempotent: a no-op while a lifecycle is already running. Valid
    /// again after `stop()` and after the channel settled in `Failed`.
    pub fn start(&self) {
        let mut lifecycle = self
            .inner
            .lifecycle
            .lock()
            .expect("monitor lifecycle lock poisoned");

        if lifecycle.as_ref().is_some_and(|l| !l.task.is_finished()) {
            tracing::debug!("start ignored: monitor already running");
            return;
        }

        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Fresh lifecycle: observers must not see leftovers from the last.
        let _ = self.inner.cells.snapshot.send(None);
        let _ = self.inner.cells.connected.send(false);
        let _ = self.inner.cells.error.send(None);
        let _ = self.inner.cells.state.send(ChannelState::Idle);

        let cancel = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let publisher = Publisher::new(
            Arc::clone(&self.inner.cells),
            epoch,
            Arc::clone(&self.inner.epoch),
        );

        let task = tokio::spawn(channel_loop(
            self.inner.url.clone(),
            Arc::clone(&self.inner.transport),
            Arc::clone(&self.inner.policy),
            cmd_rx,
            cancel.clone(),
            publisher,
        ));

        *lifecycle = Some(Lifecycle {
            cancel,
            commands: cmd_tx,
            task,
        });
    }

    /// Tear the channel down: cancel any pending reconnect, close the live
    /// connection, clear the cells. Idempotent from any state.
    pub fn stop(&self) {
        let mut lifecycle = self
            .inner
            .lifecycle
            .lock()
            .expect("monitor lifecycle lock poisoned");

        // Bump first so an in-flight publication from the old task is
        // already stale by the time we reset the cells.
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(old) = lifecycle.take() {
            old.cancel.cancel();
        }

        let _ = self.inner.cells.connected.send(false);
        let _ = self.inner.cells.snapshot.send(None);
        let _ = self.inner.cells.error.send(None);
        let _ = self.inner.cells.state.send(ChannelState::Stopped);
    }

    /// Ask the server for an immediate snapshot push.
    ///
    /// Valid only while the channel is open; otherwise the request is
    /// dropped (not queued). Never blocks, never errors.
    pub fn refresh(&self) {
        let lifecycle = self
            .inner
            .lifecycle
            .lock()
            .expect("monitor lifecycle lock poisoned");

        match lifecycle.as_ref() {
            Some(l) => {
                if l.commands.try_send(Command::Refresh).is_err() {
                    tracing::debug!("refresh dropped: channel task unavailable");
                }
            }
            None => tracing::debug!("refresh ignored: monitor not running"),
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to the published snapshot. `None` until the first
    /// successful decode of the current lifecycle.
    pub fn snapshot(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.inner.cells.snapshot.subscribe()
    }

    /// Subscribe to the connected flag.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.cells.connected.subscribe()
    }

    /// Subscribe to the terminal error cell. Transient disconnections do
    /// not set it; only retry exhaustion does.
    pub fn error(&self) -> watch::Receiver<Option<String>> {
        self.inner.cells.error.subscribe()
    }

    /// Subscribe to the channel lifecycle state.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.inner.cells.state.subscribe()
    }

    /// Snapshot stream for use with `StreamExt` combinators.
    pub fn snapshot_stream(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.cells.snapshot.subscribe())
    }

    // ── Point-in-time reads ──────────────────────────────────────────

    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.cells.snapshot.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.cells.connected.borrow()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.cells.error.borrow().clone()
    }

    pub fn current_state(&self) -> ChannelState {
        *self.inner.cells.state.borrow()
    }
}

impl<T: Transport> Drop for MonitorInner<T> {
    fn drop(&mut self) {
        if let Ok(mut lifecycle) = self.lifecycle.lock() {
            if let Some(old) = lifecycle.take() {
                old.cancel.cancel();
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
