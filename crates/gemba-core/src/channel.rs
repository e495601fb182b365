//! Channel state machine.
//!
//! One spawned task owns the live connection exclusively: it connects,
//! reads frames, forwards `refresh` commands, and on loss consults the
//! retry policy before reconnecting. At most one connection is ever alive
//! per lifecycle, and all publication goes through an epoch-guarded
//! [`Publisher`] so a task from a previous start/stop cycle can never
//! mutate state belonging to the current one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gemba_api::retry::RetryPolicy;
use gemba_api::snapshot::Snapshot;
use gemba_api::transport::{Connection, Transport};
use gemba_api::{Error, REFRESH_COMMAND};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::CoreError;

// ── ChannelState ─────────────────────────────────────────────────────

/// Observable lifecycle state of the monitoring channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Constructed or freshly (re)started, nothing attempted yet.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected; frames are flowing.
    Open,
    /// Waiting out the retry delay after a failed/closed connection.
    Reconnecting { attempt: u32 },
    /// Retry bound exhausted. Terminal until an explicit `start()`.
    Failed,
    /// Explicit teardown. A later `start()` begins a fresh lifecycle.
    Stopped,
}

/// Commands forwarded from the monitor facade into the channel task.
#[derive(Debug)]
pub(crate) enum Command {
    Refresh,
}

// ── Cells ────────────────────────────────────────────────────────────

/// The watch cells observers subscribe to. Owned by the monitor, written
/// through a [`Publisher`] by the channel task.
pub(crate) struct Cells {
    pub(crate) state: watch::Sender<ChannelState>,
    pub(crate) snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    pub(crate) connected: watch::Sender<bool>,
    pub(crate) error: watch::Sender<Option<String>>,
}

impl Cells {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        let (snapshot, _) = watch::channel(None);
        let (connected, _) = watch::channel(false);
        let (error, _) = watch::channel(None);
        Self {
            state,
            snapshot,
            connected,
            error,
        }
    }
}

// ── Publisher ────────────────────────────────────────────────────────

/// Epoch-guarded writer for the watch cells.
///
/// Each lifecycle captures the epoch current at spawn time; every write
/// first checks it against the monitor's live epoch. `start()`/`stop()`
/// bump the epoch, so publications racing a teardown are dropped instead
/// of corrupting the next lifecycle's view.
pub(crate) struct Publisher {
    cells: Arc<Cells>,
    epoch: u64,
    current_epoch: Arc<AtomicU64>,
    last_update_time: Option<DateTime<Utc>>,
}

impl Publisher {
    pub(crate) fn new(cells: Arc<Cells>, epoch: u64, current_epoch: Arc<AtomicU64>) -> Self {
        Self {
            cells,
            epoch,
            current_epoch,
            last_update_time: None,
        }
    }

    fn live(&self) -> bool {
        self.current_epoch.load(Ordering::SeqCst) == self.epoch
    }

    fn set_state(&self, state: ChannelState) {
        if self.live() {
            let _ = self.cells.state.send(state);
        }
    }

    fn connection_open(&self) {
        if !self.live() {
            return;
        }
        let _ = self.cells.connected.send(true);
        let _ = self.cells.error.send(None);
        let _ = self.cells.state.send(ChannelState::Open);
    }

    fn connection_lost(&self) {
        if self.live() {
            let _ = self.cells.connected.send(false);
        }
    }

    fn give_up(&self, attempts: u32) {
        if !self.live() {
            return;
        }
        let _ = self.cells.connected.send(false);
        let _ = self
            .cells
            .error
            .send(Some(CoreError::ReconnectionExhausted { attempts }.to_string()));
        let _ = self.cells.state.send(ChannelState::Failed);
    }

    /// Decode one inbound frame. Success replaces the published snapshot
    /// wholesale; failure is logged and leaves the previous snapshot (or
    /// `None`) authoritative.
    fn handle_frame(&mut self, text: &str) {
        match Snapshot::decode(text) {
            Ok(snapshot) => {
                if let Some(prev) = self.last_update_time {
                    if snapshot.update_time < prev {
                        tracing::warn!(
                            previous = %prev,
                            received = %snapshot.update_time,
                            "snapshot updateTime regressed"
                        );
                    }
                }
                self.last_update_time = Some(snapshot.update_time);

                if self.live() {
                    let _ = self.cells.snapshot.send(Some(Arc::new(snapshot)));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
            }
        }
    }
}

// ── Channel task ─────────────────────────────────────────────────────

/// Main loop: connect → read → on loss, consult policy → reconnect or fail.
pub(crate) async fn channel_loop<T: Transport>(
    url: Url,
    transport: Arc<T>,
    policy: Arc<dyn RetryPolicy>,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    mut publisher: Publisher,
) {
    let mut attempts: u32 = 0;

    loop {
        // Refresh is valid only while open; anything queued in between is
        // dropped, never replayed against the next connection.
        while commands.try_recv().is_ok() {
            tracing::debug!("refresh ignored: channel not open");
        }

        publisher.set_state(ChannelState::Connecting);

        let Some(connected) =
            connect_attempt(transport.as_ref(), &url, &mut commands, &cancel).await
        else {
            break;
        };

        match connected {
            Ok(conn) => {
                attempts = 0;
                publisher.connection_open();

                match read_frames(conn, &mut commands, &cancel, &mut publisher).await {
                    ReadOutcome::Cancelled => break,
                    ReadOutcome::Lost(None) => {
                        tracing::info!("connection closed by server");
                        publisher.connection_lost();
                    }
                    ReadOutcome::Lost(Some(e)) => {
                        tracing::warn!(error = %e, "connection lost");
                        publisher.connection_lost();
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempts, "connection attempt failed");
                publisher.connection_lost();
            }
        }

        attempts += 1;
        match policy.next_delay(attempts) {
            Some(delay) => {
                tracing::info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = attempts,
                    "waiting before reconnect"
                );
                publisher.set_state(ChannelState::Reconnecting { attempt: attempts });
                if !reconnect_sleep(delay, &mut commands, &cancel).await {
                    break;
                }
            }
            None => {
                tracing::error!(attempts, "reconnection attempts exhausted, giving up");
                publisher.give_up(attempts);
                return;
            }
        }
    }

    tracing::debug!("channel loop exiting");
}

/// Cancellation-aware connection attempt. Refreshes arriving while the
/// attempt is in flight are dropped, same as during the reconnect delay:
/// the command is valid only against an open connection, never replayed
/// against one that opens later. Returns `None` if teardown interrupted
/// the attempt.
async fn connect_attempt<T: Transport>(
    transport: &T,
    url: &Url,
    commands: &mut mpsc::Receiver<Command>,
    cancel: &CancellationToken,
) -> Option<Result<T::Conn, Error>> {
    let connect = transport.connect(url);
    tokio::pin!(connect);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = &mut connect => return Some(result),
            cmd = commands.recv() => match cmd {
                Some(Command::Refresh) => {
                    tracing::debug!("refresh ignored while connecting");
                }
                // Sender gone: stop polling the closed channel and finish
                // the attempt or get cancelled.
                None => {
                    return tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = &mut connect => Some(result),
                    };
                }
            },
        }
    }
}

/// What ended a single open connection.
enum ReadOutcome {
    /// Teardown requested; the loop must exit without retrying.
    Cancelled,
    /// Connection ended: `None` for a clean close, `Some` for an error.
    /// Both consult the retry policy.
    Lost(Option<Error>),
}

/// Read frames and serve refresh commands until the connection ends.
async fn read_frames<C: Connection>(
    mut conn: C,
    commands: &mut mpsc::Receiver<Command>,
    cancel: &CancellationToken,
    publisher: &mut Publisher,
) -> ReadOutcome {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                conn.close().await;
                return ReadOutcome::Cancelled;
            }
            cmd = commands.recv() => match cmd {
                Some(Command::Refresh) => {
                    if let Err(e) = conn.send(REFRESH_COMMAND).await {
                        tracing::warn!(error = %e, "refresh send failed");
                        return ReadOutcome::Lost(Some(e));
                    }
                    tracing::debug!("refresh requested");
                }
                // Monitor handle dropped; treat like teardown.
                None => {
                    conn.close().await;
                    return ReadOutcome::Cancelled;
                }
            },
            frame = conn.next_frame() => match frame {
                Some(Ok(text)) => publisher.handle_frame(&text),
                Some(Err(e)) => return ReadOutcome::Lost(Some(e)),
                None => return ReadOutcome::Lost(None),
            },
        }
    }
}

/// Cancellation-aware reconnect delay. Commands arriving while waiting are
/// dropped. Returns `false` if teardown interrupted the wait.
async fn reconnect_sleep(
    delay: Duration,
    commands: &mut mpsc::Receiver<Command>,
    cancel: &CancellationToken,
) -> bool {
    let deadline = tokio::time::Instant::now() + delay;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            () = tokio::time::sleep_until(deadline) => return true,
            cmd = commands.recv() => match cmd {
                Some(Command::Refresh) => {
                    tracing::debug!("refresh ignored while reconnecting");
                }
                // Sender gone: stop polling the closed channel and just
                // wait out the delay or the cancellation.
                None => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return false,
                        () = tokio::time::sleep_until(deadline) => return true,
                    }
                }
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
