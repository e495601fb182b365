//! End-to-end tests for the channel state machine and monitor facade,
//! driven by a scripted transport and tokio's paused clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gemba_api::Error;
use gemba_api::transport::{Connection, Transport};
use gemba_core::{ChannelState, Monitor, MonitorConfig, RetryConfig};
use tokio::sync::Notify;

// ── Scripted transport ──────────────────────────────────────────────

/// What a single `connect()` call should do.
enum Outcome {
    /// Connection attempt fails outright.
    Fail,
    /// Connection opens, delivers `frames` in order, then either ends
    /// cleanly or stays open until [`ScriptedTransport::release`].
    Open { frames: Vec<String>, hold_open: bool },
    /// Like `Open`, but the connect call itself blocks until
    /// [`ScriptedTransport::release_connect`].
    GatedOpen { frames: Vec<String>, hold_open: bool },
}

struct ScriptInner {
    outcomes: Mutex<VecDeque<Outcome>>,
    connects: AtomicU32,
    connect_times: Mutex<Vec<tokio::time::Instant>>,
    sent: Mutex<Vec<String>>,
    release: Notify,
    connect_gate: Notify,
}

/// Transport whose connections follow a pre-written script. Once the
/// script runs out, every further attempt fails.
#[derive(Clone)]
struct ScriptedTransport {
    inner: Arc<ScriptInner>,
}

impl ScriptedTransport {
    fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            inner: Arc::new(ScriptInner {
                outcomes: Mutex::new(outcomes.into()),
                connects: AtomicU32::new(0),
                connect_times: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                release: Notify::new(),
                connect_gate: Notify::new(),
            }),
        }
    }

    fn always_failing() -> Self {
        Self::new(Vec::new())
    }

    fn connects(&self) -> u32 {
        self.inner.connects.load(Ordering::SeqCst)
    }

    fn connect_times(&self) -> Vec<tokio::time::Instant> {
        self.inner.connect_times.lock().unwrap().clone()
    }

    fn sent(&self) -> Vec<String> {
        self.inner.sent.lock().unwrap().clone()
    }

    /// Let the currently held-open connection end with a clean close.
    fn release(&self) {
        self.inner.release.notify_one();
    }

    /// Let a gated connect attempt proceed.
    fn release_connect(&self) {
        self.inner.connect_gate.notify_one();
    }
}

impl Transport for ScriptedTransport {
    type Conn = ScriptedConn;

    async fn connect(&self, _url: &url::Url) -> Result<ScriptedConn, Error> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        self.inner
            .connect_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        let outcome = self
            .inner
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Fail);

        match outcome {
            Outcome::Fail => Err(Error::Connect("scripted failure".into())),
            Outcome::Open { frames, hold_open } => Ok(ScriptedConn {
                frames: frames.into(),
                hold_open,
                script: Arc::clone(&self.inner),
            }),
            Outcome::GatedOpen { frames, hold_open } => {
                self.inner.connect_gate.notified().await;
                Ok(ScriptedConn {
                    frames: frames.into(),
                    hold_open,
                    script: Arc::clone(&self.inner),
                })
            }
        }
    }
}

struct ScriptedConn {
    frames: VecDeque<String>,
    hold_open: bool,
    script: Arc<ScriptInner>,
}

impl Connection for ScriptedConn {
    async fn next_frame(&mut self) -> Option<Result<String, Error>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        if self.hold_open {
            self.script.release.notified().await;
        }
        None
    }

    async fn send(&mut self, text: &str) -> Result<(), Error> {
        self.script.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    async fn close(&mut self) {}
}

// ── Helpers ─────────────────────────────────────────────────────────

fn frame(total: u32, device_id: &str, update_time_millis: i64) -> String {
    serde_json::json!({
        "totalDevices": total,
        "onlineDevices": total.saturating_sub(2),
        "offlineDevices": 1,
        "alarmDevices": 1,
        "todayProduction": 850,
        "planProduction": 1000,
        "productionRate": 85.0,
        "equipmentEfficiency": 76.5,
        "qualityRate": 98.2,
        "runningRate": 80.0,
        "projects": [],
        "devices": [{
            "deviceId": device_id,
            "deviceName": "CNC-01",
            "deviceType": "cnc",
            "itemId": "item-1",
            "itemName": "Line A",
            "status": 1
        }],
        "dataPoints": [],
        "productionTrend": [],
        "alarms": [],
        "updateTime": update_time_millis
    })
    .to_string()
}

fn test_config() -> MonitorConfig {
    MonitorConfig {
        url: "http://factory.local".parse().unwrap(),
        ..MonitorConfig::default()
    }
}

fn monitor_with(transport: &ScriptedTransport) -> Monitor<ScriptedTransport> {
    Monitor::new(test_config(), transport.clone()).unwrap()
}

/// Poll `predicate` until it holds or the (auto-advancing) timeout fires.
async fn eventually(mut predicate: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            if predicate() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_for_state(monitor: &Monitor<ScriptedTransport>, wanted: ChannelState) {
    let mut state = monitor.state();
    tokio::time::timeout(Duration::from_secs(120), state.wait_for(|s| *s == wanted))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

// ── Scenario A: valid frame updates the surface ─────────────────────

#[tokio::test(start_paused = true)]
async fn valid_frame_updates_snapshot_and_connected() {
    let transport = ScriptedTransport::new(vec![Outcome::Open {
        frames: vec![frame(10, "dev-1", 1_000)],
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);
    monitor.start();

    let mut snapshot_rx = monitor.snapshot();
    let snapshot = snapshot_rx
        .wait_for(Option::is_some)
        .await
        .unwrap()
        .clone()
        .unwrap();

    assert_eq!(snapshot.total_devices, 10);
    assert_eq!(snapshot.online_devices, 8);
    assert!(monitor.is_connected());
    assert_eq!(monitor.last_error(), None);
    assert_eq!(monitor.current_state(), ChannelState::Open);

    monitor.stop();
}

// ── Scenario B: undecodable frame leaves state untouched ────────────

#[tokio::test(start_paused = true)]
async fn bad_frame_keeps_previous_snapshot_and_connection() {
    let transport = ScriptedTransport::new(vec![Outcome::Open {
        frames: vec![
            frame(10, "dev-1", 1_000),
            "%%% not a snapshot %%%".to_owned(),
        ],
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);
    monitor.start();

    let mut snapshot_rx = monitor.snapshot();
    snapshot_rx.wait_for(Option::is_some).await.unwrap();

    // Give the task time to chew through the garbage frame.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = monitor.current_snapshot().unwrap();
    assert_eq!(snapshot.total_devices, 10);
    assert!(monitor.is_connected());
    assert_eq!(monitor.current_state(), ChannelState::Open);

    monitor.stop();
}

// ── Atomicity: published data is always exactly one frame ───────────

#[tokio::test(start_paused = true)]
async fn snapshot_is_replaced_wholesale_never_merged() {
    let first = frame(10, "dev-1", 1_000);
    let second = frame(3, "dev-2", 2_000);
    let transport = ScriptedTransport::new(vec![Outcome::Open {
        frames: vec![first, second.clone()],
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);
    monitor.start();

    let mut snapshot_rx = monitor.snapshot();
    let published = snapshot_rx
        .wait_for(|s| s.as_ref().is_some_and(|s| s.total_devices == 3))
        .await
        .unwrap()
        .clone()
        .unwrap();

    // The published snapshot equals the second frame's content in full --
    // nothing of the first frame survives.
    let expected = gemba_core::Snapshot::decode(&second).unwrap();
    assert_eq!(*published, expected);
    assert_eq!(published.devices.len(), 1);
    assert_eq!(published.devices[0].device_id, "dev-2");

    monitor.stop();
}

// ── Scenario C: bounded retry ends in Failed ────────────────────────

#[tokio::test(start_paused = true)]
async fn bounded_retry_gives_up_after_ten_attempts() {
    let transport = ScriptedTransport::always_failing();
    let monitor = monitor_with(&transport);
    monitor.start();

    wait_for_state(&monitor, ChannelState::Failed).await;

    assert_eq!(transport.connects(), 10);
    assert!(!monitor.is_connected());
    let error = monitor.last_error().expect("terminal error must be set");
    assert!(error.contains("exhausted"), "{error}");

    // Attempts are separated by at least the configured delay.
    let times = transport.connect_times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(3000));
    }

    // No 11th attempt, even after waiting well past the retry delay.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.connects(), 10);
    assert_eq!(monitor.current_state(), ChannelState::Failed);
}

// ── Reset-on-success: the counter does not carry over ───────────────

#[tokio::test(start_paused = true)]
async fn attempt_counter_resets_on_successful_open() {
    let transport = ScriptedTransport::new(vec![
        Outcome::Fail,
        Outcome::Fail,
        Outcome::Open {
            frames: Vec::new(),
            hold_open: true,
        },
    ]);
    let monitor = monitor_with(&transport);
    monitor.start();

    let mut state = monitor.state();
    state
        .wait_for(|s| *s == ChannelState::Reconnecting { attempt: 2 })
        .await
        .unwrap();

    wait_for_state(&monitor, ChannelState::Open).await;
    assert_eq!(transport.connects(), 3);

    // Server closes the held connection; the very next failure must be
    // counted as attempt 1, not 3.
    transport.release();
    let mut state = monitor.state();
    state
        .wait_for(|s| *s == ChannelState::Reconnecting { attempt: 1 })
        .await
        .unwrap();

    monitor.stop();
}

// ── Idempotent stop ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_quiet_from_any_state() {
    let transport = ScriptedTransport::always_failing();
    let monitor = monitor_with(&transport);

    // Stop while Idle: no transport activity, no panic.
    monitor.stop();
    monitor.stop();
    assert_eq!(transport.connects(), 0);
    assert_eq!(monitor.current_state(), ChannelState::Stopped);

    // Stop after Failed.
    let transport = ScriptedTransport::always_failing();
    let config = MonitorConfig {
        retry: RetryConfig {
            max_attempts: Some(1),
            ..RetryConfig::default()
        },
        ..test_config()
    };
    let monitor = Monitor::new(config, transport.clone()).unwrap();
    monitor.start();
    wait_for_state(&monitor, ChannelState::Failed).await;

    monitor.stop();
    monitor.stop();
    assert_eq!(monitor.current_state(), ChannelState::Stopped);
    assert_eq!(monitor.last_error(), None);
    assert_eq!(transport.connects(), 1);
}

// ── No ghost timers across stop/restart ─────────────────────────────

#[tokio::test(start_paused = true)]
async fn restart_is_isolated_from_previous_lifecycle() {
    let transport = ScriptedTransport::always_failing();
    let monitor = monitor_with(&transport);

    monitor.start();
    let mut state = monitor.state();
    state
        .wait_for(|s| matches!(s, ChannelState::Reconnecting { .. }))
        .await
        .unwrap();

    // Stop mid-delay, then immediately restart.
    monitor.stop();
    assert_eq!(monitor.current_state(), ChannelState::Stopped);
    assert!(monitor.current_snapshot().is_none());
    monitor.start();

    // The new lifecycle progresses with a fresh counter; the old
    // lifecycle's pending reconnect must never surface.
    let mut state = monitor.state();
    state
        .wait_for(|s| *s == ChannelState::Reconnecting { attempt: 1 })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_ne!(monitor.current_state(), ChannelState::Stopped);

    monitor.stop();
}

// ── Start is idempotent ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_while_running_is_a_no_op() {
    let transport = ScriptedTransport::new(vec![Outcome::Open {
        frames: Vec::new(),
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);

    monitor.start();
    wait_for_state(&monitor, ChannelState::Open).await;

    monitor.start();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(transport.connects(), 1);
    assert_eq!(monitor.current_state(), ChannelState::Open);

    monitor.stop();
}

// ── Scenario D: refresh while not open is a silent no-op ────────────

#[tokio::test(start_paused = true)]
async fn refresh_while_disconnected_sends_nothing() {
    let transport = ScriptedTransport::always_failing();
    let monitor = monitor_with(&transport);

    // Not started at all.
    monitor.refresh();
    assert!(transport.sent().is_empty());

    // Started but stuck reconnecting.
    monitor.start();
    let mut state = monitor.state();
    state
        .wait_for(|s| matches!(s, ChannelState::Reconnecting { .. }))
        .await
        .unwrap();
    monitor.refresh();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.sent().is_empty());

    monitor.stop();
}

// ── Refresh during a connect in flight is dropped, not queued ───────

#[tokio::test(start_paused = true)]
async fn refresh_while_connecting_is_dropped_not_queued() {
    let transport = ScriptedTransport::new(vec![Outcome::GatedOpen {
        frames: Vec::new(),
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);
    monitor.start();

    wait_for_state(&monitor, ChannelState::Connecting).await;

    // The connect call is still pending; this refresh must not survive
    // until the connection opens.
    monitor.refresh();
    tokio::time::sleep(Duration::from_millis(50)).await;

    transport.release_connect();
    wait_for_state(&monitor, ChannelState::Open).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.sent().is_empty(), "{:?}", transport.sent());

    // A refresh issued after the open still goes through.
    monitor.refresh();
    let probe = transport.clone();
    eventually(move || probe.sent() == vec!["refresh".to_owned()]).await;

    monitor.stop();
}

// ── Refresh while open sends the literal command ────────────────────

#[tokio::test(start_paused = true)]
async fn refresh_while_open_sends_refresh_command() {
    let transport = ScriptedTransport::new(vec![Outcome::Open {
        frames: Vec::new(),
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);
    monitor.start();
    wait_for_state(&monitor, ChannelState::Open).await;

    monitor.refresh();
    let probe = transport.clone();
    eventually(move || probe.sent() == vec!["refresh".to_owned()]).await;

    monitor.stop();
}

// ── Teardown clears the published snapshot ──────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_clears_snapshot_and_connected() {
    let transport = ScriptedTransport::new(vec![Outcome::Open {
        frames: vec![frame(10, "dev-1", 1_000)],
        hold_open: true,
    }]);
    let monitor = monitor_with(&transport);
    monitor.start();

    let mut snapshot_rx = monitor.snapshot();
    snapshot_rx.wait_for(Option::is_some).await.unwrap();

    monitor.stop();

    assert!(monitor.current_snapshot().is_none());
    assert!(!monitor.is_connected());
    assert_eq!(monitor.current_state(), ChannelState::Stopped);
}
