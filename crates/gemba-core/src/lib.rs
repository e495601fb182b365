// gemba-core: reactive layer between gemba-api and consumers (CLI/dashboards).

pub mod channel;
pub mod config;
pub mod error;
pub mod monitor;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channel::ChannelState;
pub use config::{MonitorConfig, RetryConfig, RetryStrategy};
pub use error::CoreError;
pub use monitor::Monitor;
pub use stream::SnapshotStream;

// Re-export the wire model and production transport for consumers that
// don't need gemba-api directly.
pub use gemba_api::transport::WsTransport;
pub use gemba_api::{
    Alarm, AlarmLevel, AlarmStatus, DataPoint, DecodeError, Device, DeviceStatus, Project,
    Snapshot, TrendPoint,
};
