// gemba-api: wire model and WebSocket transport for the monitoring channel.

pub mod error;
pub mod retry;
pub mod snapshot;
pub mod transport;

pub use error::Error;
pub use retry::{ExponentialBackoff, FixedDelay, RetryPolicy};
pub use snapshot::{
    Alarm, AlarmLevel, AlarmStatus, DataPoint, DecodeError, Device, DeviceStatus, Project,
    Snapshot, TrendPoint,
};
pub use transport::{Connection, Transport, WsTransport, monitor_url};

/// The only outbound application message: asks the server to push a fresh
/// snapshot out of band.
pub const REFRESH_COMMAND: &str = "refresh";
