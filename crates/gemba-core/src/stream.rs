// ── Reactive snapshot stream ──
//
// `Stream` adapter over the snapshot watch cell, for consumers that
// prefer `StreamExt` combinators over polling `watch::Receiver`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use gemba_api::snapshot::Snapshot;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// `Stream` adapter backed by the monitor's snapshot cell.
///
/// Yields the current value on first poll, then a new item each time the
/// published snapshot is replaced (including the reset to `None` on
/// stop/restart).
pub struct SnapshotStream {
    inner: WatchStream<Option<Arc<Snapshot>>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Option<Arc<Snapshot>>>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for SnapshotStream {
    type Item = Option<Arc<Snapshot>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin for Unpin items; Option<Arc<_>> always is.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
