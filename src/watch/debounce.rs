// src/watch/debounce.rs

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

use crate::types::RelPath;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Wait for the next burst of changes.
///
/// Blocks until one path arrives, then keeps collecting until `window` has
/// passed since that first path. Returns the union, or `None` once the
/// channel is closed and drained.
pub async fn next_batch(
    rx: &mut mpsc::UnboundedReceiver<RelPath>,
    window: Duration,
) -> Option<BTreeSet<RelPath>> {
    let first = rx.recv().await?;
    let deadline = Instant::now() + window;

    let mut batch = BTreeSet::new();
    batch.insert(first);

    loop {
        match timeout_at(deadline, rx.recv()).await {
            Ok(Some(path)) => {
                batch.insert(path);
            }
            Ok(None) | Err(_) => break,
        }
    }

    trace!(paths = batch.len(), "debounced change batch");
    Some(batch)
}

/// Take whatever is already queued without waiting.
pub fn drain_ready(rx: &mut mpsc::UnboundedReceiver<RelPath>) -> BTreeSet<RelPath> {
    let mut batch = BTreeSet::new();
    while let Ok(path) = rx.try_recv() {
        batch.insert(path);
    }
    batch
}
