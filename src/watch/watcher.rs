// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::tree::ScanFilter;
use crate::types::RelPath;
use crate::watch::path_utils::relative_str;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and forward every changed path, relative to
/// `root`, to `changes_tx`.
///
/// Paths rejected by `ignore` (the output directory and publish staging
/// directories) are dropped, so publishing a build never triggers another.
pub fn spawn_fs_watcher(
    root: impl Into<PathBuf>,
    ignore: ScanFilter,
    changes_tx: mpsc::UnboundedSender<RelPath>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // No tracing context on the notify thread.
                    eprintln!("treebuild: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("treebuild: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!("file watcher started on {:?}", root);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            trace!(?event, "received notify event");

            for path in event.paths {
                let Some(rel) = relative_str(&root, &path) else {
                    debug!(path = ?path, "ignoring event outside the watched root");
                    continue;
                };
                if rel.is_empty() || ignore.is_ignored(&rel) {
                    continue;
                }
                if changes_tx.send(rel).is_err() {
                    debug!("change receiver dropped; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
