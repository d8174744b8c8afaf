// src/watch/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

use crate::types::RelPath;

/// Changes that arrive while a build is already in progress.
///
/// Every batch observed during a build is merged into one pending set, so
/// any number of bursts produces exactly one follow-up build covering all of
/// them.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    pending: BTreeSet<RelPath>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, paths: impl IntoIterator<Item = RelPath>) {
        let before = self.pending.len();
        self.pending.extend(paths);
        debug!(
            added = self.pending.len() - before,
            pending = self.pending.len(),
            "queued changes for follow-up build"
        );
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Take the whole pending batch, leaving the queue empty.
    pub fn drain(&mut self) -> Option<BTreeSet<RelPath>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
