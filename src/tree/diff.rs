// src/tree/diff.rs

use std::collections::BTreeSet;

use crate::tree::SourceTree;
use crate::types::RelPath;

/// Path-level difference between two trees.
///
/// A path present in both trees is `changed` only when its content digest
/// differs; timestamps are never consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: BTreeSet<RelPath>,
    pub removed: BTreeSet<RelPath>,
    pub changed: BTreeSet<RelPath>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Union of added, removed and changed paths.
    pub fn paths(&self) -> BTreeSet<RelPath> {
        self.added
            .iter()
            .chain(self.removed.iter())
            .chain(self.changed.iter())
            .cloned()
            .collect()
    }
}

/// Compare `previous` against `current`. Pure; performs no IO.
pub fn diff(previous: &SourceTree, current: &SourceTree) -> TreeDiff {
    let mut out = TreeDiff::default();

    for (path, entry) in previous {
        match current.get(path) {
            None => {
                out.removed.insert(path.clone());
            }
            Some(now) if now.digest() != entry.digest() => {
                out.changed.insert(path.clone());
            }
            Some(_) => {}
        }
    }

    for path in current.paths() {
        if !previous.contains(path) {
            out.added.insert(path.to_string());
        }
    }

    out
}
