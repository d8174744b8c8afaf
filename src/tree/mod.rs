// src/tree/mod.rs

//! In-memory file trees.
//!
//! - [`SourceTree`] is an ordered map from relative path to [`FileEntry`]; it
//!   is the unit of exchange between build steps.
//! - [`scan`] builds trees from disk (through [`FileSystem`](crate::fs::FileSystem)).
//! - [`diff`] compares two trees by content digest.
//! - [`hash`] holds the blake3 helpers.

pub mod diff;
pub mod hash;
pub mod scan;

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;
use std::time::SystemTime;

use crate::types::RelPath;

pub use diff::{diff, TreeDiff};
pub use hash::{digest_bytes, Digest};
pub use scan::{rescan, scan, scan_with, ScanFilter};

/// A single file inside a [`SourceTree`].
///
/// Contents are shared, so cloning an entry (or a whole tree) does not copy
/// file bytes.
#[derive(Debug, Clone)]
pub struct FileEntry {
    digest: Digest,
    size: u64,
    modified: Option<SystemTime>,
    contents: Arc<[u8]>,
}

impl FileEntry {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            digest: digest_bytes(&bytes),
            size: bytes.len() as u64,
            modified: None,
            contents: Arc::from(bytes),
        }
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

/// Content-addressed snapshot of a directory.
///
/// Equality compares paths and digests only; timestamps are ignored since
/// they are unreliable across copies and checkouts.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    entries: BTreeMap<RelPath, FileEntry>,
}

impl SourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the previous entry at that path.
    pub fn insert(&mut self, path: impl Into<RelPath>, entry: FileEntry) -> Option<FileEntry> {
        self.entries.insert(path.into(), entry)
    }

    pub fn insert_bytes(&mut self, path: impl Into<RelPath>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), FileEntry::from_bytes(bytes));
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<FileEntry> {
        self.entries.remove(path)
    }

    /// Remove `prefix` itself and every path below it (`prefix/...`).
    pub fn remove_prefix(&mut self, prefix: &str) {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        self.entries
            .retain(|path, _| path != prefix && !path.starts_with(&dir));
    }

    pub fn iter(&self) -> btree_map::Iter<'_, RelPath, FileEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all file sizes in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(FileEntry::size).sum()
    }

    /// Aggregate digest over every `(path, digest)` pair.
    pub fn digest(&self) -> Digest {
        hash::aggregate_digest(self.entries.iter().map(|(p, e)| (p.as_str(), e.digest())))
    }

    /// Keep only the paths accepted by `keep`.
    pub fn filter(&self, mut keep: impl FnMut(&str) -> bool) -> SourceTree {
        SourceTree {
            entries: self
                .entries
                .iter()
                .filter(|(path, _)| keep(path))
                .map(|(p, e)| (p.clone(), e.clone()))
                .collect(),
        }
    }

    /// Paths below `prefix/`, re-rooted at `prefix`. Other paths are dropped.
    pub fn strip_prefix(&self, prefix: &str) -> SourceTree {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return self.clone();
        }
        let dir = format!("{prefix}/");
        SourceTree {
            entries: self
                .entries
                .iter()
                .filter_map(|(path, entry)| {
                    path.strip_prefix(&dir)
                        .map(|rest| (rest.to_string(), entry.clone()))
                })
                .collect(),
        }
    }

    /// Every path moved below `prefix/`.
    pub fn with_prefix(&self, prefix: &str) -> SourceTree {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return self.clone();
        }
        SourceTree {
            entries: self
                .entries
                .iter()
                .map(|(path, entry)| (format!("{prefix}/{path}"), entry.clone()))
                .collect(),
        }
    }
}

impl PartialEq for SourceTree {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((pa, ea), (pb, eb))| pa == pb && ea.digest() == eb.digest())
    }
}

impl Eq for SourceTree {}

impl FromIterator<(RelPath, FileEntry)> for SourceTree {
    fn from_iter<I: IntoIterator<Item = (RelPath, FileEntry)>>(iter: I) -> Self {
        SourceTree {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SourceTree {
    type Item = (&'a RelPath, &'a FileEntry);
    type IntoIter = btree_map::Iter<'a, RelPath, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
