// src/tree/scan.rs

//! Building [`SourceTree`]s from a directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::tree::{FileEntry, SourceTree};
use crate::types::RelPath;
use crate::watch::path_utils::relative_str;

/// Relative path prefixes that a scan must skip.
///
/// Used to keep the output directory and staging directories out of the
/// source tree when they live below the source root.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    ignored: Vec<RelPath>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, rel: impl Into<RelPath>) -> Self {
        let rel: RelPath = rel.into();
        let rel = rel.trim_matches('/').to_string();
        if !rel.is_empty() {
            self.ignored.push(rel);
        }
        self
    }

    /// Returns true if `rel` equals an ignored prefix or lies below one.
    pub fn is_ignored(&self, rel: &str) -> bool {
        self.ignored.iter().any(|ig| {
            rel == ig || (rel.starts_with(ig.as_str()) && rel[ig.len()..].starts_with('/'))
        })
    }
}

/// Scan `root` into a [`SourceTree`].
pub fn scan(fs: &dyn FileSystem, root: &Path) -> Result<SourceTree> {
    scan_with(fs, root, &ScanFilter::default())
}

/// Scan `root`, skipping paths rejected by `filter`.
///
/// Symlinked directories are followed. A directory that resolves to one of
/// its own ancestors is a cycle and fails the scan.
pub fn scan_with(fs: &dyn FileSystem, root: &Path, filter: &ScanFilter) -> Result<SourceTree> {
    let mut tree = SourceTree::new();
    let mut chain = Vec::new();
    walk_dir(fs, root, root, &mut chain, filter, &mut tree)?;
    debug!(root = ?root, files = tree.len(), "scanned source tree");
    Ok(tree)
}

/// Apply a set of changed paths to a previous tree.
///
/// Each changed path is dropped from `previous` (together with anything
/// below it) and then re-read from disk if it still exists. Unchanged paths
/// keep their existing entries without touching the filesystem.
pub fn rescan(
    fs: &dyn FileSystem,
    root: &Path,
    previous: &SourceTree,
    changed: &BTreeSet<RelPath>,
    filter: &ScanFilter,
) -> Result<SourceTree> {
    let mut tree = previous.clone();

    for rel in changed {
        if rel.is_empty() || filter.is_ignored(rel) {
            continue;
        }
        tree.remove_prefix(rel);

        let abs = root.join(rel);
        if fs.is_file(&abs) {
            read_file(fs, &abs, rel, &mut tree)?;
        } else if fs.is_dir(&abs) {
            let mut chain = ancestor_chain(fs, root, rel)?;
            walk_dir(fs, root, &abs, &mut chain, filter, &mut tree)?;
        } else {
            trace!(path = %rel, "changed path no longer exists");
        }
    }

    debug!(
        changed = changed.len(),
        files = tree.len(),
        "applied changes to source tree"
    );
    Ok(tree)
}

fn walk_dir(
    fs: &dyn FileSystem,
    root: &Path,
    dir: &Path,
    chain: &mut Vec<PathBuf>,
    filter: &ScanFilter,
    tree: &mut SourceTree,
) -> Result<()> {
    let canonical = fs.canonicalize(dir).map_err(|e| io_error(dir, e))?;
    if chain.contains(&canonical) {
        return Err(BuildError::Scan(format!(
            "symlink cycle detected: {:?} resolves to ancestor directory {:?}",
            dir, canonical
        )));
    }
    chain.push(canonical);

    let mut entries = fs.read_dir(dir).map_err(|e| io_error(dir, e))?;
    entries.sort();

    for path in entries {
        let rel = rel_path(root, &path)?;
        if filter.is_ignored(&rel) {
            trace!(path = %rel, "skipping ignored path");
            continue;
        }

        if fs.is_dir(&path) {
            walk_dir(fs, root, &path, chain, filter, tree)?;
        } else if fs.is_file(&path) {
            read_file(fs, &path, &rel, tree)?;
        } else {
            // Dangling symlink or special file.
            debug!(path = %rel, "skipping entry that is neither file nor directory");
        }
    }

    chain.pop();
    Ok(())
}

fn read_file(fs: &dyn FileSystem, abs: &Path, rel: &str, tree: &mut SourceTree) -> Result<()> {
    let bytes = fs.read(abs).map_err(|e| io_error(abs, e))?;
    let entry = FileEntry::from_bytes(bytes).with_modified(fs.modified(abs));
    tree.insert(rel.to_string(), entry);
    Ok(())
}

/// Canonical paths of `root` and every directory between it and `rel`.
fn ancestor_chain(fs: &dyn FileSystem, root: &Path, rel: &str) -> Result<Vec<PathBuf>> {
    let mut chain = Vec::new();
    let mut current = root.to_path_buf();
    chain.push(fs.canonicalize(&current).map_err(|e| io_error(&current, e))?);

    let parts: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    if let Some((_, parents)) = parts.split_last() {
        for part in parents {
            current = current.join(part);
            chain.push(fs.canonicalize(&current).map_err(|e| io_error(&current, e))?);
        }
    }
    Ok(chain)
}

fn rel_path(root: &Path, path: &Path) -> Result<RelPath> {
    relative_str(root, path).ok_or_else(|| {
        BuildError::Scan(format!(
            "path {:?} is not below the scan root {:?} or is not valid UTF-8",
            path, root
        ))
    })
}

/// Keep the underlying `std::io::Error` when the filesystem layer has one.
fn io_error(path: &Path, err: anyhow::Error) -> BuildError {
    match err.downcast::<std::io::Error>() {
        Ok(source) => BuildError::io(path, source),
        Err(other) => BuildError::Scan(format!("{:?}: {:#}", path, other)),
    }
}
