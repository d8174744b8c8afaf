// src/watch/path_utils.rs

//! Path helpers shared by the scanner and the watcher.

use std::path::{Component, Path};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root` or is not valid
/// UTF-8.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    // Fast path: event path already starts with our root.
    if let Ok(rel) = path.strip_prefix(root) {
        return join_components(rel);
    }

    // Different absolute prefixes may name the same directory
    // (macOS /private/var, symlinked checkouts).
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return join_components(rel);
        }
    }

    None
}

fn join_components(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(name) => parts.push(name.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
