// src/pipeline/publish.rs

//! Writing the merged tree to the output directory.
//!
//! The tree is written to a staging directory next to the output directory
//! and swapped in with renames, so readers see either the old output or the
//! new one in full.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{BuildError, Result};
use crate::tree::SourceTree;

/// Suffix of the sibling directory a build is staged into.
pub const STAGING_SUFFIX: &str = ".treebuild-staging";
/// Suffix of the sibling directory the previous output is moved to.
pub const OLD_SUFFIX: &str = ".treebuild-old";

/// `<parent>/.<name><suffix>` for the output directory `output`.
pub fn sibling_dir(output: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(output.file_name().unwrap_or_else(|| output.as_os_str()));
    name.push(suffix);
    output.with_file_name(name)
}

/// Replace `output` with exactly the contents of `tree`.
pub fn publish(tree: &SourceTree, output: &Path) -> Result<()> {
    let staging = sibling_dir(output, STAGING_SUFFIX);
    let old = sibling_dir(output, OLD_SUFFIX);

    // Leftovers of an interrupted publish.
    remove_dir_if_exists(&staging)?;
    remove_dir_if_exists(&old)?;

    write_tree(tree, &staging)?;

    let had_output = output.exists();
    if had_output {
        fs::rename(output, &old).map_err(|e| BuildError::io(output, e))?;
    }
    if let Err(e) = fs::rename(&staging, output) {
        if had_output {
            // Put the previous output back before reporting.
            let _ = fs::rename(&old, output);
        }
        return Err(BuildError::io(output, e));
    }
    if had_output {
        remove_dir_if_exists(&old)?;
    }

    info!(output = ?output, files = tree.len(), bytes = tree.total_bytes(), "published output");
    Ok(())
}

fn write_tree(tree: &SourceTree, dir: &Path) -> Result<()> {
    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
    }
    fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;

    for (rel, entry) in tree {
        let path: PathBuf = rel
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(dir.to_path_buf(), |acc, part| acc.join(part));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(&path, entry.contents()).map_err(|e| BuildError::io(&path, e))?;
    }
    debug!(staging = ?dir, files = tree.len(), "staged output");
    Ok(())
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(dir, e)),
    }
}
