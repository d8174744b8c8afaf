// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildError, Result};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Treebuild.toml";

/// Load a configuration file and deserialize it without semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    parse_str(&contents)
}

/// Deserialize config text.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file and validate it.
///
/// - Reads TOML; unknown fields and step kinds are rejected.
/// - Parses durations and applies defaults.
/// - Checks step names and per-kind required fields.
///
/// Dependency problems (unknown inputs, cycles) are reported later by the
/// step graph, with the same messages as for steps registered in code.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw)?;
    debug!(path = ?path.as_ref(), steps = config.steps.len(), "config loaded");
    Ok(config)
}

/// Directory that relative paths in the config are resolved against.
///
/// For a bare file name (`Treebuild.toml`) this is the working directory.
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
