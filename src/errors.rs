// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Construction-time problems (`Dependency`, `Config`, `Toml`) are returned
//! before any build starts. Everything that can go wrong during a build is
//! collected into the [`BuildReport`](crate::report::BuildReport) instead of
//! being thrown.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::StepName;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Step '{step}' failed: {message}")]
    StepExecution { step: StepName, message: String },

    #[error("Merge conflict on '{path}': produced by both '{first}' and '{second}'")]
    MergeConflict {
        path: String,
        first: StepName,
        second: StepName,
    },

    #[error("Step '{step}' timed out after {after:?}")]
    Timeout { step: StepName, after: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Convenience constructor for IO failures tied to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Name of the step this error belongs to, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            BuildError::StepExecution { step, .. } | BuildError::Timeout { step, .. } => {
                Some(step.as_str())
            }
            _ => None,
        }
    }

    /// Scan and file IO failures.
    pub fn is_io(&self) -> bool {
        matches!(self, BuildError::Io { .. } | BuildError::Scan(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
