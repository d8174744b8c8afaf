// src/pipeline/options.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::types::lint_default_for;

/// Default number of steps in flight.
pub const DEFAULT_PARALLELISM: usize = 4;
/// Default per-step timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(600);
/// Default environment name.
pub const DEFAULT_ENVIRONMENT: &str = "development";
/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Settings resolved once when the pipeline is built.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Source root.
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub environment: String,
    /// Whether lint steps are part of the graph.
    pub lint: bool,
    /// Maximum number of steps running at once.
    pub parallelism: usize,
    /// Timeout for steps without their own; `None` disables it.
    pub step_timeout: Option<Duration>,
    /// Number of slowest steps to put in each report; `None` disables the
    /// diagnostic.
    pub slow_steps: Option<usize>,
    /// Write the merged tree to `output_dir` after a successful build.
    pub publish: bool,
}

impl PipelineOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            lint: lint_default_for(DEFAULT_ENVIRONMENT),
            parallelism: DEFAULT_PARALLELISM,
            step_timeout: Some(DEFAULT_STEP_TIMEOUT),
            slow_steps: None,
            publish: true,
        }
    }
}
