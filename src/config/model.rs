// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::SOURCE_INPUT;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [build]
/// source = "app"
/// jobs = 4
/// step_timeout = "60s"
/// debounce = "100ms"
///
/// [[step]]
/// name = "assets"
/// kind = "copy"
/// include = ["public/**"]
/// strip_prefix = "public"
///
/// [[step]]
/// name = "no-debugger"
/// kind = "lint"
/// include = ["src/**/*.js"]
/// deny = ["\\bdebugger\\b"]
/// ```
///
/// Steps are kept in file order; that order breaks ties in the build order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: BuildSection,

    /// All `[[step]]` tables, in declaration order.
    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Source root, relative to the directory containing the config file.
    #[serde(default)]
    pub source: Option<String>,

    /// Maximum number of steps running at once.
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Default per-step timeout (e.g. `"60s"`).
    #[serde(default)]
    pub step_timeout: Option<String>,

    /// Watch-mode debounce window (e.g. `"100ms"`).
    #[serde(default)]
    pub debounce: Option<String>,

    /// Force lint steps on or off regardless of environment.
    #[serde(default)]
    pub lint: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Copy matching input files, optionally re-rooted.
    Copy,
    /// Run a shell command over the inputs.
    Command,
    /// Fail on lines matching a `deny` regex; always a lint step.
    Lint,
}

/// One `[[step]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    pub kind: StepKind,

    /// Step names whose outputs this step consumes, or `"source"`.
    #[serde(default = "default_inputs")]
    pub inputs: Vec<String>,

    /// Globs restricting which source files the step receives.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Shell command (`kind = "command"` only).
    #[serde(default)]
    pub cmd: Option<String>,

    /// Regexes that fail the step (`kind = "lint"` only).
    #[serde(default)]
    pub deny: Vec<String>,

    /// Directory prefix removed from input paths (`kind = "copy"` only).
    #[serde(default)]
    pub strip_prefix: Option<String>,

    /// Directory prefix added to output paths (`kind = "copy"` only).
    #[serde(default)]
    pub dest: Option<String>,

    /// Mark the step as a lint step. Implied by `kind = "lint"`.
    #[serde(default)]
    pub lint: Option<bool>,

    /// Per-step timeout (e.g. `"30s"`).
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_inputs() -> Vec<String> {
    vec![SOURCE_INPUT.to_string()]
}

impl StepConfig {
    pub fn is_lint(&self) -> bool {
        self.kind == StepKind::Lint || self.lint.unwrap_or(false)
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub build: BuildSettings,
    pub steps: Vec<StepSpec>,
}

/// `[build]` with durations parsed and defaults applied.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub source: PathBuf,
    pub jobs: Option<usize>,
    pub step_timeout: Option<Duration>,
    pub debounce: Duration,
    pub lint: Option<bool>,
}

/// A validated step definition.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub config: StepConfig,
    pub timeout: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(build: BuildSettings, steps: Vec<StepSpec>) -> Self {
        Self { build, steps }
    }

    /// Resolve the source root against the directory holding the config.
    pub fn source_root(&self, config_dir: &std::path::Path) -> PathBuf {
        if self.build.source.is_absolute() {
            self.build.source.clone()
        } else {
            config_dir.join(&self.build.source)
        }
    }
}
