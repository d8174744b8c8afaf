// src/report.rs

//! The result of one build attempt.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::BuildError;
use crate::tree::SourceTree;
use crate::types::{BuildMode, RelPath, StepName};

/// Final status of one step in a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The transform ran and succeeded.
    Built,
    /// A cached output was used.
    Reused,
    Failed(String),
    TimedOut(Duration),
    /// Not run because `upstream` failed.
    Skipped { upstream: StepName },
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Built | StepStatus::Reused)
    }

    fn label(&self) -> &'static str {
        match self {
            StepStatus::Built => "built",
            StepStatus::Reused => "reused",
            StepStatus::Failed(_) => "failed",
            StepStatus::TimedOut(_) => "timed out",
            StepStatus::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: StepName,
    pub status: StepStatus,
    pub duration: Duration,
    pub input_files: usize,
    pub input_bytes: u64,
    pub output_files: usize,
    pub output_bytes: u64,
}

/// Wall-clock time of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTiming {
    pub name: StepName,
    pub duration: Duration,
}

/// Outcome of a single build.
///
/// `entries` follow the graph's topological order regardless of the order
/// in which steps finished.
#[derive(Debug)]
pub struct BuildReport {
    pub(crate) run_id: u64,
    pub(crate) mode: BuildMode,
    pub(crate) environment: String,
    pub(crate) errors: Vec<BuildError>,
    pub(crate) entries: Vec<StepReport>,
    pub(crate) affected: BTreeSet<StepName>,
    pub(crate) changed: BTreeSet<RelPath>,
    pub(crate) slowest: Vec<StepTiming>,
    pub(crate) merged: Option<Arc<SourceTree>>,
    pub(crate) published: bool,
    pub(crate) duration: Duration,
}

impl BuildReport {
    pub(crate) fn new(run_id: u64, mode: BuildMode, environment: &str) -> Self {
        Self {
            run_id,
            mode,
            environment: environment.to_string(),
            errors: Vec::new(),
            entries: Vec::new(),
            affected: BTreeSet::new(),
            changed: BTreeSet::new(),
            slowest: Vec::new(),
            merged: None,
            published: false,
            duration: Duration::ZERO,
        }
    }

    /// True when no error of any kind was recorded.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.entries.iter().all(|e| e.status.is_success())
    }

    /// Monotonic build counter of the pipeline that produced this report.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn errors(&self) -> &[BuildError] {
        &self.errors
    }

    pub fn entries(&self) -> &[StepReport] {
        &self.entries
    }

    pub fn entry(&self, step: &str) -> Option<&StepReport> {
        self.entries.iter().find(|e| e.name == step)
    }

    /// Steps selected for re-evaluation in this build.
    pub fn affected(&self) -> &BTreeSet<StepName> {
        &self.affected
    }

    /// Source paths that differed from the previous build's tree.
    pub fn changed_paths(&self) -> &BTreeSet<RelPath> {
        &self.changed
    }

    /// Slowest executed steps, longest first. Empty unless diagnostics were
    /// requested.
    pub fn slowest(&self) -> &[StepTiming] {
        &self.slowest
    }

    /// Union of the successful leaf outputs.
    pub fn merged(&self) -> Option<&Arc<SourceTree>> {
        self.merged.as_ref()
    }

    /// Whether the output directory was replaced by this build.
    pub fn published(&self) -> bool {
        self.published
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Names of steps that failed or timed out (not skipped ones).
    pub fn failed_steps(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, StepStatus::Failed(_) | StepStatus::TimedOut(_)))
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn skipped_steps(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, StepStatus::Skipped { .. }))
            .map(|e| e.name.as_str())
            .collect()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.success() { "succeeded" } else { "FAILED" };
        writeln!(
            f,
            "build #{} ({}, {}) {} in {:.2?}",
            self.run_id, self.mode, self.environment, verdict, self.duration
        )?;

        for entry in &self.entries {
            write!(f, "  {:<24} {:<10}", entry.name, entry.status.label())?;
            match &entry.status {
                StepStatus::Built => writeln!(
                    f,
                    " {:>8}  {} -> {} files",
                    format!("{:.2?}", entry.duration),
                    entry.input_files,
                    entry.output_files
                )?,
                StepStatus::Reused => writeln!(f, " {:>8}  {} files", "-", entry.output_files)?,
                StepStatus::Failed(msg) => {
                    writeln!(f, " {:>8}", format!("{:.2?}", entry.duration))?;
                    for line in msg.lines() {
                        writeln!(f, "      {line}")?;
                    }
                }
                StepStatus::TimedOut(after) => writeln!(f, " after {after:?}")?,
                StepStatus::Skipped { upstream } => writeln!(f, " (upstream '{upstream}' failed)")?,
            }
        }

        // Step failures are already listed per entry.
        let other: Vec<&BuildError> = self.errors.iter().filter(|e| e.step().is_none()).collect();
        if !other.is_empty() {
            writeln!(f, "errors:")?;
            for err in other {
                writeln!(f, "  {err}")?;
            }
        }

        if !self.slowest.is_empty() {
            writeln!(f, "slowest steps:")?;
            for (rank, timing) in self.slowest.iter().enumerate() {
                writeln!(f, "  {:>2}. {:<24} {:.2?}", rank + 1, timing.name, timing.duration)?;
            }
        }

        if let Some(merged) = &self.merged {
            write!(
                f,
                "output: {} files, {} bytes",
                merged.len(),
                merged.total_bytes()
            )?;
            if self.published {
                write!(f, " (published)")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
