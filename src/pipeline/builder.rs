// src/pipeline/builder.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::dag::StepGraph;
use crate::errors::{BuildError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::options::PipelineOptions;
use crate::pipeline::BuildPipeline;
use crate::step::TransformStep;
use crate::types::{lint_default_for, SOURCE_INPUT};

/// Assembles a [`BuildPipeline`].
///
/// The step list and all options are fixed by [`build`](Self::build); the
/// resulting pipeline never changes shape.
#[derive(Debug)]
pub struct PipelineBuilder {
    options: PipelineOptions,
    lint: Option<bool>,
    fs: Arc<dyn FileSystem>,
    steps: Vec<TransformStep>,
}

impl PipelineBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            options: PipelineOptions::new(root),
            lint: None,
            fs: Arc::new(RealFileSystem),
            steps: Vec::new(),
        }
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.options.environment = environment.into();
        self
    }

    /// Force lint steps on or off. Without this, lint is enabled in every
    /// environment except `production`.
    pub fn lint(mut self, enabled: bool) -> Self {
        self.lint = Some(enabled);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.output_dir = dir.into();
        self
    }

    pub fn parallelism(mut self, jobs: usize) -> Self {
        self.options.parallelism = jobs.max(1);
        self
    }

    pub fn step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.step_timeout = timeout;
        self
    }

    /// Keep the `count` slowest steps in every report.
    pub fn print_slow_steps(mut self, count: usize) -> Self {
        self.options.slow_steps = Some(count);
        self
    }

    /// Whether successful builds are written to the output directory.
    pub fn publish(mut self, publish: bool) -> Self {
        self.options.publish = publish;
        self
    }

    pub fn filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn step(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = TransformStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Resolve options, drop lint steps if lint is off, and validate the
    /// step graph.
    pub fn build(self) -> Result<BuildPipeline> {
        let mut options = self.options;
        options.lint = self
            .lint
            .unwrap_or_else(|| lint_default_for(&options.environment));
        options.output_dir = absolute(options.output_dir)?;
        let root = absolute(options.root.clone())?;
        if root.starts_with(&options.output_dir) {
            return Err(BuildError::Config(format!(
                "output directory {:?} must not contain the source root {:?}",
                options.output_dir, root
            )));
        }

        let (steps, dropped): (Vec<_>, Vec<_>) = self
            .steps
            .into_iter()
            .partition(|s| options.lint || !s.is_lint());

        if !dropped.is_empty() {
            let dropped: HashSet<&str> = dropped.iter().map(|s| s.name()).collect();
            for step in &steps {
                if let Some(input) = step
                    .declared_inputs()
                    .iter()
                    .find(|i| i.as_str() != SOURCE_INPUT && dropped.contains(i.as_str()))
                {
                    return Err(BuildError::Dependency(format!(
                        "step '{}' depends on lint step '{}', which is disabled in environment '{}'",
                        step.name(),
                        input,
                        options.environment
                    )));
                }
            }
            debug!(dropped = ?dropped, "lint disabled; dropping lint steps");
        }

        let graph = StepGraph::build(&steps)?;

        info!(
            steps = graph.len(),
            environment = %options.environment,
            lint = options.lint,
            parallelism = options.parallelism,
            "pipeline ready"
        );

        Ok(BuildPipeline::new(options, graph, steps, self.fs))
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    std::path::absolute(&path).map_err(|e| BuildError::io(path, e))
}
