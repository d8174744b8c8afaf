// src/config/steps.rs

//! Turning validated step definitions into [`TransformStep`]s.

use crate::config::model::{ConfigFile, StepKind, StepSpec};
use crate::errors::{BuildError, Result};
use crate::exec::CommandTransform;
use crate::step::{CopyTransform, InputFilter, LintTransform, TransformStep};

/// Build every configured step, in file order.
pub fn build_steps(cfg: &ConfigFile) -> Result<Vec<TransformStep>> {
    cfg.steps.iter().map(build_step).collect()
}

fn build_step(spec: &StepSpec) -> Result<TransformStep> {
    let cfg = &spec.config;
    let config_err = |e: anyhow::Error| BuildError::Config(format!("step '{}': {e:#}", cfg.name));

    let mut step = match cfg.kind {
        StepKind::Copy => {
            let mut copy = CopyTransform::new();
            if let Some(prefix) = &cfg.strip_prefix {
                copy = copy.strip_prefix(prefix);
            }
            if let Some(dest) = &cfg.dest {
                copy = copy.dest(dest);
            }
            TransformStep::new(&cfg.name, copy)
        }
        StepKind::Command => {
            let cmd = cfg.cmd.clone().unwrap_or_default();
            TransformStep::new(&cfg.name, CommandTransform::new(cmd))
        }
        StepKind::Lint => {
            let lint = LintTransform::new(&cfg.deny).map_err(config_err)?;
            TransformStep::new(&cfg.name, lint)
        }
    };

    let filter = InputFilter::new(cfg.include.clone(), cfg.exclude.clone()).map_err(config_err)?;
    step = step
        .inputs(cfg.inputs.iter().cloned())
        .filter(filter)
        .lint(cfg.is_lint());
    if let Some(timeout) = spec.timeout {
        step = step.timeout(timeout);
    }
    Ok(step)
}
