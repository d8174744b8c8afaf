// src/config/validate.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{BuildSettings, ConfigFile, RawConfigFile, StepConfig, StepKind, StepSpec};
use crate::errors::{BuildError, Result};
use crate::types::SOURCE_INPUT;
use crate::watch::debounce::DEFAULT_DEBOUNCE;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_steps(&raw)?;
        let build = validate_build_section(&raw)?;
        validate_step_names(&raw)?;

        let steps = raw
            .step
            .into_iter()
            .map(validate_step)
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigFile::new_unchecked(build, steps))
    }
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.step.is_empty() {
        return Err(BuildError::Config(
            "config must contain at least one [[step]] table".to_string(),
        ));
    }
    Ok(())
}

fn validate_build_section(cfg: &RawConfigFile) -> Result<BuildSettings> {
    let build = &cfg.build;

    if build.jobs == Some(0) {
        return Err(BuildError::Config(
            "[build].jobs must be >= 1 (got 0)".to_string(),
        ));
    }

    let step_timeout = build
        .step_timeout
        .as_deref()
        .map(|s| parse_duration(s).map_err(|e| BuildError::Config(format!("[build].step_timeout: {e}"))))
        .transpose()?;

    let debounce = build
        .debounce
        .as_deref()
        .map(|s| parse_duration(s).map_err(|e| BuildError::Config(format!("[build].debounce: {e}"))))
        .transpose()?
        .unwrap_or(DEFAULT_DEBOUNCE);

    Ok(BuildSettings {
        source: PathBuf::from(build.source.as_deref().unwrap_or(".")),
        jobs: build.jobs,
        step_timeout,
        debounce,
        lint: build.lint,
    })
}

fn validate_step_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for step in &cfg.step {
        if step.name.trim().is_empty() {
            return Err(BuildError::Config("step names must not be empty".to_string()));
        }
        if step.name == SOURCE_INPUT {
            return Err(BuildError::Config(format!(
                "'{SOURCE_INPUT}' is reserved and cannot name a step"
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(BuildError::Config(format!(
                "step '{}' is defined more than once",
                step.name
            )));
        }
    }
    Ok(())
}

fn validate_step(step: StepConfig) -> Result<StepSpec> {
    let name = &step.name;

    match step.kind {
        StepKind::Command => {
            if step.cmd.as_deref().is_none_or(|c| c.trim().is_empty()) {
                return Err(BuildError::Config(format!(
                    "step '{name}': kind \"command\" requires a non-empty `cmd`"
                )));
            }
        }
        StepKind::Lint => {
            if step.deny.is_empty() {
                return Err(BuildError::Config(format!(
                    "step '{name}': kind \"lint\" requires at least one `deny` pattern"
                )));
            }
            if step.lint == Some(false) {
                return Err(BuildError::Config(format!(
                    "step '{name}': kind \"lint\" cannot set `lint = false`"
                )));
            }
        }
        StepKind::Copy => {}
    }

    if step.kind != StepKind::Command && step.cmd.is_some() {
        return Err(BuildError::Config(format!(
            "step '{name}': `cmd` is only valid for kind \"command\""
        )));
    }
    if step.kind != StepKind::Lint && !step.deny.is_empty() {
        return Err(BuildError::Config(format!(
            "step '{name}': `deny` is only valid for kind \"lint\""
        )));
    }
    if step.kind != StepKind::Copy && (step.strip_prefix.is_some() || step.dest.is_some()) {
        return Err(BuildError::Config(format!(
            "step '{name}': `strip_prefix` and `dest` are only valid for kind \"copy\""
        )));
    }

    let timeout = step
        .timeout
        .as_deref()
        .map(|s| parse_duration(s).map_err(|e| BuildError::Config(format!("step '{name}': timeout: {e}"))))
        .transpose()?;

    Ok(StepSpec {
        config: step,
        timeout,
    })
}

/// Parse `"250ms"`, `"3s"`, `"1m"` or `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
