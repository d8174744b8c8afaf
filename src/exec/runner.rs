// src/exec/runner.rs

//! Runs one step invocation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dag::StepOutcome;
use crate::errors::BuildError;
use crate::pipeline::cache::{CacheSlot, CachedOutput};
use crate::step::{StepContext, TransformStep};
use crate::tree::{Digest, SourceTree};
use crate::types::StepName;

/// Result of running (or attempting to run) one step.
#[derive(Debug)]
pub struct StepRun {
    pub name: StepName,
    pub outcome: StepOutcome,
    pub duration: Duration,
    pub output: Option<Arc<SourceTree>>,
    pub error: Option<BuildError>,
    pub input_files: usize,
    pub input_bytes: u64,
}

impl StepRun {
    /// Failure record for a step whose worker never reported back.
    pub fn lost(name: StepName, message: impl Into<String>) -> Self {
        Self {
            error: Some(BuildError::StepExecution {
                step: name.clone(),
                message: message.into(),
            }),
            name,
            outcome: StepOutcome::Failed,
            duration: Duration::ZERO,
            output: None,
            input_files: 0,
            input_bytes: 0,
        }
    }
}

/// Run `step` over `ctx`, bounded by `timeout`.
///
/// On success the output is stored in `slot` under `fingerprint`; on failure
/// the slot is cleared so a later incremental build cannot reuse a stale
/// output.
pub async fn run_step(
    step: TransformStep,
    ctx: StepContext,
    timeout: Option<Duration>,
    slot: Option<CacheSlot>,
    fingerprint: Digest,
) -> StepRun {
    let name = step.name().to_string();
    let input_files = ctx.input_files();
    let input_bytes = ctx.input_bytes();

    debug!(step = %name, kind = step.kind(), input_files, input_bytes, "running step");

    let started = Instant::now();
    let work = step.transformer().transform(&ctx);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(res) => res.map_err(|e| BuildError::StepExecution {
                step: name.clone(),
                message: format!("{e:#}"),
            }),
            Err(_) => Err(BuildError::Timeout {
                step: name.clone(),
                after: limit,
            }),
        },
        None => work.await.map_err(|e| BuildError::StepExecution {
            step: name.clone(),
            message: format!("{e:#}"),
        }),
    };
    let duration = started.elapsed();

    match result {
        Ok(tree) => {
            let output = Arc::new(tree);
            if let Some(slot) = slot {
                *slot.write_owned().await = Some(CachedOutput {
                    fingerprint,
                    output: Arc::clone(&output),
                });
            }
            info!(
                step = %name,
                elapsed_ms = duration.as_millis() as u64,
                output_files = output.len(),
                "step built"
            );
            StepRun {
                name,
                outcome: StepOutcome::Succeeded,
                duration,
                output: Some(output),
                error: None,
                input_files,
                input_bytes,
            }
        }
        Err(err) => {
            if let Some(slot) = slot {
                *slot.write_owned().await = None;
            }
            warn!(step = %name, error = %err, "step failed");
            StepRun {
                name,
                outcome: StepOutcome::Failed,
                duration,
                output: None,
                error: Some(err),
                input_files,
                input_bytes,
            }
        }
    }
}
