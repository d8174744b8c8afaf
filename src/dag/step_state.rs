// src/dag/step_state.rs

//! Per-build step state.

use crate::types::StepName;

/// Per-build state of a step (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunState {
    /// Waiting on dependencies.
    Pending,
    /// All dependencies finished; queued for dispatch.
    Ready,
    /// Handed to the pipeline for execution.
    Running,
    Succeeded,
    Reused,
    Failed,
    /// Not run because `upstream` failed.
    Skipped { upstream: StepName },
}

impl RunState {
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Reused | RunState::Failed | RunState::Skipped { .. }
        )
    }
}

/// Public, read-only view of a step's per-build state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRunState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Reused,
    Failed,
    Skipped { upstream: StepName },
}

impl From<&RunState> for StepRunState {
    fn from(state: &RunState) -> Self {
        match state {
            RunState::Pending => StepRunState::Pending,
            RunState::Ready => StepRunState::Ready,
            RunState::Running => StepRunState::Running,
            RunState::Succeeded => StepRunState::Succeeded,
            RunState::Reused => StepRunState::Reused,
            RunState::Failed => StepRunState::Failed,
            RunState::Skipped { upstream } => StepRunState::Skipped {
                upstream: upstream.clone(),
            },
        }
    }
}

/// How a dispatched step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The transform ran and produced an output.
    Succeeded,
    /// A cached output was used instead of running the transform.
    Reused,
    /// The transform failed or timed out.
    Failed,
}

impl StepOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, StepOutcome::Failed)
    }
}

/// Static step data plus per-build counters.
#[derive(Debug, Clone)]
pub(crate) struct StepInfo {
    pub(crate) name: StepName,
    /// Position in the graph's topological order.
    pub(crate) position: usize,
    /// Dependencies that have not finished successfully yet.
    pub(crate) remaining: usize,
    pub(crate) state: RunState,
}
