// src/dag/scheduler_step.rs

//! Result type for a single scheduler transition.

use crate::types::StepName;

/// What changed when a step completed.
///
/// Tests step the scheduler by hand and assert on these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Steps whose last outstanding dependency just finished.
    pub newly_ready: Vec<StepName>,
    /// Transitive dependents of a failed step, in topological order.
    pub newly_skipped: Vec<StepName>,
    /// Whether every step is now in a terminal state.
    pub build_finished: bool,
}
