// src/dag/scheduler.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::StepGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::step_state::{RunState, StepInfo, StepOutcome, StepRunState};
use crate::types::StepName;

/// Per-build readiness tracker.
///
/// Holds the immutable graph plus a remaining-dependency count per step. A
/// step becomes ready when every dependency finished successfully (built or
/// reused). Ready steps are handed out in topological order, so dispatch is
/// deterministic no matter in which order earlier steps completed.
///
/// The scheduler is pure: it performs no IO and never runs anything itself.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<StepGraph>,
    steps: HashMap<StepName, StepInfo>,
    ready: BTreeSet<(usize, StepName)>,
}

impl Scheduler {
    /// Start a build over every step of `graph`.
    pub fn new(graph: Arc<StepGraph>) -> Self {
        let mut steps = HashMap::with_capacity(graph.len());
        let mut ready = BTreeSet::new();

        for (position, name) in graph.topological_order().iter().enumerate() {
            let remaining = graph.dependencies_of(name).len();
            let state = if remaining == 0 {
                ready.insert((position, name.clone()));
                RunState::Ready
            } else {
                RunState::Pending
            };
            steps.insert(
                name.clone(),
                StepInfo {
                    name: name.clone(),
                    position,
                    remaining,
                    state,
                },
            );
        }

        debug!(steps = steps.len(), ready = ready.len(), "scheduler: starting build");

        Self {
            graph,
            steps,
            ready,
        }
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// The next step that would be dispatched, without dispatching it.
    pub fn peek_ready(&self) -> Option<&str> {
        self.ready.first().map(|(_, name)| name.as_str())
    }

    /// Take the first ready step (topological order) and mark it running.
    pub fn pop_ready(&mut self) -> Option<StepName> {
        let (_, name) = self.ready.pop_first()?;
        if let Some(info) = self.steps.get_mut(&name) {
            info.state = RunState::Running;
        }
        Some(name)
    }

    /// Record the outcome of a step previously returned by
    /// [`pop_ready`](Self::pop_ready).
    ///
    /// Success releases dependents; failure skips every transitive dependent.
    pub fn complete(&mut self, step: &str, outcome: StepOutcome) -> SchedulerStep {
        let mut result = SchedulerStep::default();

        match self.steps.get_mut(step) {
            Some(info) if info.state == RunState::Running => {
                info.state = match outcome {
                    StepOutcome::Succeeded => RunState::Succeeded,
                    StepOutcome::Reused => RunState::Reused,
                    StepOutcome::Failed => RunState::Failed,
                };
            }
            Some(info) => {
                warn!(step = %step, state = ?info.state, "completion for step that is not running; ignoring");
                result.build_finished = self.is_finished();
                return result;
            }
            None => {
                warn!(step = %step, "completion for unknown step; ignoring");
                result.build_finished = self.is_finished();
                return result;
            }
        }

        let graph = Arc::clone(&self.graph);
        let mut manager = StateManager::new(&graph, &mut self.steps);

        if outcome.is_success() {
            for (position, name) in manager.release_dependents(step) {
                result.newly_ready.push(name.clone());
                self.ready.insert((position, name));
            }
        } else {
            result.newly_skipped = manager.mark_dependents_skipped(step);
            if !result.newly_skipped.is_empty() {
                info!(
                    step = %step,
                    skipped = ?result.newly_skipped,
                    "step failed; skipping dependents"
                );
            }
        }

        result.build_finished = self.is_finished();
        result
    }

    /// True once every step is built, reused, failed or skipped.
    pub fn is_finished(&self) -> bool {
        self.steps.values().all(|info| info.state.is_terminal())
    }

    pub fn state_of(&self, step: &str) -> Option<StepRunState> {
        self.steps.get(step).map(|info| StepRunState::from(&info.state))
    }

    /// The failed upstream step that caused `step` to be skipped.
    pub fn blocked_by(&self, step: &str) -> Option<&str> {
        match &self.steps.get(step)?.state {
            RunState::Skipped { upstream } => Some(upstream.as_str()),
            _ => None,
        }
    }
}
