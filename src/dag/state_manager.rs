// src/dag/state_manager.rs

//! Per-build state transitions for steps in the scheduler.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::dag::graph::StepGraph;
use crate::dag::step_state::{RunState, StepInfo};
use crate::types::StepName;

/// Applies completion results to the step map.
pub(crate) struct StateManager<'a> {
    graph: &'a StepGraph,
    steps: &'a mut HashMap<StepName, StepInfo>,
}

impl<'a> StateManager<'a> {
    pub(crate) fn new(graph: &'a StepGraph, steps: &'a mut HashMap<StepName, StepInfo>) -> Self {
        Self { graph, steps }
    }

    /// Decrement the outstanding dependency count of every direct dependent
    /// of `done`. Returns the dependents that reached zero, marked `Ready`.
    pub(crate) fn release_dependents(&mut self, done: &str) -> Vec<(usize, StepName)> {
        let mut ready = Vec::new();

        for dependent in self.graph.dependents_of(done) {
            let Some(info) = self.steps.get_mut(dependent) else {
                warn!(step = %dependent, "dependent missing from step map");
                continue;
            };
            if info.state != RunState::Pending {
                continue;
            }
            info.remaining = info.remaining.saturating_sub(1);
            if info.remaining == 0 {
                debug!(step = %info.name, "dependencies satisfied; marking Ready");
                info.state = RunState::Ready;
                ready.push((info.position, info.name.clone()));
            }
        }

        ready.sort();
        ready
    }

    /// Mark every non-terminal transitive dependent of `failed` as skipped.
    ///
    /// Returns the newly skipped steps in topological order. A step already
    /// skipped by an earlier failure keeps its original upstream.
    pub(crate) fn mark_dependents_skipped(&mut self, failed: &str) -> Vec<StepName> {
        let mut newly: BTreeSet<(usize, StepName)> = BTreeSet::new();

        for name in self.graph.transitive_dependents(failed) {
            let Some(info) = self.steps.get_mut(&name) else {
                continue;
            };
            match info.state {
                RunState::Pending | RunState::Ready => {
                    debug!(
                        step = %info.name,
                        upstream = %failed,
                        "skipping dependent due to upstream failure"
                    );
                    info.state = RunState::Skipped {
                        upstream: failed.to_string(),
                    };
                    newly.insert((info.position, info.name.clone()));
                }
                _ => {}
            }
        }

        newly.into_iter().map(|(_, name)| name).collect()
    }
}
