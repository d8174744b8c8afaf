// src/dag/mod.rs

//! Step graph and per-build scheduling.
//!
//! - [`graph`] validates the step list and holds the DAG (petgraph).
//! - [`scheduler`] is the per-build readiness state machine.
//! - [`state_manager`] applies completions (release / skip dependents).
//! - [`step_state`] defines per-build step states and outcomes.
//! - [`scheduler_step`] is the result type of one scheduler transition.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod step_state;

pub use graph::StepGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use step_state::{StepOutcome, StepRunState};
