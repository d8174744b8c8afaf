// src/exec/mod.rs

//! Step execution layer.
//!
//! - [`runner`] runs one step under its timeout and records the output in
//!   the step cache.
//! - [`pool`] bounds how many step workers are in flight.
//! - [`command`] is the process-backed transform (`kind = "command"`).

pub mod command;
pub mod pool;
pub mod runner;

pub use command::CommandTransform;
pub use pool::WorkerPool;
pub use runner::{run_step, StepRun};
