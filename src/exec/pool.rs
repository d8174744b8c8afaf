// src/exec/pool.rs

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

use crate::exec::runner::StepRun;
use crate::types::StepName;

/// Bounded set of in-flight step workers.
///
/// The pool does not queue: callers check [`is_full`](Self::is_full) before
/// spawning, which keeps dispatch order in the scheduler's hands.
#[derive(Debug)]
pub struct WorkerPool {
    workers: JoinSet<StepRun>,
    limit: usize,
    names: HashMap<Id, StepName>,
    peak: usize,
}

impl WorkerPool {
    pub fn new(limit: usize) -> Self {
        Self {
            workers: JoinSet::new(),
            limit: limit.max(1),
            names: HashMap::new(),
            peak: 0,
        }
    }

    /// Highest number of workers that were in flight at once.
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn is_full(&self) -> bool {
        self.workers.len() >= self.limit
    }

    pub fn spawn<F>(&mut self, step: StepName, work: F)
    where
        F: Future<Output = StepRun> + Send + 'static,
    {
        let handle = self.workers.spawn(work);
        self.names.insert(handle.id(), step.clone());
        self.peak = self.peak.max(self.workers.len());
        debug!(step = %step, in_flight = self.workers.len(), limit = self.limit, "worker spawned");
    }

    /// Wait for the next worker to finish. A panicked or cancelled worker is
    /// reported as a failed run of its step.
    pub async fn join_next(&mut self) -> Option<StepRun> {
        match self.workers.join_next_with_id().await? {
            Ok((id, run)) => {
                self.names.remove(&id);
                Some(run)
            }
            Err(err) => {
                let name = self.names.remove(&err.id()).unwrap_or_default();
                error!(step = %name, error = %err, "step worker did not complete");
                let message = if err.is_panic() {
                    "step worker panicked".to_string()
                } else {
                    "step worker was cancelled".to_string()
                };
                Some(StepRun::lost(name, message))
            }
        }
    }
}
