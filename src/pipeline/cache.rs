// src/pipeline/cache.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::tree::{Digest, SourceTree};
use crate::types::StepName;

/// Output of a previous successful step run, keyed by the fingerprint of
/// the inputs it ran on.
#[derive(Debug, Clone)]
pub struct CachedOutput {
    pub fingerprint: Digest,
    pub output: Arc<SourceTree>,
}

/// One cache entry. Only the worker running the step writes to it.
pub type CacheSlot = Arc<RwLock<Option<CachedOutput>>>;

/// Per-step output cache shared across builds of one pipeline.
///
/// The set of slots is fixed at construction (one per step); each slot is
/// guarded by its own lock, so steps running concurrently never contend.
#[derive(Debug, Default)]
pub struct StepCache {
    slots: HashMap<StepName, CacheSlot>,
}

impl StepCache {
    pub fn new<'a>(steps: impl IntoIterator<Item = &'a str>) -> Self {
        let slots = steps
            .into_iter()
            .map(|name| (name.to_string(), CacheSlot::default()))
            .collect();
        Self { slots }
    }

    /// Shared handle to the slot of `step`.
    pub fn slot(&self, step: &str) -> Option<CacheSlot> {
        self.slots.get(step).cloned()
    }

    pub async fn get(&self, step: &str) -> Option<CachedOutput> {
        let slot = self.slots.get(step)?;
        slot.read().await.clone()
    }

    /// Forget the output of `step` so no later build can reuse it.
    pub async fn evict(&self, step: &str) {
        if let Some(slot) = self.slots.get(step) {
            *slot.write().await = None;
        }
    }

    /// Drop every cached output.
    pub async fn clear(&self) {
        for slot in self.slots.values() {
            *slot.write().await = None;
        }
        debug!(steps = self.slots.len(), "step cache cleared");
    }

    pub async fn cached_steps(&self) -> usize {
        let mut count = 0;
        for slot in self.slots.values() {
            if slot.read().await.is_some() {
                count += 1;
            }
        }
        count
    }
}
