#![allow(dead_code)]

//! Transforms with scripted behaviour for exercising the pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use treebuild::step::TransformFuture;
use treebuild::{SourceTree, StepContext, Transform};

/// Passes its merged inputs through and records every invocation.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransform {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared log of step names, in invocation order.
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl Transform for RecordingTransform {
    fn kind(&self) -> &str {
        "recording"
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(ctx.step().to_string());
            Ok(ctx.merged_inputs())
        })
    }
}

/// Returns the same tree on every call, ignoring its inputs.
#[derive(Debug, Clone)]
pub struct StaticTransform {
    output: SourceTree,
}

impl StaticTransform {
    pub fn new(output: SourceTree) -> Self {
        Self { output }
    }
}

impl Transform for StaticTransform {
    fn kind(&self) -> &str {
        "static"
    }

    fn transform<'a>(&'a self, _ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move { Ok(self.output.clone()) })
    }
}

/// Always fails with `message`.
#[derive(Debug, Clone)]
pub struct FailingTransform {
    message: String,
}

impl FailingTransform {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Transform for FailingTransform {
    fn kind(&self) -> &str {
        "failing"
    }

    fn transform<'a>(&'a self, _ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move { Err(anyhow!("{}", self.message)) })
    }
}

/// Sleeps for `delay`, then passes its inputs through.
#[derive(Debug, Clone)]
pub struct SleepTransform {
    delay: Duration,
}

impl SleepTransform {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Transform for SleepTransform {
    fn kind(&self) -> &str {
        "sleep"
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(ctx.merged_inputs())
        })
    }
}

/// Tracks how many invocations overlap. Share one gauge between steps.
#[derive(Debug, Clone)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
    delay: Duration,
}

impl ConcurrencyGauge {
    pub fn new(delay: Duration) -> Self {
        Self {
            current: Arc::new(AtomicUsize::new(0)),
            max: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    /// Highest number of invocations seen running at once.
    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

impl Transform for ConcurrencyGauge {
    fn kind(&self) -> &str {
        "gauge"
    }

    fn transform<'a>(&'a self, _ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(SourceTree::new())
        })
    }
}
