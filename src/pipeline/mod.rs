// src/pipeline/mod.rs

//! One build, end to end.
//!
//! [`BuildPipeline::run`] obtains the source tree (full scan or rescan of
//! changed paths), works out which steps are affected, dispatches ready
//! steps to a bounded worker pool in topological order, merges the leaf
//! outputs and publishes them when everything succeeded. Errors never abort
//! the run; they end up in the [`BuildReport`].

pub mod builder;
pub mod cache;
pub mod merge;
pub mod options;
pub mod publish;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::dag::{Scheduler, StepGraph, StepOutcome};
use crate::errors::{BuildError, Result};
use crate::exec::{run_step, StepRun, WorkerPool};
use crate::fs::FileSystem;
use crate::report::{BuildReport, StepReport, StepStatus, StepTiming};
use crate::step::{StepContext, TransformStep};
use crate::tree::{diff, rescan, scan_with, Digest, ScanFilter, SourceTree};
use crate::types::{BuildMode, RelPath, StepName, SOURCE_INPUT};
use crate::watch::path_utils::relative_str;

pub use builder::PipelineBuilder;
pub use cache::{CachedOutput, StepCache};
pub use merge::merge_leaves;
pub use options::PipelineOptions;

/// A validated step graph plus everything needed to build it repeatedly.
#[derive(Debug)]
pub struct BuildPipeline {
    options: PipelineOptions,
    graph: Arc<StepGraph>,
    steps: HashMap<StepName, TransformStep>,
    fs: Arc<dyn FileSystem>,
    cache: StepCache,
    scan_filter: ScanFilter,
    last_tree: Option<Arc<SourceTree>>,
    /// Set when a scan failed: the changes of that batch never reached
    /// `last_tree`, so the next rescan has to read the whole root.
    needs_full_scan: bool,
    published_digest: Option<Digest>,
    run_counter: u64,
}

impl BuildPipeline {
    pub fn builder(root: impl Into<PathBuf>) -> PipelineBuilder {
        PipelineBuilder::new(root)
    }

    pub(crate) fn new(
        options: PipelineOptions,
        graph: StepGraph,
        steps: Vec<TransformStep>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let cache = StepCache::new(graph.steps());
        let scan_filter = output_scan_filter(&options.root, &options.output_dir);
        let steps = steps
            .into_iter()
            .map(|s| (s.name().to_string(), s))
            .collect();

        Self {
            options,
            graph: Arc::new(graph),
            steps,
            fs,
            cache,
            scan_filter,
            last_tree: None,
            needs_full_scan: false,
            published_digest: None,
            run_counter: 0,
        }
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// A registered step by name.
    pub fn step(&self, name: &str) -> Option<&TransformStep> {
        self.steps.get(name)
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn cache(&self) -> &StepCache {
        &self.cache
    }

    /// Paths a scan of the source root skips (output and staging dirs).
    pub fn scan_filter(&self) -> &ScanFilter {
        &self.scan_filter
    }

    /// Source tree of the most recent successful scan.
    pub fn source_tree(&self) -> Option<&Arc<SourceTree>> {
        self.last_tree.as_ref()
    }

    /// Scan the whole source root.
    pub async fn scan(&self) -> Result<SourceTree> {
        let fs = Arc::clone(&self.fs);
        let root = self.options.root.clone();
        let filter = self.scan_filter.clone();
        tokio::task::spawn_blocking(move || scan_with(fs.as_ref(), &root, &filter))
            .await
            .map_err(|e| BuildError::Scan(format!("scan task failed: {e}")))?
    }

    /// Re-read `changed` on top of the last scanned tree. Without a previous
    /// tree, or after a failed scan, this is a full scan.
    pub async fn rescan(&self, changed: &BTreeSet<RelPath>) -> Result<SourceTree> {
        let previous = match &self.last_tree {
            Some(tree) if !self.needs_full_scan => Arc::clone(tree),
            _ => return self.scan().await,
        };
        let fs = Arc::clone(&self.fs);
        let root = self.options.root.clone();
        let filter = self.scan_filter.clone();
        let changed = changed.clone();
        tokio::task::spawn_blocking(move || {
            rescan(fs.as_ref(), &root, &previous, &changed, &filter)
        })
        .await
        .map_err(|e| BuildError::Scan(format!("rescan task failed: {e}")))?
    }

    /// Drop every cached step output.
    pub async fn invalidate_cache(&self) {
        self.cache.clear().await;
    }

    /// Run one build.
    ///
    /// `changed` lists source paths reported by a watcher. In incremental
    /// mode only those paths are re-read; without them (or without a
    /// previous tree) the whole root is scanned. Full mode always scans and
    /// ignores cached outputs.
    pub async fn run(&mut self, mode: BuildMode, changed: Option<&BTreeSet<RelPath>>) -> BuildReport {
        let started = Instant::now();
        let mode = self.effective_mode(mode);

        let scanned = match (mode, changed) {
            (BuildMode::Incremental, Some(paths)) => self.rescan(paths).await,
            _ => self.scan().await,
        };

        match scanned {
            Ok(tree) => self.execute(mode, Arc::new(tree), started).await,
            Err(err) => self.scan_failure_report(mode, err, started),
        }
    }

    /// Report for a build that never got past obtaining the source tree.
    pub(crate) fn scan_failure_report(
        &mut self,
        mode: BuildMode,
        err: BuildError,
        started: Instant,
    ) -> BuildReport {
        let run_id = self.next_run_id();
        self.needs_full_scan = true;
        warn!(run_id, error = %err, "source scan failed");
        let mut report = BuildReport::new(run_id, mode, &self.options.environment);
        report.errors.push(err);
        report.duration = started.elapsed();
        report
    }

    /// Run one build over an already materialised source tree.
    pub async fn run_on(&mut self, mode: BuildMode, tree: SourceTree) -> BuildReport {
        let started = Instant::now();
        let mode = self.effective_mode(mode);
        self.execute(mode, Arc::new(tree), started).await
    }

    fn effective_mode(&self, mode: BuildMode) -> BuildMode {
        if mode == BuildMode::Incremental && self.last_tree.is_none() {
            debug!("no previous tree; running a full build");
            BuildMode::Full
        } else {
            mode
        }
    }

    fn next_run_id(&mut self) -> u64 {
        self.run_counter += 1;
        self.run_counter
    }

    async fn execute(&mut self, mode: BuildMode, tree: Arc<SourceTree>, started: Instant) -> BuildReport {
        let run_id = self.next_run_id();
        let mut report = BuildReport::new(run_id, mode, &self.options.environment);

        let previous = self.last_tree.replace(Arc::clone(&tree));
        self.needs_full_scan = false;
        report.changed = match &previous {
            Some(prev) => diff(prev, &tree).paths(),
            None => tree.paths().map(str::to_string).collect(),
        };
        report.affected = match mode {
            BuildMode::Full => self.graph.steps().map(str::to_string).collect(),
            BuildMode::Incremental => self.graph.affected_by(&report.changed),
        };

        info!(
            run_id,
            %mode,
            files = tree.len(),
            changed = report.changed.len(),
            affected = report.affected.len(),
            "build started"
        );

        let mut scheduler = Scheduler::new(Arc::clone(&self.graph));
        let mut pool = WorkerPool::new(self.options.parallelism);
        let mut outputs: HashMap<StepName, Arc<SourceTree>> = HashMap::new();
        let mut finished: HashMap<StepName, StepRun> = HashMap::new();

        loop {
            while !pool.is_full() {
                let Some(name) = scheduler.pop_ready() else {
                    break;
                };
                let Some(step) = self.steps.get(&name) else {
                    warn!(step = %name, "scheduled step is not registered");
                    scheduler.complete(&name, StepOutcome::Failed);
                    continue;
                };

                let ctx = self.context_for(step, &tree, &outputs);
                let fingerprint = ctx.fingerprint();

                if mode == BuildMode::Incremental {
                    if let Some(cached) = self.cache.get(&name).await {
                        let unaffected = !report.affected.contains(&name);
                        if unaffected || cached.fingerprint == fingerprint {
                            debug!(step = %name, unaffected, "reusing cached output");
                            outputs.insert(name.clone(), Arc::clone(&cached.output));
                            finished.insert(name.clone(), reused_run(&name, &ctx, cached.output));
                            scheduler.complete(&name, StepOutcome::Reused);
                            continue;
                        }
                    }
                }

                let timeout = step.step_timeout().or(self.options.step_timeout);
                pool.spawn(
                    name.clone(),
                    run_step(step.clone(), ctx, timeout, self.cache.slot(&name), fingerprint),
                );
            }

            let Some(run) = pool.join_next().await else {
                break;
            };
            if let Some(output) = &run.output {
                outputs.insert(run.name.clone(), Arc::clone(output));
            }
            // Covers workers that panicked before clearing their own slot.
            if run.outcome == StepOutcome::Failed {
                self.cache.evict(&run.name).await;
            }
            scheduler.complete(&run.name, run.outcome);
            finished.insert(run.name.clone(), run);
        }

        debug!(run_id, peak_in_flight = pool.peak(), "all steps settled");

        // Report entries and errors in topological order.
        let mut timings = Vec::new();
        for name in self.graph.topological_order() {
            if let Some(run) = finished.remove(name) {
                if run.outcome != StepOutcome::Reused {
                    timings.push(StepTiming {
                        name: name.clone(),
                        duration: run.duration,
                    });
                }
                report.entries.push(step_report(&run));
                if let Some(err) = run.error {
                    report.errors.push(err);
                }
            } else if let Some(upstream) = scheduler.blocked_by(name) {
                self.cache.evict(name).await;
                report.entries.push(StepReport {
                    name: name.clone(),
                    status: StepStatus::Skipped {
                        upstream: upstream.to_string(),
                    },
                    duration: Default::default(),
                    input_files: 0,
                    input_bytes: 0,
                    output_files: 0,
                    output_bytes: 0,
                });
            }
        }

        if let Some(count) = self.options.slow_steps {
            timings.sort_by(|a, b| b.duration.cmp(&a.duration).then_with(|| a.name.cmp(&b.name)));
            timings.truncate(count);
            report.slowest = timings;
        }

        let leaves: Vec<(StepName, Arc<SourceTree>)> = self
            .graph
            .leaves()
            .into_iter()
            .filter_map(|leaf| outputs.get(leaf).map(|out| (leaf.to_string(), Arc::clone(out))))
            .collect();
        match merge_leaves(&leaves) {
            Ok(merged) => report.merged = Some(Arc::new(merged)),
            Err(err) => {
                warn!(run_id, error = %err, "merging leaf outputs failed");
                report.errors.push(err);
            }
        }

        if self.options.publish && report.success() {
            if let Some(merged) = report.merged.clone() {
                match self.publish(merged).await {
                    Ok(published) => report.published = published,
                    Err(err) => report.errors.push(err),
                }
            }
        }

        report.duration = started.elapsed();
        info!(
            run_id,
            success = report.success(),
            errors = report.errors.len(),
            published = report.published,
            elapsed_ms = report.duration.as_millis() as u64,
            "build finished"
        );
        report
    }

    /// Inputs of `step`: the filtered source tree and upstream outputs, in
    /// declaration order.
    fn context_for(
        &self,
        step: &TransformStep,
        source: &Arc<SourceTree>,
        outputs: &HashMap<StepName, Arc<SourceTree>>,
    ) -> StepContext {
        let inputs = step
            .declared_inputs()
            .iter()
            .filter_map(|input| {
                if input == SOURCE_INPUT {
                    let filter = step.input_filter();
                    let tree = if filter.is_restricted() || !filter.exclude_patterns().is_empty() {
                        Arc::new(source.filter(|p| filter.matches(p)))
                    } else {
                        Arc::clone(source)
                    };
                    Some((input.clone(), tree))
                } else {
                    outputs.get(input).map(|t| (input.clone(), Arc::clone(t)))
                }
            })
            .collect();
        StepContext::new(step.name(), self.options.environment.clone(), inputs)
    }

    /// Returns whether the output directory was replaced.
    async fn publish(&mut self, merged: Arc<SourceTree>) -> Result<bool> {
        let digest = merged.digest();
        let output = self.options.output_dir.clone();
        if self.published_digest == Some(digest) && output.is_dir() {
            debug!(output = ?output, "output unchanged; skipping publish");
            return Ok(false);
        }

        tokio::task::spawn_blocking(move || publish::publish(&merged, &output))
            .await
            .map_err(|e| BuildError::Other(anyhow::anyhow!("publish task failed: {e}")))??;
        self.published_digest = Some(digest);
        Ok(true)
    }
}

fn reused_run(name: &str, ctx: &StepContext, output: Arc<SourceTree>) -> StepRun {
    StepRun {
        name: name.to_string(),
        outcome: StepOutcome::Reused,
        duration: Default::default(),
        output: Some(output),
        error: None,
        input_files: ctx.input_files(),
        input_bytes: ctx.input_bytes(),
    }
}

fn step_report(run: &StepRun) -> StepReport {
    let status = match (&run.outcome, &run.error) {
        (StepOutcome::Succeeded, _) => StepStatus::Built,
        (StepOutcome::Reused, _) => StepStatus::Reused,
        (StepOutcome::Failed, Some(BuildError::Timeout { after, .. })) => StepStatus::TimedOut(*after),
        (StepOutcome::Failed, Some(BuildError::StepExecution { message, .. })) => {
            StepStatus::Failed(message.clone())
        }
        (StepOutcome::Failed, Some(other)) => StepStatus::Failed(other.to_string()),
        (StepOutcome::Failed, None) => StepStatus::Failed("unknown failure".to_string()),
    };
    StepReport {
        name: run.name.clone(),
        status,
        duration: run.duration,
        input_files: run.input_files,
        input_bytes: run.input_bytes,
        output_files: run.output.as_ref().map_or(0, |t| t.len()),
        output_bytes: run.output.as_ref().map_or(0, |t| t.total_bytes()),
    }
}

/// Ignore the output directory and its staging siblings when they live
/// below the source root.
fn output_scan_filter(root: &Path, output_dir: &Path) -> ScanFilter {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    let candidates = [
        output_dir.to_path_buf(),
        publish::sibling_dir(output_dir, publish::STAGING_SUFFIX),
        publish::sibling_dir(output_dir, publish::OLD_SUFFIX),
    ];

    candidates
        .iter()
        .filter_map(|dir| relative_str(&root, dir))
        .filter(|rel| !rel.is_empty())
        .fold(ScanFilter::new(), |filter, rel| filter.ignore(rel))
}
