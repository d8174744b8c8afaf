// src/step/mod.rs

//! Build steps.
//!
//! A [`TransformStep`] is a named, pure transformation over input trees. The
//! actual work is done by a [`Transform`] object; the step adds the wiring
//! (declared inputs, source filter, timeout, lint flag).
//!
//! - [`filter`] compiles include/exclude globs for source inputs.
//! - [`copy`] and [`lint`] are the built-in in-memory transforms; the
//!   process-backed transform lives in [`crate::exec::command`].

pub mod copy;
pub mod filter;
pub mod lint;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::tree::hash::combine_digests;
use crate::tree::{digest_bytes, Digest, SourceTree};
use crate::types::{StepName, SOURCE_INPUT};

pub use copy::CopyTransform;
pub use filter::InputFilter;
pub use lint::LintTransform;

/// Future returned by [`Transform::transform`].
pub type TransformFuture<'a> = Pin<Box<dyn Future<Output = Result<SourceTree>> + Send + 'a>>;

/// The work a step performs.
///
/// Implementations must be pure over the [`StepContext`]: no global state,
/// all communication through trees. They may await IO (processes, files);
/// the pipeline keeps dispatching other ready steps meanwhile.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Short label shown in logs and dry-run output (e.g. `"copy"`).
    fn kind(&self) -> &str;

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a>;
}

/// Everything a transform may read for one invocation.
#[derive(Debug, Clone)]
pub struct StepContext {
    step: StepName,
    environment: String,
    inputs: Vec<(StepName, Arc<SourceTree>)>,
}

impl StepContext {
    pub fn new(
        step: impl Into<StepName>,
        environment: impl Into<String>,
        inputs: Vec<(StepName, Arc<SourceTree>)>,
    ) -> Self {
        Self {
            step: step.into(),
            environment: environment.into(),
            inputs,
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Input trees in declaration order, keyed by input name.
    pub fn inputs(&self) -> &[(StepName, Arc<SourceTree>)] {
        &self.inputs
    }

    /// The tree produced by input `name` (`"source"` for the root tree).
    pub fn input(&self, name: &str) -> Option<&SourceTree> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_ref())
    }

    /// The filtered source tree, if this step reads it.
    pub fn source(&self) -> Option<&SourceTree> {
        self.input(SOURCE_INPUT)
    }

    /// Union of all inputs. On a path collision the later input wins.
    pub fn merged_inputs(&self) -> SourceTree {
        let mut merged = SourceTree::new();
        for (_, tree) in &self.inputs {
            for (path, entry) in tree.iter() {
                merged.insert(path.clone(), entry.clone());
            }
        }
        merged
    }

    /// Digest over every input tree and the environment name.
    ///
    /// Two invocations with equal fingerprints receive identical inputs, so
    /// a cached output for one is valid for the other.
    pub fn fingerprint(&self) -> Digest {
        let env = digest_bytes(self.environment.as_bytes());
        combine_digests(
            self.inputs
                .iter()
                .map(|(name, tree)| (name.as_str(), tree.digest()))
                .chain(std::iter::once(("\0env", env))),
        )
    }

    pub fn input_files(&self) -> usize {
        self.inputs.iter().map(|(_, t)| t.len()).sum()
    }

    pub fn input_bytes(&self) -> u64 {
        self.inputs.iter().map(|(_, t)| t.total_bytes()).sum()
    }
}

/// Adapter turning a closure into a [`Transform`].
///
/// The closure may block (file IO, `std::process`): it runs on the blocking
/// pool, so the step timeout still applies and other ready steps keep
/// running. Used by embedders registering their own steps and throughout the
/// tests.
pub struct FnTransform<F> {
    kind: String,
    f: Arc<F>,
}

impl<F> FnTransform<F>
where
    F: Fn(&StepContext) -> Result<SourceTree> + Send + Sync + 'static,
{
    pub fn new(kind: impl Into<String>, f: F) -> Self {
        Self {
            kind: kind.into(),
            f: Arc::new(f),
        }
    }
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&StepContext) -> Result<SourceTree> + Send + Sync + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        let f = Arc::clone(&self.f);
        let ctx = ctx.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || (*f)(&ctx))
                .await
                .map_err(|e| anyhow!("step closure did not complete: {e}"))?
        })
    }
}

/// A registered build step.
#[derive(Clone)]
pub struct TransformStep {
    name: StepName,
    inputs: Vec<StepName>,
    filter: InputFilter,
    timeout: Option<Duration>,
    lint: bool,
    transform: Arc<dyn Transform>,
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStep")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("kind", &self.transform.kind())
            .field("lint", &self.lint)
            .finish_non_exhaustive()
    }
}

impl TransformStep {
    /// New step with no inputs. Use [`TransformStep::input`] to declare them.
    pub fn new(name: impl Into<StepName>, transform: impl Transform + 'static) -> Self {
        Self::from_arc(name, Arc::new(transform))
    }

    pub fn from_arc(name: impl Into<StepName>, transform: Arc<dyn Transform>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            filter: InputFilter::all(),
            timeout: None,
            lint: false,
            transform,
        }
    }

    /// Declare an input: another step's name, or `"source"`.
    pub fn input(mut self, name: impl Into<StepName>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepName>,
    {
        self.inputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Restrict which source files this step consumes.
    pub fn filter(mut self, filter: InputFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Per-step timeout; overrides the pipeline default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark this step as a lint step (dropped when lint is disabled).
    pub fn lint(mut self, lint: bool) -> Self {
        self.lint = lint;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_inputs(&self) -> &[StepName] {
        &self.inputs
    }

    pub fn reads_source(&self) -> bool {
        self.inputs.iter().any(|i| i == SOURCE_INPUT)
    }

    pub fn input_filter(&self) -> &InputFilter {
        &self.filter
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_lint(&self) -> bool {
        self.lint
    }

    pub fn kind(&self) -> &str {
        self.transform.kind()
    }

    pub fn transformer(&self) -> &Arc<dyn Transform> {
        &self.transform
    }
}
