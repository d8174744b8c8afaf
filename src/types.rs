use std::fmt;

/// Canonical step name type used throughout the pipeline.
pub type StepName = String;

/// Forward-slash path relative to a tree root, e.g. `"src/app.ts"`.
pub type RelPath = String;

/// Input name that designates the root source tree rather than another step.
pub const SOURCE_INPUT: &str = "source";

/// Whether a build may reuse cached step outputs.
///
/// - `Full`: ignore the cache and recompute every step (first build, or after
///   an environment switch).
/// - `Incremental`: reuse cached outputs for steps unaffected by the change
///   set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Full,
    Incremental,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Full => f.write_str("full"),
            BuildMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Name of the production environment; lint steps default to off there.
pub const PRODUCTION: &str = "production";

/// Default lint setting for an environment.
pub fn lint_default_for(environment: &str) -> bool {
    environment != PRODUCTION
}
