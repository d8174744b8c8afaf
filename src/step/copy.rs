// src/step/copy.rs

use anyhow::Result;

use crate::step::{StepContext, Transform, TransformFuture};
use crate::tree::SourceTree;

/// Copies its inputs to its output, optionally re-rooting them.
///
/// With `strip_prefix = "public"` and `dest = "assets"`, the input file
/// `public/logo.png` becomes `assets/logo.png`; files outside `public/` are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct CopyTransform {
    strip_prefix: Option<String>,
    dest: Option<String>,
}

impl CopyTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    fn apply(&self, ctx: &StepContext) -> Result<SourceTree> {
        let mut tree = ctx.merged_inputs();
        if let Some(prefix) = &self.strip_prefix {
            tree = tree.strip_prefix(prefix);
        }
        if let Some(dest) = &self.dest {
            tree = tree.with_prefix(dest);
        }
        Ok(tree)
    }
}

impl Transform for CopyTransform {
    fn kind(&self) -> &str {
        "copy"
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move { self.apply(ctx) })
    }
}
