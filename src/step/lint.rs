// src/step/lint.rs

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::step::{StepContext, Transform, TransformFuture};
use crate::tree::SourceTree;

/// Maximum number of violations listed in a failure message.
const MAX_REPORTED: usize = 20;

/// Fails when any input line matches one of the `deny` patterns.
///
/// Produces an empty tree on success, so a lint leaf never contributes to
/// the merged output.
#[derive(Debug, Clone)]
pub struct LintTransform {
    deny: Vec<Regex>,
}

impl LintTransform {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let deny = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).with_context(|| format!("invalid deny pattern: {p}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { deny })
    }

    fn check(&self, ctx: &StepContext) -> Result<SourceTree> {
        let mut violations = Vec::new();

        for (path, entry) in ctx.merged_inputs().iter() {
            let text = String::from_utf8_lossy(entry.contents());
            for (idx, line) in text.lines().enumerate() {
                if let Some(re) = self.deny.iter().find(|re| re.is_match(line)) {
                    violations.push(format!("{}:{}: matches `{}`", path, idx + 1, re.as_str()));
                }
            }
        }

        if violations.is_empty() {
            return Ok(SourceTree::new());
        }

        let total = violations.len();
        violations.truncate(MAX_REPORTED);
        let mut message = format!("{total} lint violation(s):\n  {}", violations.join("\n  "));
        if total > MAX_REPORTED {
            message.push_str(&format!("\n  ... and {} more", total - MAX_REPORTED));
        }
        bail!(message)
    }
}

impl Transform for LintTransform {
    fn kind(&self) -> &str {
        "lint"
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move { self.check(ctx) })
    }
}
