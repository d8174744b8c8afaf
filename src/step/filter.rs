// src/step/filter.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob patterns restricting which source files a
/// step consumes.
///
/// Patterns are evaluated against forward-slash paths relative to the source
/// root (e.g. `"src/main.ts"`). A filter without include patterns accepts
/// every path that is not excluded.
#[derive(Clone, Default)]
pub struct InputFilter {
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for InputFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFilter")
            .field("include", &self.include_patterns)
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl InputFilter {
    /// Filter that accepts every path.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, E, S, T>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let include_patterns: Vec<String> = include.into_iter().map(Into::into).collect();
        let exclude_patterns: Vec<String> = exclude.into_iter().map(Into::into).collect();

        let include_set = if include_patterns.is_empty() {
            None
        } else {
            Some(build_globset(&include_patterns).context("building include globset")?)
        };
        let exclude_set = if exclude_patterns.is_empty() {
            None
        } else {
            Some(build_globset(&exclude_patterns).context("building exclude globset")?)
        };

        Ok(Self {
            include_patterns,
            exclude_patterns,
            include_set,
            exclude_set,
        })
    }

    /// Filter with include patterns only.
    pub fn include<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(patterns, Vec::<String>::new())
    }

    /// Whether the step only consumes specific paths.
    pub fn is_restricted(&self) -> bool {
        self.include_set.is_some()
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Returns true if the path (relative to the source root) is consumed.
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(include) = &self.include_set {
            if !include.is_match(rel_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
