// src/pipeline/merge.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{BuildError, Result};
use crate::tree::SourceTree;
use crate::types::StepName;

/// Union of leaf outputs, in the order given (topological order).
///
/// Two leaves producing the same path is a [`BuildError::MergeConflict`]
/// naming both steps, even when the bytes are identical.
pub fn merge_leaves(leaves: &[(StepName, Arc<SourceTree>)]) -> Result<SourceTree> {
    let mut merged = SourceTree::new();
    let mut owner: HashMap<&str, &str> = HashMap::new();

    for (step, tree) in leaves {
        for (path, entry) in tree.iter() {
            if let Some(first) = owner.get(path.as_str()) {
                return Err(BuildError::MergeConflict {
                    path: path.clone(),
                    first: first.to_string(),
                    second: step.clone(),
                });
            }
            owner.insert(path.as_str(), step.as_str());
            merged.insert(path.clone(), entry.clone());
        }
    }

    Ok(merged)
}
