#![allow(dead_code)]

use std::error::Error;

use treebuild::step::FnTransform;
use treebuild::{SourceTree, StepContext, TransformStep};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Step that passes its inputs through unchanged.
pub fn pass(name: &str) -> TransformStep {
    TransformStep::new(
        name,
        FnTransform::new("pass", |ctx: &StepContext| Ok(ctx.merged_inputs())),
    )
}

/// Step reading `source` that passes it through.
pub fn source_step(name: &str) -> TransformStep {
    pass(name).input("source")
}

/// Step that writes a single file `<name>.out` holding its input count.
pub fn marker(name: &str) -> TransformStep {
    let file = format!("{name}.out");
    TransformStep::new(
        name,
        FnTransform::new("marker", move |ctx: &StepContext| {
            let mut out = SourceTree::new();
            out.insert_bytes(file.clone(), ctx.input_files().to_string());
            Ok(out)
        }),
    )
}
