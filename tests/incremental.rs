// tests/incremental.rs

mod common;

use std::collections::BTreeSet;

use common::{marker, pass, source_step, TestResult};
use treebuild::step::{InputFilter, LintTransform, TransformFuture};
use treebuild::types::BuildMode;
use treebuild::{build, StepContext, StepStatus, Transform, TransformStep};
use treebuild_test_utils::builders::{mock_builder, mock_fs, text};
use treebuild_test_utils::fake_transforms::RecordingTransform;
use treebuild_test_utils::init_tracing;

fn status<'a>(report: &'a treebuild::BuildReport, step: &str) -> Option<&'a StepStatus> {
    report.entry(step).map(|e| &e.status)
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Passes inputs through, but panics when `a/x` holds `trigger`.
#[derive(Debug)]
struct PanicsOn {
    trigger: &'static str,
}

impl Transform for PanicsOn {
    fn kind(&self) -> &str {
        "panics-on"
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(async move {
            let merged = ctx.merged_inputs();
            if text(&merged, "a/x").as_deref() == Some(self.trigger) {
                panic!("cannot transform {}", self.trigger);
            }
            Ok(merged)
        })
    }
}

#[tokio::test]
async fn full_builds_of_unchanged_source_are_identical() -> TestResult {
    let fs = mock_fs(&[("src/a.ts", "a"), ("src/b.ts", "b")]);
    let mut pipeline = mock_builder(fs)
        .step(source_step("copy"))
        .step(marker("count").input("copy"))
        .build()?;

    let first = build(&mut pipeline).await;
    let second = build(&mut pipeline).await;

    assert_eq!(first.run_id() + 1, second.run_id());
    assert_eq!(second.mode(), BuildMode::Full);
    assert!(second.entries().iter().all(|e| e.status == StepStatus::Built));
    let a = first.merged().ok_or("first merge")?;
    let b = second.merged().ok_or("second merge")?;
    assert_eq!(a.digest(), b.digest());
    assert_eq!(text(b, "count.out").as_deref(), Some("2"));
    Ok(())
}

#[tokio::test]
async fn first_incremental_build_falls_back_to_full() -> TestResult {
    let fs = mock_fs(&[("a.txt", "a")]);
    let mut pipeline = mock_builder(fs).step(source_step("copy")).build()?;

    let report = pipeline.run(BuildMode::Incremental, None).await;
    assert_eq!(report.mode(), BuildMode::Full);
    assert_eq!(status(&report, "copy"), Some(&StepStatus::Built));
    Ok(())
}

#[tokio::test]
async fn no_change_reuses_every_step_without_running_it() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("a.txt", "a")]);
    let recorder = RecordingTransform::new();
    let log = recorder.log();
    let mut pipeline = mock_builder(fs)
        .step(TransformStep::new("copy", recorder).input("source"))
        .build()?;

    build(&mut pipeline).await;
    let report = pipeline.run(BuildMode::Incremental, None).await;

    assert!(report.success(), "{report}");
    assert!(report.changed_paths().is_empty());
    assert!(report.affected().is_empty());
    assert_eq!(status(&report, "copy"), Some(&StepStatus::Reused));
    assert!(report.slowest().is_empty());
    assert_eq!(log.lock().unwrap().as_slice(), ["copy"]);
    Ok(())
}

#[tokio::test]
async fn change_rebuilds_only_the_affected_branch() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("src/app.ts", "let a = 1;"), ("styles/site.css", "body {}")]);
    let mut pipeline = mock_builder(fs.clone())
        .step(source_step("transpile").filter(InputFilter::include(["src/**/*.ts"])?))
        .step(source_step("styles").filter(InputFilter::include(["styles/**"])?))
        .step(pass("bundle").input("transpile"))
        .build()?;

    build(&mut pipeline).await;

    fs.add_file("src/app.ts", "let a = 2;");
    let changed = set(&["src/app.ts"]);
    let report = pipeline.run(BuildMode::Incremental, Some(&changed)).await;

    assert!(report.success(), "{report}");
    assert_eq!(report.changed_paths(), &changed);
    assert_eq!(report.affected(), &set(&["transpile", "bundle"]));
    assert_eq!(status(&report, "transpile"), Some(&StepStatus::Built));
    assert_eq!(status(&report, "bundle"), Some(&StepStatus::Built));
    assert_eq!(status(&report, "styles"), Some(&StepStatus::Reused));

    let merged = report.merged().ok_or("merged output")?;
    assert_eq!(text(merged, "src/app.ts").as_deref(), Some("let a = 2;"));
    assert_eq!(text(merged, "styles/site.css").as_deref(), Some("body {}"));
    Ok(())
}

#[tokio::test]
async fn unchanged_upstream_output_lets_affected_dependents_reuse() -> TestResult {
    let fs = mock_fs(&[("src/app.ts", "let a = 1;")]);
    let mut pipeline = mock_builder(fs.clone())
        // Output depends on the file count only.
        .step(marker("count").input("source"))
        .step(pass("publish").input("count"))
        .build()?;

    build(&mut pipeline).await;

    fs.add_file("src/app.ts", "let a = 42;");
    let report = pipeline
        .run(BuildMode::Incremental, Some(&set(&["src/app.ts"])))
        .await;

    assert!(report.affected().contains("publish"));
    assert_eq!(status(&report, "count"), Some(&StepStatus::Built));
    assert_eq!(status(&report, "publish"), Some(&StepStatus::Reused));
    Ok(())
}

#[tokio::test]
async fn failed_step_is_rebuilt_once_fixed() -> TestResult {
    let fs = mock_fs(&[("src/app.js", "run();")]);
    let mut pipeline = mock_builder(fs.clone())
        .step(
            TransformStep::new("no-debugger", LintTransform::new([r"\bdebugger\b"])?)
                .input("source")
                .lint(true),
        )
        .step(marker("after-lint").input("no-debugger"))
        .build()?;

    assert!(build(&mut pipeline).await.success());

    fs.add_file("src/app.js", "debugger;");
    let broken = pipeline
        .run(BuildMode::Incremental, Some(&set(&["src/app.js"])))
        .await;
    assert_eq!(broken.failed_steps(), vec!["no-debugger"]);
    assert_eq!(broken.skipped_steps(), vec!["after-lint"]);
    assert!(pipeline.cache().get("no-debugger").await.is_none());
    assert!(pipeline.cache().get("after-lint").await.is_none());

    fs.add_file("src/app.js", "run();");
    let fixed = pipeline
        .run(BuildMode::Incremental, Some(&set(&["src/app.js"])))
        .await;
    assert!(fixed.success(), "{fixed}");
    assert_eq!(status(&fixed, "no-debugger"), Some(&StepStatus::Built));
    assert_eq!(status(&fixed, "after-lint"), Some(&StepStatus::Built));
    Ok(())
}

#[tokio::test]
async fn invalidated_cache_forces_a_rebuild() -> TestResult {
    let fs = mock_fs(&[("a.txt", "a")]);
    let mut pipeline = mock_builder(fs).step(source_step("copy")).build()?;

    build(&mut pipeline).await;
    assert_eq!(pipeline.cache().cached_steps().await, 1);

    pipeline.invalidate_cache().await;
    assert_eq!(pipeline.cache().cached_steps().await, 0);

    let report = pipeline.run(BuildMode::Incremental, None).await;
    assert_eq!(status(&report, "copy"), Some(&StepStatus::Built));
    Ok(())
}

#[tokio::test]
async fn deleted_source_file_disappears_from_the_output() -> TestResult {
    let fs = mock_fs(&[("keep.txt", "k"), ("drop.txt", "d")]);
    let mut pipeline = mock_builder(fs.clone()).step(source_step("copy")).build()?;

    build(&mut pipeline).await;
    fs.remove("drop.txt");
    let report = pipeline
        .run(BuildMode::Incremental, Some(&set(&["drop.txt"])))
        .await;

    let merged = report.merged().ok_or("merged output")?;
    assert_eq!(merged.paths().collect::<Vec<_>>(), vec!["keep.txt"]);
    Ok(())
}

#[tokio::test]
async fn panicked_step_is_not_reused_from_an_older_build() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("a/x", "v1"), ("b/y", "1")]);
    let mut pipeline = mock_builder(fs.clone())
        .step(
            TransformStep::new("a", PanicsOn { trigger: "boom" })
                .input("source")
                .filter(InputFilter::include(["a/**"])?),
        )
        .step(source_step("b").filter(InputFilter::include(["b/**"])?))
        .build()?;

    assert!(build(&mut pipeline).await.success());

    fs.add_file("a/x", "boom");
    let broken = pipeline
        .run(BuildMode::Incremental, Some(&set(&["a/x"])))
        .await;
    assert_eq!(
        status(&broken, "a"),
        Some(&StepStatus::Failed("step worker panicked".to_string()))
    );
    assert!(pipeline.cache().get("a").await.is_none());

    // `a` is unaffected by this change but has nothing valid to reuse.
    fs.add_file("b/y", "2");
    let next = pipeline
        .run(BuildMode::Incremental, Some(&set(&["b/y"])))
        .await;
    assert!(!next.success(), "{next}");
    assert_eq!(next.failed_steps(), vec!["a"]);
    let merged = next.merged().ok_or("merged output")?;
    assert_eq!(text(merged, "a/x"), None);
    assert_eq!(text(merged, "b/y").as_deref(), Some("2"));
    Ok(())
}

#[tokio::test]
async fn changes_from_a_failed_rescan_are_picked_up_by_the_next_build() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("a.txt", "old"), ("b.txt", "1")]);
    let mut pipeline = mock_builder(fs.clone()).step(source_step("copy")).build()?;
    assert!(build(&mut pipeline).await.success());

    fs.add_file("a.txt", "new");
    fs.add_symlink("loop", ".");
    let failed = pipeline
        .run(BuildMode::Incremental, Some(&set(&["a.txt", "loop"])))
        .await;
    assert!(!failed.success());
    assert!(failed.entries().is_empty());

    fs.remove("loop");
    fs.add_file("b.txt", "2");
    let recovered = pipeline
        .run(BuildMode::Incremental, Some(&set(&["b.txt", "loop"])))
        .await;

    assert!(recovered.success(), "{recovered}");
    assert_eq!(recovered.mode(), BuildMode::Incremental);
    assert_eq!(recovered.changed_paths(), &set(&["a.txt", "b.txt"]));
    let merged = recovered.merged().ok_or("merged output")?;
    assert_eq!(text(merged, "a.txt").as_deref(), Some("new"));
    assert_eq!(text(merged, "b.txt").as_deref(), Some("2"));
    Ok(())
}
