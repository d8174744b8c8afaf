// tests/watch_session.rs

mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use common::{source_step, TestResult};
use tokio::sync::mpsc;
use tokio::time::timeout;
use treebuild::step::LintTransform;
use treebuild::tree::ScanFilter;
use treebuild::types::BuildMode;
use treebuild::watch::debounce::{drain_ready, next_batch};
use treebuild::watch::{spawn_fs_watcher, WatchOptions, WatchSession};
use treebuild::TransformStep;
use treebuild_test_utils::builders::{mock_builder, mock_fs, write_files};
use treebuild_test_utils::fake_transforms::SleepTransform;
use treebuild_test_utils::{init_tracing, with_timeout};

fn options(debounce_ms: u64) -> WatchOptions {
    WatchOptions {
        debounce: Duration::from_millis(debounce_ms),
        ..WatchOptions::default()
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn burst_of_changes_produces_a_single_incremental_build() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("src/a.ts", "a")]);
    let pipeline = mock_builder(fs.clone()).step(source_step("copy")).build()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = WatchSession::start(pipeline, rx, options(50));

    let first = with_timeout(session.next_report()).await.ok_or("initial report")?;
    assert_eq!(first.mode(), BuildMode::Full);
    assert!(first.success(), "{first}");

    let burst = ["src/1.ts", "src/2.ts", "src/3.ts", "src/4.ts", "src/5.ts"];
    for path in burst {
        fs.add_file(path, path);
        tx.send(path.to_string())?;
    }

    let second = with_timeout(session.next_report()).await.ok_or("follow-up report")?;
    assert_eq!(second.mode(), BuildMode::Incremental);
    assert_eq!(second.changed_paths(), &set(&burst));
    assert_eq!(second.merged().map(|t| t.len()), Some(6));

    // Nothing else is pending.
    assert!(timeout(Duration::from_millis(300), session.next_report()).await.is_err());

    let pipeline = session.stop().await?;
    assert_eq!(pipeline.source_tree().map(|t| t.len()), Some(6));
    Ok(())
}

#[tokio::test]
async fn failed_build_does_not_end_the_session() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("app.js", "debugger;")]);
    let pipeline = mock_builder(fs.clone())
        .step(
            TransformStep::new("no-debugger", LintTransform::new([r"\bdebugger\b"])?)
                .input("source")
                .lint(true),
        )
        .build()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = WatchSession::start(pipeline, rx, options(20));

    let broken = with_timeout(session.next_report()).await.ok_or("initial report")?;
    assert!(!broken.success());

    fs.add_file("app.js", "run();");
    tx.send("app.js".to_string())?;
    let fixed = with_timeout(session.next_report()).await.ok_or("follow-up report")?;
    assert!(fixed.success(), "{fixed}");

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn changes_during_a_build_trigger_exactly_one_follow_up() -> TestResult {
    init_tracing();
    let fs = mock_fs(&[("a.txt", "a")]);
    let pipeline = mock_builder(fs.clone())
        .step(TransformStep::new("slow", SleepTransform::new(Duration::from_millis(200))).input("source"))
        .build()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = WatchSession::start(pipeline, rx, options(10));

    // The initial build is still sleeping while these arrive.
    tokio::time::sleep(Duration::from_millis(50)).await;
    fs.add_file("b.txt", "b");
    tx.send("b.txt".to_string())?;
    fs.add_file("c.txt", "c");
    tx.send("c.txt".to_string())?;

    let first = with_timeout(session.next_report()).await.ok_or("initial report")?;
    assert_eq!(first.mode(), BuildMode::Full);

    let second = with_timeout(session.next_report()).await.ok_or("follow-up report")?;
    assert_eq!(second.mode(), BuildMode::Incremental);
    assert_eq!(second.changed_paths(), &set(&["b.txt", "c.txt"]));

    assert!(timeout(Duration::from_millis(400), session.next_report()).await.is_err());
    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn closing_the_change_source_ends_the_session() -> TestResult {
    let fs = mock_fs(&[("a.txt", "a")]);
    let pipeline = mock_builder(fs).step(source_step("copy")).build()?;
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let mut session = WatchSession::start(pipeline, rx, options(10));

    assert!(with_timeout(session.next_report()).await.is_some());
    drop(tx);
    assert!(with_timeout(session.next_report()).await.is_none());

    let pipeline = session.stop().await?;
    assert!(pipeline.source_tree().is_some());
    Ok(())
}

#[tokio::test]
async fn stop_lets_the_running_build_finish() -> TestResult {
    let fs = mock_fs(&[("a.txt", "a")]);
    let pipeline = mock_builder(fs)
        .step(TransformStep::new("slow", SleepTransform::new(Duration::from_millis(100))).input("source"))
        .build()?;
    let (_tx, rx) = mpsc::unbounded_channel();
    let session = WatchSession::start(pipeline, rx, options(10));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let pipeline = with_timeout(session.stop()).await?;
    assert!(pipeline.cache().get("slow").await.is_some());
    Ok(())
}

#[tokio::test]
async fn next_batch_coalesces_within_the_window() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send("a".to_string()).expect("send");
    tx.send("b".to_string()).expect("send");
    tx.send("a".to_string()).expect("send");

    let batch = with_timeout(next_batch(&mut rx, Duration::from_millis(20))).await;
    assert_eq!(batch, Some(set(&["a", "b"])));

    tx.send("c".to_string()).expect("send");
    assert_eq!(drain_ready(&mut rx), set(&["c"]));
    assert!(drain_ready(&mut rx).is_empty());

    drop(tx);
    assert_eq!(next_batch(&mut rx, Duration::from_millis(20)).await, None);
}

#[tokio::test]
async fn fs_watcher_reports_relative_paths_and_skips_ignored_ones() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_files(dir.path(), &[("src/existing.txt", "x")]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = spawn_fs_watcher(dir.path(), ScanFilter::new().ignore("dist"), tx)?;
    // Give the backend a moment to register the watch.
    tokio::time::sleep(Duration::from_millis(100)).await;

    write_files(dir.path(), &[("dist/out.txt", "ignored"), ("src/new.txt", "y")]);

    let seen = with_timeout(async {
        loop {
            match rx.recv().await {
                Some(path) if path == "src/new.txt" => break path,
                Some(path) => assert!(!path.starts_with("dist"), "ignored path leaked: {path}"),
                None => panic!("watcher channel closed"),
            }
        }
    })
    .await;
    assert_eq!(seen, "src/new.txt");
    Ok(())
}
