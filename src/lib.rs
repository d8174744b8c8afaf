// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod step;
pub mod tree;
pub mod types;
pub mod watch;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{build_steps, config_dir, load_and_validate, ConfigFile};
use crate::types::BuildMode;
use crate::watch::{spawn_fs_watcher, WatchOptions, WatchSession};

pub use crate::errors::BuildError;
pub use crate::pipeline::{BuildPipeline, PipelineBuilder};
pub use crate::report::{BuildReport, StepReport, StepStatus, StepTiming};
pub use crate::step::{StepContext, Transform, TransformStep};
pub use crate::tree::SourceTree;

/// One-shot full build.
pub async fn build(pipeline: &mut BuildPipeline) -> BuildReport {
    pipeline.run(BuildMode::Full, None).await
}

/// Watch the pipeline's source root and rebuild on every change.
///
/// The first report is a full build; each later one covers one debounced
/// batch of changes. The session runs until [`WatchSession::stop`].
pub fn watch(pipeline: BuildPipeline, options: WatchOptions) -> Result<WatchSession> {
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let watcher = spawn_fs_watcher(
        pipeline.options().root.clone(),
        pipeline.scan_filter().clone(),
        changes_tx,
    )?;
    Ok(WatchSession::start(pipeline, changes_rx, options).with_watcher(watcher))
}

/// High-level entry point used by `main.rs`.
///
/// Loads the config, assembles the pipeline, then either builds once or
/// watches until Ctrl-C. Returns whether the (last) build succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {:?}", args.config))?;
    let pipeline = pipeline_from_config(&cfg, &args)?;

    if args.dry_run {
        print_dry_run(&pipeline);
        return Ok(true);
    }

    if !args.watch {
        let mut pipeline = pipeline;
        let report = build(&mut pipeline).await;
        println!("{report}");
        return Ok(report.success());
    }

    let options = WatchOptions {
        debounce: cfg.build.debounce,
        ..WatchOptions::default()
    };
    let mut session = watch(pipeline, options)?;
    let mut last_success = true;

    loop {
        tokio::select! {
            report = session.next_report() => match report {
                Some(report) => {
                    last_success = report.success();
                    println!("{report}");
                }
                None => {
                    warn!("watch session ended");
                    break;
                }
            },
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                info!("Ctrl+C received; stopping watch session");
                break;
            }
        }
    }

    session.stop().await?;
    Ok(last_success)
}

/// Build the pipeline described by `cfg`, with CLI flags taking precedence.
pub fn pipeline_from_config(cfg: &ConfigFile, args: &CliArgs) -> Result<BuildPipeline> {
    let root = cfg.source_root(&config_dir(&args.config));
    let steps = build_steps(cfg)?;

    let mut builder = PipelineBuilder::new(root)
        .environment(&args.environment)
        .output_dir(&args.output)
        .steps(steps);

    if let Some(jobs) = args.jobs.or(cfg.build.jobs) {
        builder = builder.parallelism(jobs);
    }
    if let Some(timeout) = cfg.build.step_timeout {
        builder = builder.step_timeout(Some(timeout));
    }
    if let Some(lint) = cfg.build.lint {
        builder = builder.lint(lint);
    }
    if args.print_slow_trees {
        builder = builder.print_slow_steps(args.slow_count);
    }

    Ok(builder.build()?)
}

/// Print the resolved settings and the step graph without building.
fn print_dry_run(pipeline: &BuildPipeline) {
    let opts = pipeline.options();
    println!("treebuild dry-run");
    println!("  source      = {:?}", opts.root);
    println!("  output      = {:?}", opts.output_dir);
    println!("  environment = {}", opts.environment);
    println!("  lint        = {}", opts.lint);
    println!("  jobs        = {}", opts.parallelism);
    if let Some(timeout) = opts.step_timeout {
        println!("  timeout     = {timeout:?}");
    }
    println!();

    let graph = pipeline.graph();
    println!("steps ({}), in build order:", graph.len());
    for name in graph.topological_order() {
        let Some(step) = pipeline.step(name) else {
            continue;
        };
        println!("  - {name} ({})", step.kind());
        let deps = graph.dependencies_of(name);
        if graph.reads_source(name) {
            println!("      reads: source");
            let filter = step.input_filter();
            if !filter.include_patterns().is_empty() {
                println!("      include: {:?}", filter.include_patterns());
            }
            if !filter.exclude_patterns().is_empty() {
                println!("      exclude: {:?}", filter.exclude_patterns());
            }
        }
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if step.is_lint() {
            println!("      lint: true");
        }
        if let Some(timeout) = step.step_timeout() {
            println!("      timeout: {timeout:?}");
        }
    }
    let leaves = graph.leaves();
    println!("leaves merged into output: {leaves:?}");

    debug!("dry-run complete (no execution)");
}
