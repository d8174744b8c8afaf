// src/watch/session.rs

//! Async shell around the [`WatchMachine`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pipeline::BuildPipeline;
use crate::report::BuildReport;
use crate::types::{BuildMode, RelPath};
use crate::watch::debounce::{drain_ready, next_batch, DEFAULT_DEBOUNCE};
use crate::watch::machine::{WatchCommand, WatchInput, WatchMachine};
use crate::watch::watcher::WatcherHandle;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Window over which change bursts are coalesced into one build.
    pub debounce: Duration,
    /// Capacity of the report channel.
    pub report_buffer: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            report_buffer: 16,
        }
    }
}

/// A running watch loop.
///
/// Emits one [`BuildReport`] per build, starting with a full build, and
/// keeps going after failed builds. Ends only on [`stop`](Self::stop) or
/// when the change source closes.
#[derive(Debug)]
pub struct WatchSession {
    reports: mpsc::Receiver<BuildReport>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<BuildPipeline>,
    _watcher: Option<WatcherHandle>,
}

impl WatchSession {
    /// Start watching. `changes` carries source-relative paths, typically
    /// from [`spawn_fs_watcher`](crate::watch::spawn_fs_watcher).
    pub fn start(
        pipeline: BuildPipeline,
        changes: mpsc::UnboundedReceiver<RelPath>,
        options: WatchOptions,
    ) -> Self {
        let (reports_tx, reports) = mpsc::channel(options.report_buffer.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(session_loop(
            pipeline,
            changes,
            reports_tx,
            stop_rx,
            options.debounce,
        ));

        Self {
            reports,
            stop_tx: Some(stop_tx),
            task,
            _watcher: None,
        }
    }

    /// Keep `watcher` alive for as long as the session runs.
    pub fn with_watcher(mut self, watcher: WatcherHandle) -> Self {
        self._watcher = Some(watcher);
        self
    }

    /// Next build report; `None` once the session has ended.
    pub async fn next_report(&mut self) -> Option<BuildReport> {
        self.reports.recv().await
    }

    pub fn reports(&mut self) -> &mut mpsc::Receiver<BuildReport> {
        &mut self.reports
    }

    /// Request a stop, let any in-flight build finish, and hand the
    /// pipeline back.
    pub async fn stop(mut self) -> Result<BuildPipeline> {
        // Unread reports must not block the loop from finishing.
        drop(self.reports);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| anyhow!("watch session task failed: {e}"))
    }
}

async fn session_loop(
    mut pipeline: BuildPipeline,
    mut changes: mpsc::UnboundedReceiver<RelPath>,
    reports_tx: mpsc::Sender<BuildReport>,
    mut stop_rx: oneshot::Receiver<()>,
    debounce: Duration,
) -> BuildPipeline {
    let mut machine = WatchMachine::new();
    let mut commands: VecDeque<WatchCommand> = machine.step(WatchInput::Start).into();

    info!(debounce_ms = debounce.as_millis() as u64, "watch session started");

    loop {
        let Some(command) = commands.pop_front() else {
            // Idle: wait for changes or a stop request.
            let input = tokio::select! {
                _ = &mut stop_rx => WatchInput::StopRequested,
                batch = next_batch(&mut changes, debounce) => match batch {
                    Some(paths) => WatchInput::ChangesObserved(paths),
                    None => {
                        debug!("change source closed");
                        WatchInput::StopRequested
                    }
                },
            };
            commands.extend(machine.step(input));
            continue;
        };

        match command {
            WatchCommand::Stop => break,
            WatchCommand::RunBuild { mode, paths } => {
                let report = build_once(&mut pipeline, &mut machine, mode, paths).await;
                let success = report.success();

                if reports_tx.send(report).await.is_err() {
                    debug!("report receiver dropped");
                }

                // Changes that arrived during the build go to the queue.
                let during = drain_ready(&mut changes);
                if !during.is_empty() {
                    commands.extend(machine.step(WatchInput::ChangesObserved(during)));
                }

                let stop = match stop_rx.try_recv() {
                    Ok(()) => true,
                    Err(oneshot::error::TryRecvError::Closed) => true,
                    Err(oneshot::error::TryRecvError::Empty) => false,
                };
                if stop {
                    commands.extend(machine.step(WatchInput::StopRequested));
                }

                commands.extend(machine.step(WatchInput::BuildFinished { success }));
            }
        }
    }

    info!(transitions = machine.transitions().len(), "watch session stopped");
    pipeline
}

async fn build_once(
    pipeline: &mut BuildPipeline,
    machine: &mut WatchMachine,
    mode: BuildMode,
    paths: Option<std::collections::BTreeSet<RelPath>>,
) -> BuildReport {
    let started = Instant::now();

    let scanned = match (&paths, pipeline.source_tree()) {
        (Some(paths), Some(_)) if mode == BuildMode::Incremental => pipeline.rescan(paths).await,
        _ => pipeline.scan().await,
    };
    machine.step(WatchInput::ScanFinished {
        ok: scanned.is_ok(),
    });

    let report = match scanned {
        Ok(tree) => pipeline.run_on(mode, tree).await,
        Err(err) => {
            warn!(error = %err, "scan failed; waiting for further changes");
            pipeline.scan_failure_report(mode, err, started)
        }
    };

    info!(
        run_id = report.run_id(),
        success = report.success(),
        elapsed_ms = report.duration().as_millis() as u64,
        "watch build finished"
    );
    report
}
