// src/exec/command.rs

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::fs::RealFileSystem;
use crate::step::{StepContext, Transform, TransformFuture};
use crate::tree::{scan, SourceTree};

/// Environment variable holding the directory with the step's inputs.
pub const ENV_INPUT: &str = "TREEBUILD_INPUT";
/// Environment variable holding the directory the command must write into.
pub const ENV_OUTPUT: &str = "TREEBUILD_OUTPUT";
/// Environment variable holding the build environment name.
pub const ENV_ENVIRONMENT: &str = "TREEBUILD_ENV";
/// Environment variable holding the step name.
pub const ENV_STEP: &str = "TREEBUILD_STEP";

/// Number of stderr lines kept for the failure message.
const STDERR_TAIL: usize = 20;

/// Runs a shell command over the step's inputs.
///
/// The merged inputs are written to a fresh temporary `input/` directory,
/// the command runs there with an empty `output/` directory next to it, and
/// whatever it leaves in `output/` becomes the step's output tree. The
/// temporary directory is removed afterwards.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    cmd: String,
}

impl CommandTransform {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn execute(&self, ctx: &StepContext) -> Result<SourceTree> {
        let staging = tempfile::Builder::new()
            .prefix("treebuild-step-")
            .tempdir()
            .with_context(|| format!("creating staging directory for step '{}'", ctx.step()))?;
        let input_dir = staging.path().join("input");
        let output_dir = staging.path().join("output");

        let inputs = ctx.merged_inputs();
        materialize(&inputs, &input_dir).await?;
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("creating {:?}", output_dir))?;

        info!(step = %ctx.step(), cmd = %self.cmd, files = inputs.len(), "starting step process");

        let mut cmd = shell_command(&self.cmd);
        cmd.current_dir(&input_dir)
            .env(ENV_INPUT, &input_dir)
            .env(ENV_OUTPUT, &output_dir)
            .env(ENV_ENVIRONMENT, ctx.environment())
            .env(ENV_STEP, ctx.step())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for step '{}'", ctx.step()))?;

        if let Some(stdout) = child.stdout.take() {
            let step = ctx.step().to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(step = %step, "stdout: {}", line);
                }
            });
        }

        // Drain stderr so the pipe never fills; keep the tail for errors.
        let stderr_task = child.stderr.take().map(|stderr| {
            let step = ctx.step().to_string();
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(step = %step, "stderr: {}", line);
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of step '{}'", ctx.step()))?;

        let stderr_tail = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        let code = status.code().unwrap_or(-1);
        info!(
            step = %ctx.step(),
            exit_code = code,
            success = status.success(),
            "step process exited"
        );

        if !status.success() {
            let tail: Vec<String> = stderr_tail.into_iter().collect();
            if tail.is_empty() {
                bail!("command `{}` exited with code {}", self.cmd, code);
            }
            bail!(
                "command `{}` exited with code {}:\n{}",
                self.cmd,
                code,
                tail.join("\n")
            );
        }

        let out = output_dir.clone();
        let tree = tokio::task::spawn_blocking(move || scan(&RealFileSystem, &out))
            .await
            .context("output scan task panicked")??;

        debug!(step = %ctx.step(), files = tree.len(), "collected step output");
        Ok(tree)
    }
}

impl Transform for CommandTransform {
    fn kind(&self) -> &str {
        "command"
    }

    fn transform<'a>(&'a self, ctx: &'a StepContext) -> TransformFuture<'a> {
        Box::pin(self.execute(ctx))
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }
}

/// Write every file of `tree` below `dir`.
pub async fn materialize(tree: &SourceTree, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {:?}", dir))?;

    for (rel, entry) in tree {
        let path = dir.join(native_path(rel));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {:?}", parent))?;
        }
        tokio::fs::write(&path, entry.contents())
            .await
            .with_context(|| format!("writing {:?}", path))?;
    }
    Ok(())
}

fn native_path(rel: &str) -> PathBuf {
    rel.split('/').filter(|s| !s.is_empty()).collect()
}
