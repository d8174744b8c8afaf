// src/watch/machine.rs

//! Pure watch-mode state machine.
//!
//! The machine consumes [`WatchInput`]s and returns [`WatchCommand`]s for
//! the async shell ([`WatchSession`](crate::watch::session::WatchSession))
//! to carry out. It has no channels and performs no IO, so every transition
//! can be tested synchronously.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::types::{BuildMode, RelPath};
use crate::watch::queue::ChangeQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Scanning,
    Building,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchInput {
    /// Session started; run the initial full build.
    Start,
    /// A debounced batch of changed source paths.
    ChangesObserved(BTreeSet<RelPath>),
    ScanFinished { ok: bool },
    BuildFinished { success: bool },
    StopRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Run a build. `paths` is `None` for a full scan.
    RunBuild {
        mode: BuildMode,
        paths: Option<BTreeSet<RelPath>>,
    },
    Stop,
}

#[derive(Debug)]
pub struct WatchMachine {
    state: WatchState,
    queue: ChangeQueue,
    stop_requested: bool,
    transitions: Vec<(WatchState, WatchState)>,
}

impl Default for WatchMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchMachine {
    pub fn new() -> Self {
        Self {
            state: WatchState::Idle,
            queue: ChangeQueue::new(),
            stop_requested: false,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Every state change so far, oldest first.
    pub fn transitions(&self) -> &[(WatchState, WatchState)] {
        &self.transitions
    }

    pub fn pending_changes(&self) -> usize {
        self.queue.len()
    }

    /// Handle one input, returning what the shell should do next.
    pub fn step(&mut self, input: WatchInput) -> Vec<WatchCommand> {
        if self.state == WatchState::Stopped {
            debug!(?input, "watch machine stopped; ignoring input");
            return Vec::new();
        }

        match input {
            WatchInput::Start => match self.state {
                WatchState::Idle => self.begin_build(BuildMode::Full, None),
                _ => Vec::new(),
            },

            WatchInput::ChangesObserved(paths) => {
                if paths.is_empty() {
                    return Vec::new();
                }
                match self.state {
                    WatchState::Idle => self.begin_build(BuildMode::Incremental, Some(paths)),
                    _ => {
                        self.queue.push(paths);
                        Vec::new()
                    }
                }
            }

            WatchInput::ScanFinished { ok } => {
                if self.state == WatchState::Scanning {
                    let next = if ok {
                        WatchState::Building
                    } else {
                        WatchState::Failed
                    };
                    self.transition(next);
                }
                Vec::new()
            }

            WatchInput::BuildFinished { success } => match self.state {
                WatchState::Scanning | WatchState::Building => {
                    if !success {
                        self.transition(WatchState::Failed);
                    }
                    self.transition(WatchState::Idle);
                    self.after_build()
                }
                WatchState::Failed => {
                    self.transition(WatchState::Idle);
                    self.after_build()
                }
                _ => Vec::new(),
            },

            WatchInput::StopRequested => match self.state {
                WatchState::Scanning | WatchState::Building => {
                    info!("stop requested; letting the current build finish");
                    self.stop_requested = true;
                    Vec::new()
                }
                _ => self.stop(),
            },
        }
    }

    fn begin_build(&mut self, mode: BuildMode, paths: Option<BTreeSet<RelPath>>) -> Vec<WatchCommand> {
        self.transition(WatchState::Scanning);
        vec![WatchCommand::RunBuild { mode, paths }]
    }

    fn after_build(&mut self) -> Vec<WatchCommand> {
        if self.stop_requested {
            return self.stop();
        }
        match self.queue.drain() {
            Some(paths) => self.begin_build(BuildMode::Incremental, Some(paths)),
            None => Vec::new(),
        }
    }

    fn stop(&mut self) -> Vec<WatchCommand> {
        self.transition(WatchState::Stopped);
        vec![WatchCommand::Stop]
    }

    fn transition(&mut self, next: WatchState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "watch state transition");
            self.transitions.push((self.state, next));
            self.state = next;
        }
    }
}
