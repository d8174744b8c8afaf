// src/watch/mod.rs

//! Watch mode.
//!
//! - [`watcher`] wires up a cross-platform filesystem watcher (`notify`) and
//!   turns its events into source-relative paths.
//! - [`debounce`] coalesces bursts of paths into one batch.
//! - [`machine`] is the pure watch state machine; [`queue`] holds changes
//!   that arrive mid-build.
//! - [`session`] is the async loop that drives builds and emits reports.
//!
//! It does not know how steps are scheduled; it only decides when to build
//! and with which changed paths.

pub mod debounce;
pub mod machine;
pub mod path_utils;
pub mod queue;
pub mod session;
pub mod watcher;

pub use machine::{WatchCommand, WatchInput, WatchMachine, WatchState};
pub use queue::ChangeQueue;
pub use session::{WatchOptions, WatchSession};
pub use watcher::{spawn_fs_watcher, WatcherHandle};
