// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `treebuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "treebuild",
    version,
    about = "Build a source tree through a DAG of transformation steps.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output directory for the merged build.
    #[arg(long, value_name = "DIR", default_value = "dist")]
    pub output: PathBuf,

    /// Build environment. Lint steps are off in `production` unless the
    /// config says otherwise.
    #[arg(long, value_name = "ENV", default_value = "development")]
    pub environment: String,

    /// Keep running and rebuild incrementally on file changes.
    #[arg(long)]
    pub watch: bool,

    /// Print the slowest steps after each build.
    #[arg(long)]
    pub print_slow_trees: bool,

    /// How many slow steps to print.
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub slow_count: usize,

    /// Maximum number of steps running at once (overrides `[build].jobs`).
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TREEBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the step graph, but don't build.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
