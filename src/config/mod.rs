// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model and its validated form.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: per-step checks and duration parsing.
//! - `steps.rs`: building [`TransformStep`](crate::step::TransformStep)s.

pub mod loader;
pub mod model;
pub mod steps;
pub mod validate;

pub use loader::{config_dir, load_and_validate, load_from_path, parse_str, DEFAULT_CONFIG_FILE};
pub use model::{BuildSettings, ConfigFile, RawConfigFile, StepConfig, StepKind, StepSpec};
pub use steps::build_steps;
pub use validate::parse_duration;
