// tests/config_loading.rs

mod common;

use std::ffi::OsStr;
use std::fs;
use std::time::Duration;

use clap::Parser;
use common::TestResult;
use treebuild::cli::CliArgs;
use treebuild::config::{build_steps, load_and_validate, parse_duration, parse_str, ConfigFile};
use treebuild::{pipeline_from_config, BuildError};
use treebuild_test_utils::builders::write_files;
use treebuild_test_utils::init_tracing;

const SITE_CONFIG: &str = r#"
[build]
source = "app"
jobs = 2
step_timeout = "30s"
debounce = "250ms"

[[step]]
name = "assets"
kind = "copy"
include = ["public/**"]
strip_prefix = "public"
dest = "static"

[[step]]
name = "no-debugger"
kind = "lint"
include = ["src/**/*.js"]
deny = ["\\bdebugger\\b"]

[[step]]
name = "scripts"
kind = "copy"
include = ["src/**/*.js"]
exclude = ["src/**/*.test.js"]
timeout = "5s"
"#;

fn cli(args: &[&OsStr]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once(OsStr::new("treebuild")).chain(args.iter().copied()))
}

fn validate(toml: &str) -> Result<ConfigFile, BuildError> {
    ConfigFile::try_from(parse_str(toml)?)
}

fn config_message(result: Result<ConfigFile, BuildError>) -> String {
    match result {
        Err(BuildError::Config(msg)) => msg,
        Err(other) => panic!("expected Config error, got {other:?}"),
        Ok(cfg) => panic!("expected Config error, got {cfg:?}"),
    }
}

#[test]
fn full_config_is_parsed_with_durations_and_defaults() -> TestResult {
    let cfg = validate(SITE_CONFIG)?;
    assert_eq!(cfg.build.jobs, Some(2));
    assert_eq!(cfg.build.step_timeout, Some(Duration::from_secs(30)));
    assert_eq!(cfg.build.debounce, Duration::from_millis(250));
    assert_eq!(cfg.steps.len(), 3);
    assert_eq!(cfg.steps[2].timeout, Some(Duration::from_secs(5)));
    assert_eq!(cfg.steps[0].config.inputs, vec!["source".to_string()]);
    assert!(cfg.steps[1].config.is_lint());

    let steps = build_steps(&cfg)?;
    let kinds: Vec<&str> = steps.iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec!["copy", "lint", "copy"]);
    assert!(steps[1].is_lint());
    assert!(!steps[2].input_filter().matches("src/app.test.js"));
    Ok(())
}

#[test]
fn unknown_step_kind_is_rejected_at_parse_time() {
    let result = parse_str(
        r#"
[[step]]
name = "x"
kind = "webpack"
"#,
    );
    assert!(matches!(result, Err(BuildError::Toml(_))), "got {result:?}");
}

#[test]
fn unknown_fields_are_rejected() {
    let result = parse_str(
        r#"
[[step]]
name = "x"
kind = "copy"
after = ["y"]
"#,
    );
    assert!(matches!(result, Err(BuildError::Toml(_))), "got {result:?}");
}

#[test]
fn config_without_steps_is_rejected() {
    let msg = config_message(validate("[build]\njobs = 1\n"));
    assert!(msg.contains("at least one"), "message was: {msg}");
}

#[test]
fn zero_jobs_is_rejected() {
    let msg = config_message(validate(
        "[build]\njobs = 0\n[[step]]\nname = \"a\"\nkind = \"copy\"\n",
    ));
    assert!(msg.contains("jobs"), "message was: {msg}");
}

#[test]
fn bad_duration_is_rejected() {
    let msg = config_message(validate(
        "[[step]]\nname = \"a\"\nkind = \"copy\"\ntimeout = \"5 parsecs\"\n",
    ));
    assert!(msg.contains("step 'a'"), "message was: {msg}");
}

#[test]
fn command_step_requires_cmd() {
    let msg = config_message(validate("[[step]]\nname = \"tsc\"\nkind = \"command\"\n"));
    assert!(msg.contains("cmd"), "message was: {msg}");
}

#[test]
fn lint_step_requires_deny_patterns() {
    let msg = config_message(validate("[[step]]\nname = \"l\"\nkind = \"lint\"\n"));
    assert!(msg.contains("deny"), "message was: {msg}");
}

#[test]
fn kind_specific_fields_are_checked() {
    let msg = config_message(validate(
        "[[step]]\nname = \"c\"\nkind = \"copy\"\ncmd = \"echo hi\"\n",
    ));
    assert!(msg.contains("`cmd`"), "message was: {msg}");
}

#[test]
fn duplicate_and_reserved_step_names_are_rejected() {
    let msg = config_message(validate(
        "[[step]]\nname = \"a\"\nkind = \"copy\"\n[[step]]\nname = \"a\"\nkind = \"copy\"\n",
    ));
    assert!(msg.contains("more than once"), "message was: {msg}");

    let msg = config_message(validate("[[step]]\nname = \"source\"\nkind = \"copy\"\n"));
    assert!(msg.contains("reserved"), "message was: {msg}");
}

#[test]
fn invalid_glob_is_a_config_error_when_building_steps() -> TestResult {
    let cfg = validate("[[step]]\nname = \"a\"\nkind = \"copy\"\ninclude = [\"src/[\"]\n")?;
    assert!(matches!(build_steps(&cfg), Err(BuildError::Config(_))));
    Ok(())
}

#[test]
fn parse_duration_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("ms").is_err());
    assert!(parse_duration("3d").is_err());
}

#[test]
fn oversized_durations_are_rejected_instead_of_overflowing() {
    let huge = format!("{}h", u64::MAX / 60);
    assert!(parse_duration(&huge).is_err());
    assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
    assert_eq!(
        parse_duration(&format!("{}ms", u64::MAX)),
        Ok(Duration::from_millis(u64::MAX))
    );

    let msg = config_message(validate(&format!(
        "[[step]]\nname = \"a\"\nkind = \"copy\"\ntimeout = \"{huge}\"\n"
    )));
    assert!(msg.contains("step 'a'"), "message was: {msg}");
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = load_and_validate(dir.path().join("Treebuild.toml"));
    assert!(matches!(result, Err(BuildError::Io { .. })), "got {result:?}");
}

#[tokio::test]
async fn config_driven_build_publishes_the_merged_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("Treebuild.toml");
    fs::write(&config_path, SITE_CONFIG)?;
    write_files(
        &dir.path().join("app"),
        &[
            ("public/logo.svg", "<svg/>"),
            ("src/main.js", "start();"),
            ("src/main.test.js", "test();"),
        ],
    );
    let out = dir.path().join("dist");

    let args = cli(&[
        OsStr::new("--config"),
        config_path.as_os_str(),
        OsStr::new("--output"),
        out.as_os_str(),
    ])?;
    let cfg = load_and_validate(&args.config)?;
    let pipeline = pipeline_from_config(&cfg, &args)?;
    assert_eq!(pipeline.options().parallelism, 2);
    assert!(pipeline.graph().contains("no-debugger"));

    assert!(treebuild::run(args).await?);
    assert_eq!(fs::read_to_string(out.join("static/logo.svg"))?, "<svg/>");
    assert_eq!(fs::read_to_string(out.join("src/main.js"))?, "start();");
    assert!(!out.join("src/main.test.js").exists());
    Ok(())
}

#[test]
fn production_environment_flag_drops_lint_steps() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("Treebuild.toml");
    fs::write(&config_path, SITE_CONFIG)?;

    let args = cli(&[
        OsStr::new("--config"),
        config_path.as_os_str(),
        OsStr::new("--environment"),
        OsStr::new("production"),
        OsStr::new("--jobs"),
        OsStr::new("8"),
    ])?;
    let cfg = load_and_validate(&args.config)?;
    let pipeline = pipeline_from_config(&cfg, &args)?;
    assert!(!pipeline.graph().contains("no-debugger"));
    assert_eq!(pipeline.options().parallelism, 8);
    Ok(())
}
