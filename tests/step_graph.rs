// tests/step_graph.rs

mod common;

use std::collections::BTreeSet;

use common::{pass, source_step, TestResult};
use treebuild::dag::StepGraph;
use treebuild::step::InputFilter;
use treebuild::BuildError;

fn paths(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn dependency_message(result: Result<StepGraph, BuildError>) -> String {
    match result {
        Err(BuildError::Dependency(msg)) => msg,
        Err(other) => panic!("expected Dependency error, got {other:?}"),
        Ok(_) => panic!("expected Dependency error, got Ok"),
    }
}

#[test]
fn duplicate_step_name_is_rejected() {
    let msg = dependency_message(StepGraph::build(&[source_step("js"), source_step("js")]));
    assert!(msg.contains("'js'"), "message was: {msg}");
    assert!(msg.contains("more than once"), "message was: {msg}");
}

#[test]
fn reserved_source_name_is_rejected() {
    let msg = dependency_message(StepGraph::build(&[pass("source")]));
    assert!(msg.contains("reserved"), "message was: {msg}");
}

#[test]
fn empty_step_name_is_rejected() {
    let msg = dependency_message(StepGraph::build(&[pass("  ")]));
    assert!(msg.contains("empty"), "message was: {msg}");
}

#[test]
fn unknown_input_names_both_steps() {
    let msg = dependency_message(StepGraph::build(&[pass("bundle").input("transpile")]));
    assert!(msg.contains("'bundle'"), "message was: {msg}");
    assert!(msg.contains("'transpile'"), "message was: {msg}");
}

#[test]
fn cycle_error_carries_the_full_path() {
    let steps = [
        pass("a").input("c"),
        pass("b").input("a"),
        pass("c").input("b"),
    ];
    let msg = dependency_message(StepGraph::build(&steps));
    assert!(msg.starts_with("cycle detected: "), "message was: {msg}");

    let path: Vec<&str> = msg["cycle detected: ".len()..].split(" -> ").collect();
    assert_eq!(path.len(), 4, "closed path expected, got {path:?}");
    assert_eq!(path.first(), path.last());
    for name in ["a", "b", "c"] {
        assert!(path.contains(&name), "cycle path {path:?} misses {name}");
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let msg = dependency_message(StepGraph::build(&[pass("a").input("source").input("a")]));
    assert_eq!(msg, "cycle detected: a -> a");
}

#[test]
fn topological_order_breaks_ties_by_declaration() -> TestResult {
    // Declared out of dependency order on purpose.
    let steps = [
        pass("bundle").input("transpile").input("styles"),
        source_step("styles"),
        source_step("transpile"),
        pass("minify").input("bundle"),
        source_step("images"),
    ];
    let graph = StepGraph::build(&steps)?;

    assert_eq!(
        graph.topological_order(),
        ["styles", "transpile", "bundle", "minify", "images"]
    );
    assert_eq!(graph.position_of("bundle"), Some(2));
    assert_eq!(graph.leaves(), vec!["minify", "images"]);
    Ok(())
}

#[test]
fn duplicate_inputs_produce_a_single_edge() -> TestResult {
    let graph = StepGraph::build(&[source_step("a"), pass("b").input("a").input("a")])?;
    assert_eq!(graph.dependencies_of("b"), vec!["a"]);
    assert_eq!(graph.dependents_of("a"), vec!["b"]);
    Ok(())
}

#[test]
fn transitive_dependents_excludes_the_step_itself() -> TestResult {
    let graph = StepGraph::build(&[
        source_step("a"),
        pass("b").input("a"),
        pass("c").input("b"),
        source_step("d"),
    ])?;

    assert_eq!(graph.transitive_dependents("a"), paths(&["b", "c"]));
    assert!(graph.transitive_dependents("d").is_empty());
    assert!(graph.transitive_dependents("missing").is_empty());
    Ok(())
}

#[test]
fn affected_by_follows_filters_and_propagates_downstream() -> TestResult {
    let ts = InputFilter::include(["src/**/*.ts"])?;
    let css = InputFilter::include(["styles/**"])?;
    let graph = StepGraph::build(&[
        source_step("transpile").filter(ts),
        source_step("styles").filter(css),
        pass("bundle").input("transpile"),
        pass("site").input("bundle").input("styles"),
    ])?;

    assert_eq!(
        graph.affected_by(&paths(&["src/app.ts"])),
        paths(&["transpile", "bundle", "site"])
    );
    assert_eq!(
        graph.affected_by(&paths(&["styles/main.css"])),
        paths(&["styles", "site"])
    );
    assert!(graph.affected_by(&paths(&["README.md"])).is_empty());
    assert!(graph.affected_by(&BTreeSet::new()).is_empty());
    Ok(())
}

#[test]
fn unfiltered_source_readers_are_affected_by_any_path() -> TestResult {
    let graph = StepGraph::build(&[source_step("copy"), pass("derived").input("copy")])?;
    assert_eq!(
        graph.affected_by(&paths(&["anything/at/all.txt"])),
        paths(&["copy", "derived"])
    );
    Ok(())
}

#[test]
fn steps_without_source_are_never_directly_affected() -> TestResult {
    let graph = StepGraph::build(&[pass("generated")])?;
    assert!(!graph.reads_source("generated"));
    assert!(graph.affected_by(&paths(&["src/a.ts"])).is_empty());
    Ok(())
}
