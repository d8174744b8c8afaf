// tests/watch_machine.rs

use std::collections::BTreeSet;

use treebuild::types::BuildMode;
use treebuild::watch::{ChangeQueue, WatchCommand, WatchInput, WatchMachine, WatchState};

fn paths(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn incremental(items: &[&str]) -> WatchCommand {
    WatchCommand::RunBuild {
        mode: BuildMode::Incremental,
        paths: Some(paths(items)),
    }
}

/// Drive a build that was just started through to completion.
fn finish_build(machine: &mut WatchMachine, success: bool) -> Vec<WatchCommand> {
    machine.step(WatchInput::ScanFinished { ok: true });
    machine.step(WatchInput::BuildFinished { success })
}

#[test]
fn start_runs_a_full_build() {
    let mut machine = WatchMachine::new();
    let cmds = machine.step(WatchInput::Start);
    assert_eq!(
        cmds,
        vec![WatchCommand::RunBuild {
            mode: BuildMode::Full,
            paths: None,
        }]
    );
    assert_eq!(machine.state(), WatchState::Scanning);

    assert!(finish_build(&mut machine, true).is_empty());
    assert_eq!(machine.state(), WatchState::Idle);
    assert_eq!(
        machine.transitions(),
        [
            (WatchState::Idle, WatchState::Scanning),
            (WatchState::Scanning, WatchState::Building),
            (WatchState::Building, WatchState::Idle),
        ]
    );
}

#[test]
fn changes_while_idle_start_an_incremental_build() {
    let mut machine = WatchMachine::new();
    machine.step(WatchInput::Start);
    finish_build(&mut machine, true);

    let cmds = machine.step(WatchInput::ChangesObserved(paths(&["src/a.ts"])));
    assert_eq!(cmds, vec![incremental(&["src/a.ts"])]);
}

#[test]
fn changes_during_a_build_are_coalesced_into_one_follow_up() {
    let mut machine = WatchMachine::new();
    machine.step(WatchInput::Start);

    assert!(machine.step(WatchInput::ChangesObserved(paths(&["a.ts"]))).is_empty());
    machine.step(WatchInput::ScanFinished { ok: true });
    assert!(machine
        .step(WatchInput::ChangesObserved(paths(&["b.ts", "a.ts"])))
        .is_empty());
    assert_eq!(machine.pending_changes(), 2);

    let cmds = machine.step(WatchInput::BuildFinished { success: true });
    assert_eq!(cmds, vec![incremental(&["a.ts", "b.ts"])]);
    assert_eq!(machine.pending_changes(), 0);
    assert_eq!(machine.state(), WatchState::Scanning);
}

#[test]
fn empty_change_batch_is_ignored() {
    let mut machine = WatchMachine::new();
    assert!(machine.step(WatchInput::ChangesObserved(BTreeSet::new())).is_empty());
    assert_eq!(machine.state(), WatchState::Idle);
    assert!(machine.transitions().is_empty());
}

#[test]
fn failed_build_passes_through_failed_and_keeps_watching() {
    let mut machine = WatchMachine::new();
    machine.step(WatchInput::Start);
    finish_build(&mut machine, false);

    assert_eq!(machine.state(), WatchState::Idle);
    assert!(machine
        .transitions()
        .contains(&(WatchState::Building, WatchState::Failed)));

    let cmds = machine.step(WatchInput::ChangesObserved(paths(&["fix.ts"])));
    assert_eq!(cmds, vec![incremental(&["fix.ts"])]);
}

#[test]
fn scan_failure_goes_to_failed_then_idle() {
    let mut machine = WatchMachine::new();
    machine.step(WatchInput::Start);
    machine.step(WatchInput::ScanFinished { ok: false });
    assert_eq!(machine.state(), WatchState::Failed);

    assert!(machine.step(WatchInput::BuildFinished { success: false }).is_empty());
    assert_eq!(machine.state(), WatchState::Idle);
}

#[test]
fn stop_while_idle_stops_immediately() {
    let mut machine = WatchMachine::new();
    assert_eq!(machine.step(WatchInput::StopRequested), vec![WatchCommand::Stop]);
    assert_eq!(machine.state(), WatchState::Stopped);

    // Everything after a stop is ignored.
    assert!(machine.step(WatchInput::Start).is_empty());
    assert!(machine
        .step(WatchInput::ChangesObserved(paths(&["a"])))
        .is_empty());
}

#[test]
fn stop_during_a_build_waits_for_it_and_drops_queued_changes() {
    let mut machine = WatchMachine::new();
    machine.step(WatchInput::Start);
    machine.step(WatchInput::ScanFinished { ok: true });
    machine.step(WatchInput::ChangesObserved(paths(&["late.ts"])));

    assert!(machine.step(WatchInput::StopRequested).is_empty());
    assert_eq!(machine.state(), WatchState::Building);

    let cmds = machine.step(WatchInput::BuildFinished { success: true });
    assert_eq!(cmds, vec![WatchCommand::Stop]);
    assert_eq!(machine.state(), WatchState::Stopped);
}

#[test]
fn change_queue_unions_and_drains_once() {
    let mut queue = ChangeQueue::new();
    assert!(queue.drain().is_none());

    queue.push(paths(&["a", "b"]));
    queue.push(paths(&["b", "c"]));
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.drain(), Some(paths(&["a", "b", "c"])));
    assert!(queue.is_empty());
    assert!(queue.drain().is_none());
}
