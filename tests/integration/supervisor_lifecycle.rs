//! Start, observe and stop real children

use serial_test::serial;

use procwarden::models::{ChangeEventKind, LifecycleState};
use procwarden::process::is_process_alive;
use procwarden::{LaunchError, ProcessIdentity, StartOutcome};

use super::helpers::{shell, wait_until, Harness, LOOP_FOREVER, RAISE_UP, READ_SLOT};
use std::time::Duration;

#[test]
#[serial]
fn test_start_then_stop_emits_started_and_stopped() {
    let harness = Harness::new();
    let command = shell("web", 1, &format!("{READ_SLOT}{RAISE_UP}{LOOP_FOREVER}"));
    let identity = command.identity.clone();

    let outcome = harness.supervisor.start(command).unwrap();
    let process = outcome.process().clone();
    let pid = process.pid().expect("launched process has a pid");
    assert!(is_process_alive(pid));

    harness.await_state(&identity, LifecycleState::Started);
    harness.supervisor.stop(&process).unwrap();
    harness.await_state(&identity, LifecycleState::Stopped);

    assert_eq!(
        harness.kinds_of(&identity),
        vec![ChangeEventKind::Started, ChangeEventKind::Stopped]
    );
    assert!(!is_process_alive(pid));
}

#[test]
#[serial]
fn test_child_exiting_on_its_own_is_observed() {
    let harness = Harness::new();
    let command = shell("batch", 2, &format!("{READ_SLOT}{RAISE_UP}sleep 0.3\nexit 0\n"));
    let identity = command.identity.clone();

    harness.supervisor.start(command).unwrap();
    harness.await_event(&identity, ChangeEventKind::Stopped);
    harness.await_state(&identity, LifecycleState::Stopped);

    assert_eq!(
        harness.kinds_of(&identity),
        vec![ChangeEventKind::Started, ChangeEventKind::Stopped]
    );
}

#[test]
#[serial]
fn test_child_that_never_reports_stays_starting() {
    let harness = Harness::new();
    let command = shell("silent", 3, LOOP_FOREVER);
    let identity = command.identity.clone();

    let process = harness.supervisor.start(command).unwrap().process().clone();
    std::thread::sleep(Duration::from_millis(200));

    assert_eq!(
        harness.supervisor.state_of(&identity),
        Some(LifecycleState::Starting)
    );
    assert!(harness.kinds_of(&identity).is_empty());

    harness.supervisor.stop(&process).unwrap();
    harness.await_state(&identity, LifecycleState::Stopped);
    assert_eq!(harness.kinds_of(&identity), vec![ChangeEventKind::Stopped]);
}

#[test]
#[serial]
fn test_missing_program_is_unable_to_start() {
    let harness = Harness::new();
    let identity = ProcessIdentity::new("ghost", 4);
    let command =
        procwarden::CommandDescriptor::new(identity.clone(), "/nonexistent/procwarden-ghost");

    match harness.supervisor.start(command).unwrap() {
        StartOutcome::Failed { process, reason } => {
            assert_eq!(process.identity(), &identity);
            assert!(matches!(reason, LaunchError::Spawn { .. }));
        }
        StartOutcome::Launched(_) => panic!("a missing program must not launch"),
    }

    assert_eq!(
        harness.supervisor.state_of(&identity),
        Some(LifecycleState::Stopped)
    );
    assert_eq!(
        harness.kinds_of(&identity),
        vec![ChangeEventKind::UnableToStart, ChangeEventKind::Stopped]
    );
    assert!(harness.supervisor.processes().is_empty());
}

#[test]
#[serial]
fn test_restart_after_stopped() {
    let harness = Harness::new();
    let script = format!("{READ_SLOT}{RAISE_UP}{LOOP_FOREVER}");
    let identity = ProcessIdentity::new("api", 5);

    let first = harness.supervisor.start(shell("api", 5, &script)).unwrap();
    harness.await_state(&identity, LifecycleState::Started);
    harness.supervisor.stop(first.process()).unwrap();
    harness.await_state(&identity, LifecycleState::Stopped);

    let second = harness.supervisor.start(shell("api", 5, &script)).unwrap();
    assert!(second.is_launched());
    harness.await_state(&identity, LifecycleState::Started);
    assert_eq!(harness.supervisor.processes().len(), 1);

    harness.supervisor.stop_all().unwrap();
    let pid = second.process().pid().unwrap();
    assert!(!is_process_alive(pid));
}

#[test]
#[serial]
fn test_stop_all_terminates_every_child() {
    let harness = Harness::new();
    let script = format!("{READ_SLOT}{RAISE_UP}{LOOP_FOREVER}");

    let mut pids = Vec::new();
    for (key, slot) in [("a", 1), ("b", 2), ("c", 3)] {
        let outcome = harness.supervisor.start(shell(key, slot, &script)).unwrap();
        pids.push(outcome.process().pid().unwrap());
    }
    for (key, slot) in [("a", 1), ("b", 2), ("c", 3)] {
        harness.await_state(&ProcessIdentity::new(key, slot), LifecycleState::Started);
    }

    harness.supervisor.stop_all().unwrap();

    assert!(harness.supervisor.processes().is_empty());
    for pid in pids {
        assert!(wait_until(Duration::from_secs(2), || !is_process_alive(pid)));
    }
    for (key, slot) in [("a", 1), ("b", 2), ("c", 3)] {
        assert_eq!(
            harness.supervisor.state_of(&ProcessIdentity::new(key, slot)),
            Some(LifecycleState::Stopped)
        );
    }
}
