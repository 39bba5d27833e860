//! Children asking the supervisor for a stop or restart

use serial_test::serial;

use procwarden::models::{ChangeEventKind, LifecycleState};

use super::helpers::{shell, Harness, LOOP_FOREVER, READ_SLOT};

// A raised `up` flag takes precedence, so these children never raise it

const ASK_FOR_STOP: &str = "touch \"$SHARED/slot-$IDX/stop\"\n";
const ASK_FOR_RESTART: &str = "touch \"$SHARED/slot-$IDX/restart\"\n";
const REPORT_OPERATIONAL: &str = "touch \"$SHARED/slot-$IDX/operational\"\n";

#[test]
#[serial]
fn test_operational_child_is_started() {
    let harness = Harness::new();
    let command = shell(
        "svc",
        1,
        &format!("{READ_SLOT}{REPORT_OPERATIONAL}{LOOP_FOREVER}"),
    );
    let identity = command.identity.clone();

    harness.supervisor.start(command).unwrap();
    harness.await_event(&identity, ChangeEventKind::Operational);
    harness.await_state(&identity, LifecycleState::Started);

    harness.supervisor.stop_all().unwrap();
}

#[test]
#[serial]
fn test_stop_request_is_reported_without_stopping() {
    let harness = Harness::new();
    let command = shell("svc", 1, &format!("{READ_SLOT}{ASK_FOR_STOP}{LOOP_FOREVER}"));
    let identity = command.identity.clone();

    let process = harness.supervisor.start(command).unwrap().process().clone();
    harness.await_event(&identity, ChangeEventKind::StopRequested);

    // Acting on the request is up to the listener
    assert!(process.pid().is_some_and(procwarden::process::is_process_alive));
    harness.supervisor.stop_all().unwrap();
}

#[test]
#[serial]
fn test_restart_request_is_reported_once() {
    let harness = Harness::new();
    let command = shell(
        "svc",
        1,
        &format!("{READ_SLOT}{ASK_FOR_RESTART}{LOOP_FOREVER}"),
    );
    let identity = command.identity.clone();

    harness.supervisor.start(command).unwrap();
    harness.await_event(&identity, ChangeEventKind::RestartRequested);
    std::thread::sleep(std::time::Duration::from_millis(150));

    let requests = harness
        .kinds_of(&identity)
        .into_iter()
        .filter(|k| *k == ChangeEventKind::RestartRequested)
        .count();
    assert_eq!(requests, 1);
    harness.supervisor.stop_all().unwrap();
}
