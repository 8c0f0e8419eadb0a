//! Assertion helpers for reconciliation behavioural tests.

use std::sync::atomic::Ordering;

use rstest_bdd_macros::then;
use tocker::RunningDockerInstance;

use super::StepResult;
use super::state::{ReconciliationState, RunOutcome};

fn outcome(reconciliation_state: &ReconciliationState) -> StepResult<RunOutcome> {
    reconciliation_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))
}

fn running(reconciliation_state: &ReconciliationState) -> StepResult<RunningDockerInstance> {
    match outcome(reconciliation_state)? {
        RunOutcome::Running(instance) => Ok(instance),
        RunOutcome::Failed(message) => Err(format!("expected a running container, got: {message}")),
    }
}

fn assert_count(
    reconciliation_state: &ReconciliationState,
    operation: &str,
    expected: usize,
) -> StepResult<()> {
    let actual = reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be configured"))?
        .count(operation);
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} '{operation}' calls, got {actual}"))
    }
}

#[then("the run succeeds")]
fn run_succeeds(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    running(reconciliation_state).map(drop)
}

#[then("the run fails mentioning {fragment}")]
fn run_fails_mentioning(
    reconciliation_state: &ReconciliationState,
    fragment: String,
) -> StepResult<()> {
    match outcome(reconciliation_state)? {
        RunOutcome::Failed(message) if message.contains(&fragment) => Ok(()),
        RunOutcome::Failed(message) => Err(format!(
            "expected error containing '{fragment}', got: {message}"
        )),
        RunOutcome::Running(_) => Err(format!(
            "expected error containing '{fragment}', but the run succeeded"
        )),
    }
}

#[then("the pull call count is {count}")]
fn pull_call_count(reconciliation_state: &ReconciliationState, count: usize) -> StepResult<()> {
    assert_count(reconciliation_state, "pull image", count)
}

#[then("the create call count is {count}")]
fn create_call_count(reconciliation_state: &ReconciliationState, count: usize) -> StepResult<()> {
    assert_count(reconciliation_state, "create container", count)
}

#[then("the start call count is {count}")]
fn start_call_count(reconciliation_state: &ReconciliationState, count: usize) -> StepResult<()> {
    assert_count(reconciliation_state, "start container", count)
}

#[then("the stop call count is {count}")]
fn stop_call_count(reconciliation_state: &ReconciliationState, count: usize) -> StepResult<()> {
    assert_count(reconciliation_state, "stop container", count)
}

#[then("the image was pulled before the container was created")]
fn pulled_before_created(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    let fake = reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be configured"))?;
    match (
        fake.first_index("pull image"),
        fake.first_index("create container"),
    ) {
        (Some(pull), Some(create)) if pull < create => Ok(()),
        (pull, create) => Err(format!(
            "expected pull before create, got pull at {pull:?} and create at {create:?}"
        )),
    }
}

#[then("container port {container_port} is reachable on host port {host_port}")]
fn port_is_mapped(
    reconciliation_state: &ReconciliationState,
    container_port: u16,
    host_port: u16,
) -> StepResult<()> {
    let instance = running(reconciliation_state)?;
    let actual = instance
        .mapped_ports()
        .for_container_port(container_port)
        .map_err(|e| e.to_string())?;
    if actual == host_port {
        Ok(())
    } else {
        Err(format!(
            "expected container port {container_port} on {host_port}, got {actual}"
        ))
    }
}

#[then("looking up container port {container_port} fails")]
fn port_lookup_fails(
    reconciliation_state: &ReconciliationState,
    container_port: u16,
) -> StepResult<()> {
    let instance = running(reconciliation_state)?;
    match instance.mapped_ports().for_container_port(container_port) {
        Err(e) if e.to_string().contains("not mapped") => Ok(()),
        Err(e) => Err(format!("unexpected lookup error: {e}")),
        Ok(host_port) => Err(format!(
            "expected port {container_port} to be unmapped, found {host_port}"
        )),
    }
}

#[then("the probe ran {count} times")]
fn probe_ran(reconciliation_state: &ReconciliationState, count: u32) -> StepResult<()> {
    let actual = reconciliation_state
        .probe_calls
        .get()
        .ok_or_else(|| String::from("probe counter should be configured"))?
        .load(Ordering::SeqCst);
    if actual == count {
        Ok(())
    } else {
        Err(format!("expected {count} probe calls, got {actual}"))
    }
}
