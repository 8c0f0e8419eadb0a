//! Given/when steps for reconciliation scenarios.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rstest_bdd_macros::{given, when};
use tocker::engine::DaemonClient;
use tocker::{AliveStrategy, ContainerSpec, DockerInstance, PortMap, UpCheck};

use super::StepResult;
use super::fake_daemon::{FakeDaemon, Presence};
use super::state::{CONTAINER_NAME, ProbeBehaviour, ReconciliationState, RunOutcome};

const IMAGE: &str = "nginx:1.27";
const CONTAINER_PORT: u16 = 80;
const HOST_PORT: u16 = 8080;
const PROBE_DELAY: Duration = Duration::from_millis(2);

fn daemon(reconciliation_state: &ReconciliationState) -> StepResult<Arc<FakeDaemon>> {
    reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be configured"))
}

#[given("the daemon has no container with that name")]
fn given_container_absent(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    daemon(reconciliation_state)?.set_presence(Presence::Absent);
    Ok(())
}

#[given("the container exists but is stopped")]
fn given_container_stopped(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    daemon(reconciliation_state)?.set_presence(Presence::Stopped);
    Ok(())
}

#[given("the container is already running")]
fn given_container_running(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    let fake = daemon(reconciliation_state)?;
    fake.publish(CONTAINER_PORT, HOST_PORT);
    fake.set_presence(Presence::Running);
    Ok(())
}

#[given("the image is present")]
fn given_image_present(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    daemon(reconciliation_state)?.set_image_present(true);
    Ok(())
}

#[given("the image is missing")]
fn given_image_missing(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    daemon(reconciliation_state)?.set_image_present(false);
    Ok(())
}

#[given("the daemon rejects container creation")]
fn given_create_rejected(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    daemon(reconciliation_state)?.reject_create();
    Ok(())
}

#[given("a probe that fails {failures} times before passing")]
fn given_flaky_probe(reconciliation_state: &ReconciliationState, failures: u32) {
    reconciliation_state
        .probe
        .set(ProbeBehaviour::FailsThenPasses(failures));
}

#[given("a probe that never passes")]
fn given_dead_probe(reconciliation_state: &ReconciliationState) {
    reconciliation_state.probe.set(ProbeBehaviour::NeverPasses);
}

fn up_check(reconciliation_state: &ReconciliationState) -> StepResult<UpCheck> {
    let behaviour = reconciliation_state
        .probe
        .get()
        .ok_or_else(|| String::from("probe should be configured"))?;
    let calls = reconciliation_state
        .probe_calls
        .get()
        .ok_or_else(|| String::from("probe counter should be configured"))?;

    Ok(UpCheck::from_fn(move || {
        let previous = calls.fetch_add(1, Ordering::SeqCst);
        match behaviour {
            ProbeBehaviour::FailsThenPasses(failures) => previous >= failures,
            ProbeBehaviour::NeverPasses => false,
        }
    }))
}

fn run_with(reconciliation_state: &ReconciliationState, alive: &AliveStrategy) -> StepResult<()> {
    let spec = ContainerSpec::from_image(IMAGE)
        .with_container_name(CONTAINER_NAME)
        .mapping_ports(PortMap::of(CONTAINER_PORT, HOST_PORT))
        .build()
        .map_err(|e| format!("failed to build spec: {e}"))?;
    let client: Arc<dyn DaemonClient> = daemon(reconciliation_state)?;
    let instance = DockerInstance::with_client(spec, client, "localhost");

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    let outcome = match instance.run(runtime.handle(), alive) {
        Ok(running) => RunOutcome::Running(running),
        Err(e) => RunOutcome::Failed(e.to_string()),
    };
    reconciliation_state.outcome.set(outcome);
    Ok(())
}

#[when("the container is run")]
fn when_container_run(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    run_with(reconciliation_state, &AliveStrategy::AlwaysAlive)
}

#[when("the container is run with {attempts} attempts")]
fn when_container_run_with_attempts(
    reconciliation_state: &ReconciliationState,
    attempts: u32,
) -> StepResult<()> {
    let alive = AliveStrategy::retrying(up_check(reconciliation_state)?, attempts, PROBE_DELAY);
    run_with(reconciliation_state, &alive)
}

#[when("the running container is stopped")]
fn when_running_container_stopped(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    let outcome = reconciliation_state
        .outcome
        .get()
        .ok_or_else(|| String::from("a run should have happened"))?;
    let RunOutcome::Running(running) = outcome else {
        return Err(String::from("the run should have succeeded before stopping"));
    };

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    running
        .stop(runtime.handle())
        .map_err(|e| format!("stop failed: {e}"))
}
