//! Scenario state for reconciliation behavioural tests.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tocker::RunningDockerInstance;

use super::fake_daemon::FakeDaemon;

/// Container name every scenario declares.
pub(crate) const CONTAINER_NAME: &str = "tocker-bdd-web";

/// How the readiness probe behaves.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ProbeBehaviour {
    /// Report down this many times, then up.
    FailsThenPasses(u32),
    /// Always report down.
    NeverPasses,
}

/// Outcome of the most recent run.
#[derive(Debug, Clone)]
pub(crate) enum RunOutcome {
    /// The run returned a snapshot.
    Running(RunningDockerInstance),
    /// The run failed with this message.
    Failed(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct ReconciliationState {
    pub(crate) daemon: Slot<Arc<FakeDaemon>>,
    pub(crate) probe: Slot<ProbeBehaviour>,
    pub(crate) probe_calls: Slot<Arc<AtomicU32>>,
    pub(crate) outcome: Slot<RunOutcome>,
}

#[fixture]
pub(crate) fn reconciliation_state() -> ReconciliationState {
    let state = ReconciliationState::default();
    state.daemon.set(Arc::new(FakeDaemon::new()));
    state.probe_calls.set(Arc::new(AtomicU32::new(0)));
    state
}
