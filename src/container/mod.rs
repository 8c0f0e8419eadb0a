//! Declared containers, their reconciliation and their running snapshots.
//!
//! A [`ContainerSpec`] says what should run. A [`DockerInstance`] makes the
//! daemon agree, creating and starting only what is missing, and hands back
//! a [`RunningDockerInstance`] once the readiness gate passes.

mod instance;
mod ports;
mod running;
mod spec;

use bollard::query_parameters::StopContainerOptionsBuilder;

pub use instance::DockerInstance;
pub use ports::MappedPorts;
pub use running::RunningDockerInstance;
pub use spec::{ContainerSpec, ContainerSpecBuilder, PortMap};

use crate::engine::DaemonClient;
use crate::engine::daemon::map_daemon_error;
use crate::error::{ContainerError, TockerError};

/// Seconds a container gets to exit after the stop signal before it is killed.
pub const STOP_GRACE_SECS: i32 = 10;

/// Stop `container_name` with the standard grace period.
async fn stop_container_async(
    client: &dyn DaemonClient,
    container_name: &str,
) -> Result<(), TockerError> {
    tracing::info!(container = %container_name, grace_secs = STOP_GRACE_SECS, "stopping container");
    let options = StopContainerOptionsBuilder::new().t(STOP_GRACE_SECS).build();

    client
        .stop_container(container_name, Some(options))
        .await
        .map_err(|error| {
            map_daemon_error("stop container", &error, |message| {
                TockerError::from(ContainerError::StopFailed {
                    container: String::from(container_name),
                    message,
                })
            })
        })?;

    tracing::info!(container = %container_name, "container stopped");
    Ok(())
}
