//! Snapshot of a started container.

use std::collections::BTreeMap;
use std::sync::Arc;

use bollard::models::ContainerInspectResponse;

use super::ports::MappedPorts;
use super::stop_container_async;
use crate::engine::DaemonClient;
use crate::error::{ContainerError, TockerError};

const PREFERRED_NETWORK: &str = "bridge";

/// What a test needs to reach a started container.
///
/// The snapshot is taken right after start and is not refreshed; after
/// [`RunningDockerInstance::stop`] its values describe the container as it
/// was.
#[derive(Clone)]
pub struct RunningDockerInstance {
    container_id: String,
    container_name: String,
    host: String,
    mapped_ports: MappedPorts,
    environment_variables: BTreeMap<String, String>,
    ip_address: Option<String>,
    client: Arc<dyn DaemonClient>,
}

impl std::fmt::Debug for RunningDockerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningDockerInstance")
            .field("container_id", &self.container_id)
            .field("container_name", &self.container_name)
            .field("host", &self.host)
            .field("mapped_ports", &self.mapped_ports)
            .field("environment_variables", &self.environment_variables)
            .field("ip_address", &self.ip_address)
            .finish_non_exhaustive()
    }
}

impl RunningDockerInstance {
    /// Build a snapshot from a container inspection.
    pub(crate) fn from_inspection(
        inspection: &ContainerInspectResponse,
        container_name: &str,
        host: &str,
        client: Arc<dyn DaemonClient>,
    ) -> Result<Self, TockerError> {
        let network_settings = inspection.network_settings.as_ref();
        let mapped_ports =
            MappedPorts::from_daemon(network_settings.and_then(|settings| settings.ports.as_ref()))?;
        let environment_variables = parse_environment(
            inspection
                .config
                .as_ref()
                .and_then(|config| config.env.as_deref())
                .unwrap_or_default(),
        )?;
        let ip_address = network_settings
            .and_then(|settings| settings.networks.as_ref())
            .and_then(|networks| {
                let preferred = networks
                    .get(PREFERRED_NETWORK)
                    .and_then(|endpoint| endpoint.ip_address.as_deref())
                    .filter(|ip| !ip.is_empty());
                preferred.or_else(|| {
                    let mut names: Vec<&String> = networks.keys().collect();
                    names.sort_unstable();
                    names
                        .into_iter()
                        .filter_map(|name| networks.get(name))
                        .filter_map(|endpoint| endpoint.ip_address.as_deref())
                        .find(|ip| !ip.is_empty())
                })
            })
            .map(String::from);

        Ok(Self {
            container_id: inspection.id.clone().unwrap_or_default(),
            container_name: String::from(container_name),
            host: String::from(host),
            mapped_ports,
            environment_variables,
            ip_address,
            client,
        })
    }

    /// The daemon-assigned container ID.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// The container name.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Host on which published ports are reachable.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Published ports.
    #[must_use]
    pub const fn mapped_ports(&self) -> &MappedPorts {
        &self.mapped_ports
    }

    /// The container's environment, including variables set by the image.
    #[must_use]
    pub const fn environment_variables(&self) -> &BTreeMap<String, String> {
        &self.environment_variables
    }

    /// The container's address on its network, if it has one.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Stop the container with a ten second grace period.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StopFailed` when the daemon refuses and
    /// `EngineError::DaemonUnreachable` when it cannot be reached.
    pub async fn stop_async(&self) -> Result<(), TockerError> {
        stop_container_async(self.client.as_ref(), &self.container_name).await
    }

    /// Stop the container, blocking on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::stop_async`].
    pub fn stop(&self, runtime: &tokio::runtime::Handle) -> Result<(), TockerError> {
        runtime.block_on(self.stop_async())
    }
}

/// Split daemon environment entries on the first `=`.
pub(crate) fn parse_environment(
    entries: &[String],
) -> Result<BTreeMap<String, String>, TockerError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (String::from(key), String::from(value)))
                .ok_or_else(|| {
                    ContainerError::MalformedEnvironmentEntry {
                        entry: entry.clone(),
                    }
                    .into()
                })
        })
        .collect()
}
