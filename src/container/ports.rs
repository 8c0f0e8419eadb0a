//! Resolved host ports of a started container.

use std::collections::{BTreeMap, HashMap};

use bollard::models::PortBinding;

use crate::error::{ContainerError, TockerError};

const TCP_PROTOCOL: &str = "tcp";

/// Container port to host port mapping as the daemon reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedPorts {
    ports: BTreeMap<u16, u16>,
}

impl MappedPorts {
    /// The host port `container_port` is published on.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::PortNotMapped` when the container does not
    /// publish `container_port`.
    pub fn for_container_port(&self, container_port: u16) -> Result<u16, TockerError> {
        self.ports
            .get(&container_port)
            .copied()
            .ok_or_else(|| {
                ContainerError::PortNotMapped {
                    port: container_port,
                }
                .into()
            })
    }

    /// Iterate over `(container_port, host_port)` pairs in port order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.ports.iter().map(|(container, host)| (*container, *host))
    }

    /// Number of published ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the container publishes no ports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Parse the `NetworkSettings.ports` table of a container inspection.
    ///
    /// Keys look like `80/tcp`. Only TCP entries are kept, and an entry with
    /// no host binding is not published and is skipped.
    pub(crate) fn from_daemon(
        reported: Option<&HashMap<String, Option<Vec<PortBinding>>>>,
    ) -> Result<Self, TockerError> {
        let mut ports = BTreeMap::new();

        for (key, bindings) in reported.into_iter().flatten() {
            let Some(container_port) = parse_port_key(key)? else {
                continue;
            };
            let Some(host_port) = first_host_port(bindings.as_deref())? else {
                continue;
            };
            ports.insert(container_port, host_port);
        }

        Ok(Self { ports })
    }
}

impl From<BTreeMap<u16, u16>> for MappedPorts {
    fn from(ports: BTreeMap<u16, u16>) -> Self {
        Self { ports }
    }
}

fn parse_port_key(key: &str) -> Result<Option<u16>, TockerError> {
    let (port, protocol) = key.split_once('/').unwrap_or((key, TCP_PROTOCOL));
    if protocol != TCP_PROTOCOL {
        return Ok(None);
    }
    port.parse::<u16>()
        .map(Some)
        .map_err(|error| malformed(key, &error))
}

fn first_host_port(bindings: Option<&[PortBinding]>) -> Result<Option<u16>, TockerError> {
    let host_port = bindings
        .unwrap_or_default()
        .iter()
        .filter_map(|binding| binding.host_port.as_deref())
        .find(|port| !port.is_empty());

    host_port
        .map(|port| port.parse::<u16>().map_err(|error| malformed(port, &error)))
        .transpose()
}

fn malformed(binding: &str, error: &std::num::ParseIntError) -> TockerError {
    ContainerError::MalformedPortBinding {
        binding: String::from(binding),
        reason: error.to_string(),
    }
    .into()
}
