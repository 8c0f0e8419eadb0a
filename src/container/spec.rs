//! Declarative description of the container a test depends on.

use std::collections::{BTreeMap, HashMap};

use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use camino::Utf8PathBuf;

use super::running::parse_environment;
use crate::engine::ImageStrategy;
use crate::error::{ConfigError, TockerError};

/// One container-to-host port publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortMap {
    container_port: u16,
    host_port: u16,
}

impl PortMap {
    /// Publish `container_port` on `host_port`.
    #[must_use]
    pub const fn of(container_port: u16, host_port: u16) -> Self {
        Self {
            container_port,
            host_port,
        }
    }

    /// The port the service listens on inside the container.
    #[must_use]
    pub const fn container_port(&self) -> u16 {
        self.container_port
    }

    /// The host port the daemon publishes it on.
    #[must_use]
    pub const fn host_port(&self) -> u16 {
        self.host_port
    }
}

/// Everything needed to create the container, fixed once built.
///
/// Construct one through [`ContainerSpec::from_image`] or
/// [`ContainerSpec::from_build_context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    image_strategy: ImageStrategy,
    container_name: String,
    env: Vec<String>,
    command: Vec<String>,
    port_bindings: BTreeMap<u16, u16>,
    privileged: bool,
    binds: Vec<String>,
}

impl ContainerSpec {
    /// Start a spec whose image is pulled from a registry when missing.
    #[must_use]
    pub fn from_image(image: impl Into<String>) -> ContainerSpecBuilder {
        ContainerSpecBuilder::new(ImageStrategy::Pull {
            image: image.into(),
        })
    }

    /// Start a spec whose image is built from `context_dir` when missing.
    ///
    /// The directory must contain a `Dockerfile`; the built image is tagged
    /// `image`.
    #[must_use]
    pub fn from_build_context(
        context_dir: impl Into<Utf8PathBuf>,
        image: impl Into<String>,
    ) -> ContainerSpecBuilder {
        ContainerSpecBuilder::new(ImageStrategy::Build {
            context_dir: context_dir.into(),
            image: image.into(),
        })
    }

    /// The image reference containers are created from.
    #[must_use]
    pub fn image_reference(&self) -> &str {
        self.image_strategy.image()
    }

    /// How a missing image is produced.
    #[must_use]
    pub const fn image_strategy(&self) -> &ImageStrategy {
        &self.image_strategy
    }

    /// The name the container is reconciled by.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Environment entries in `KEY=VALUE` form.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Command override; empty keeps the image default.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Declared publications, keyed by container port.
    #[must_use]
    pub const fn port_bindings(&self) -> &BTreeMap<u16, u16> {
        &self.port_bindings
    }

    /// Exposed ports derived from the bindings, as `"<port>/tcp"`.
    #[must_use]
    pub fn exposed_ports(&self) -> Vec<String> {
        self.port_bindings.keys().map(|port| tcp_port_key(*port)).collect()
    }

    /// Whether the container runs privileged.
    #[must_use]
    pub const fn privileged(&self) -> bool {
        self.privileged
    }

    /// Bind mounts in `host:container[:opts]` form.
    #[must_use]
    pub fn binds(&self) -> &[String] {
        &self.binds
    }

    /// Translate the spec into a create request publishing on `host_ip`.
    pub(crate) fn create_body(&self, host_ip: &str) -> ContainerCreateBody {
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = self
            .port_bindings
            .iter()
            .map(|(container_port, host_port)| {
                (
                    tcp_port_key(*container_port),
                    Some(vec![PortBinding {
                        host_ip: Some(String::from(host_ip)),
                        host_port: Some(host_port.to_string()),
                    }]),
                )
            })
            .collect();

        let host_config = HostConfig {
            port_bindings: non_empty_map(port_bindings),
            privileged: Some(self.privileged),
            binds: non_empty(self.binds.clone()),
            ..HostConfig::default()
        };

        ContainerCreateBody {
            image: Some(String::from(self.image_reference())),
            env: non_empty(self.env.clone()),
            cmd: non_empty(self.command.clone()),
            exposed_ports: non_empty(self.exposed_ports()),
            host_config: Some(host_config),
            ..ContainerCreateBody::default()
        }
    }
}

/// Accumulates container settings until [`ContainerSpecBuilder::build`].
#[derive(Debug, Clone)]
pub struct ContainerSpecBuilder {
    image_strategy: ImageStrategy,
    container_name: Option<String>,
    env: Vec<String>,
    command: Vec<String>,
    ports: Vec<PortMap>,
    privileged: bool,
    binds: Vec<String>,
}

impl ContainerSpecBuilder {
    const fn new(image_strategy: ImageStrategy) -> Self {
        Self {
            image_strategy,
            container_name: None,
            env: vec![],
            command: vec![],
            ports: vec![],
            privileged: false,
            binds: vec![],
        }
    }

    /// Name the container. Required.
    #[must_use]
    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    /// Publish a container port on a host port. May be repeated.
    #[must_use]
    pub fn mapping_ports(mut self, port_map: PortMap) -> Self {
        self.ports.push(port_map);
        self
    }

    /// Add one `KEY=VALUE` environment entry.
    #[must_use]
    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }

    /// Add several `KEY=VALUE` environment entries.
    #[must_use]
    pub fn with_envs<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Override the image's command.
    #[must_use]
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Add a bind mount in `host:container[:opts]` form.
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.binds.push(bind.into());
        self
    }

    /// Run the container privileged.
    #[must_use]
    pub const fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Validate and freeze the spec.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when the image reference or
    /// container name is empty, `ConfigError::InvalidValue` when a
    /// container port is mapped twice, and
    /// `ContainerError::MalformedEnvironmentEntry` when an environment entry
    /// has no `=`.
    pub fn build(self) -> Result<ContainerSpec, TockerError> {
        if self.image_strategy.image().trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: String::from("image"),
            }
            .into());
        }

        let container_name = self
            .container_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: String::from("container_name"),
            })?;

        parse_environment(&self.env)?;

        let mut port_bindings = BTreeMap::new();
        for port_map in &self.ports {
            if port_bindings
                .insert(port_map.container_port(), port_map.host_port())
                .is_some()
            {
                return Err(ConfigError::InvalidValue {
                    field: String::from("port_bindings"),
                    reason: format!(
                        "container port {} declared twice",
                        port_map.container_port()
                    ),
                }
                .into());
            }
        }

        Ok(ContainerSpec {
            image_strategy: self.image_strategy,
            container_name,
            env: self.env,
            command: self.command,
            port_bindings,
            privileged: self.privileged,
            binds: self.binds,
        })
    }
}

fn tcp_port_key(port: u16) -> String {
    format!("{port}/tcp")
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn non_empty_map<K, V>(values: HashMap<K, V>) -> Option<HashMap<K, V>> {
    (!values.is_empty()).then_some(values)
}
