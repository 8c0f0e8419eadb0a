//! The reconciliation engine.
//!
//! `run` compares the declared [`ContainerSpec`] with what the daemon reports
//! for the container's name and performs only the missing steps:
//!
//! | Observed state          | Actions                                        |
//! |-------------------------|------------------------------------------------|
//! | running                 | none                                           |
//! | present, not running    | start                                          |
//! | absent (404)            | ensure image, create, start                    |
//!
//! Each path ends with a fresh inspection, a [`RunningDockerInstance`]
//! snapshot and the readiness gate. Any daemon failure other than the
//! container 404 is returned as is; nothing is retried.

use std::sync::Arc;

use bollard::models::ContainerInspectResponse;
use bollard::query_parameters::CreateContainerOptionsBuilder;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::running::RunningDockerInstance;
use super::spec::ContainerSpec;
use super::stop_container_async;
use crate::alive::AliveStrategy;
use crate::config::{DEFAULT_HOST_IP, TockerConfig};
use crate::engine::daemon::map_daemon_error;
use crate::engine::{DaemonClient, EngineConnector, SocketResolver, is_not_found};
use crate::error::{ContainerError, ImageError, TockerError};

/// A declared container bound to a daemon.
///
/// # Example
///
/// ```ignore
/// use tocker::{AliveStrategy, ContainerSpec, DockerInstance, PortMap, TockerConfig};
///
/// let runtime = tokio::runtime::Runtime::new()?;
/// let spec = ContainerSpec::from_image("redis:7")
///     .with_container_name("tocker-redis")
///     .mapping_ports(PortMap::of(6379, 16379))
///     .build()?;
/// let instance = DockerInstance::connect(
///     runtime.handle(),
///     spec,
///     &TockerConfig::default(),
///     &mockable::DefaultEnv::new(),
/// )?;
/// let running = instance.run_always_alive(runtime.handle())?;
/// let port = running.mapped_ports().for_container_port(6379)?;
/// ```
pub struct DockerInstance {
    spec: ContainerSpec,
    client: Arc<dyn DaemonClient>,
    host: String,
    host_ip: String,
}

impl std::fmt::Debug for DockerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerInstance")
            .field("spec", &self.spec)
            .field("host", &self.host)
            .field("host_ip", &self.host_ip)
            .finish_non_exhaustive()
    }
}

impl Drop for DockerInstance {
    fn drop(&mut self) {
        tracing::debug!(
            container = %self.spec.container_name(),
            "releasing daemon client"
        );
    }
}

impl DockerInstance {
    /// Bind `spec` to an existing daemon client.
    ///
    /// `host` is where published ports are reachable, usually
    /// [`EngineConnector::host_from_endpoint`] of the daemon endpoint.
    #[must_use]
    pub fn with_client(
        spec: ContainerSpec,
        client: Arc<dyn DaemonClient>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            spec,
            client,
            host: host.into(),
            host_ip: String::from(DEFAULT_HOST_IP),
        }
    }

    /// Publish ports on `host_ip` instead of every interface.
    #[must_use]
    pub fn with_host_ip(mut self, host_ip: impl Into<String>) -> Self {
        self.host_ip = host_ip.into();
        self
    }

    /// Connect to the configured daemon and bind `spec` to it.
    ///
    /// The endpoint is `config.engine_socket`, else the first non-empty of
    /// `DOCKER_HOST`, `CONTAINER_HOST` and `PODMAN_HOST` in `env`, else the
    /// platform default. When `engine.verify_on_connect` is set the daemon is
    /// pinged before returning.
    ///
    /// # Errors
    ///
    /// Returns an `EngineError` when the client cannot be built or the
    /// daemon does not answer the ping.
    pub async fn connect_async<E: mockable::Env>(
        spec: ContainerSpec,
        config: &TockerConfig,
        env: &E,
    ) -> Result<Self, TockerError> {
        let resolver = SocketResolver::new(env);
        let socket = EngineConnector::resolve_socket(config.engine_socket.as_deref(), &resolver);
        tracing::debug!(socket = %socket, "connecting to container daemon");

        let docker = EngineConnector::connect(&socket)?;
        if config.engine.verify_on_connect {
            EngineConnector::health_check_async(&docker).await?;
        }

        let host = EngineConnector::host_from_endpoint(&socket);
        Ok(Self::with_client(spec, Arc::new(docker), host).with_host_ip(config.ports.host_ip.clone()))
    }

    /// Connect to the configured daemon, blocking on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::connect_async`].
    pub fn connect<E: mockable::Env>(
        runtime: &tokio::runtime::Handle,
        spec: ContainerSpec,
        config: &TockerConfig,
        env: &E,
    ) -> Result<Self, TockerError> {
        runtime.block_on(Self::connect_async(spec, config, env))
    }

    /// The declared container.
    #[must_use]
    pub const fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    /// Host on which published ports are reachable.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Reconcile the container and wait until `alive` passes.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError`, `ImageError` or `FilesystemError` when a
    /// step fails, `EngineError::DaemonUnreachable` when the daemon cannot be
    /// reached, and a `LivenessError` when the gate fails or is cancelled.
    pub async fn run_async(
        &self,
        alive: &AliveStrategy,
        cancel: &CancellationToken,
    ) -> Result<RunningDockerInstance, TockerError> {
        let span = tracing::info_span!("run", container = %self.spec.container_name());
        async {
            let instance = self.reconcile_async().await?;
            alive.wait_until_alive(&instance, cancel).await?;
            Ok(instance)
        }
        .instrument(span)
        .await
    }

    /// Reconcile the container and wait until `alive` passes, blocking on
    /// `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::run_async`], except that the gate
    /// cannot be cancelled.
    pub fn run(
        &self,
        runtime: &tokio::runtime::Handle,
        alive: &AliveStrategy,
    ) -> Result<RunningDockerInstance, TockerError> {
        runtime.block_on(self.run_async(alive, &CancellationToken::new()))
    }

    /// Reconcile the container without a readiness gate.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::run`].
    pub fn run_always_alive(
        &self,
        runtime: &tokio::runtime::Handle,
    ) -> Result<RunningDockerInstance, TockerError> {
        self.run(runtime, &AliveStrategy::AlwaysAlive)
    }

    /// Stop the container with a ten second grace period.
    ///
    /// There is no already-stopped guard; stopping a stopped container is
    /// whatever the daemon makes of it.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StopFailed` when the daemon refuses and
    /// `EngineError::DaemonUnreachable` when it cannot be reached.
    pub async fn stop_async(&self) -> Result<(), TockerError> {
        stop_container_async(self.client.as_ref(), self.spec.container_name()).await
    }

    /// Stop the container, blocking on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::stop_async`].
    pub fn stop(&self, runtime: &tokio::runtime::Handle) -> Result<(), TockerError> {
        runtime.block_on(self.stop_async())
    }

    /// Release this instance's handle on the daemon client.
    ///
    /// Same as dropping the instance, for call sites that end its use
    /// explicitly. Snapshots already returned by `run` keep their own handle.
    pub fn close(self) {
        drop(self);
    }

    async fn reconcile_async(&self) -> Result<RunningDockerInstance, TockerError> {
        let name = self.spec.container_name();

        match self.client.inspect_container(name).await {
            Ok(inspection) if is_running(&inspection) => {
                tracing::info!("container already running");
                self.snapshot(&inspection)
            }
            Ok(inspection) => {
                let container_id = inspection.id.unwrap_or_else(|| String::from(name));
                tracing::info!(container_id = %container_id, "starting existing container");
                self.start_and_snapshot_async(&container_id).await
            }
            Err(error) if is_not_found(&error) => {
                tracing::debug!("container absent");
                self.ensure_image_async().await?;
                let container_id = self.create_async().await?;
                self.start_and_snapshot_async(&container_id).await
            }
            Err(error) => Err(self.inspect_failure(&error)),
        }
    }

    async fn ensure_image_async(&self) -> Result<(), TockerError> {
        let image = self.spec.image_reference();

        match self.client.inspect_image(image).await {
            Ok(_) => {
                tracing::debug!(image = %image, "image present");
                Ok(())
            }
            Err(error) if is_not_found(&error) => {
                tracing::info!(image = %image, "image missing");
                self.spec
                    .image_strategy()
                    .materialize_async(self.client.as_ref())
                    .await
            }
            Err(error) => Err(map_daemon_error("inspect image", &error, |message| {
                TockerError::from(ImageError::InspectFailed {
                    image: String::from(image),
                    message,
                })
            })),
        }
    }

    async fn create_async(&self) -> Result<String, TockerError> {
        let name = self.spec.container_name();
        let options = CreateContainerOptionsBuilder::new().name(name).build();
        let body = self.spec.create_body(&self.host_ip);

        let response = self
            .client
            .create_container(Some(options), body)
            .await
            .map_err(|error| {
                map_daemon_error("create container", &error, |message| {
                    TockerError::from(ContainerError::CreateFailed {
                        container: String::from(name),
                        message,
                    })
                })
            })?;

        for warning in &response.warnings {
            tracing::warn!(warning = %warning, "daemon warning on create");
        }
        tracing::info!(container_id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start_and_snapshot_async(
        &self,
        container_id: &str,
    ) -> Result<RunningDockerInstance, TockerError> {
        self.client
            .start_container(container_id)
            .await
            .map_err(|error| {
                map_daemon_error("start container", &error, |message| {
                    TockerError::from(ContainerError::StartFailed {
                        container_id: String::from(container_id),
                        message,
                    })
                })
            })?;
        tracing::info!(container_id = %container_id, "container started");

        let inspection = self
            .client
            .inspect_container(self.spec.container_name())
            .await
            .map_err(|error| self.inspect_failure(&error))?;
        self.snapshot(&inspection)
    }

    fn snapshot(
        &self,
        inspection: &ContainerInspectResponse,
    ) -> Result<RunningDockerInstance, TockerError> {
        RunningDockerInstance::from_inspection(
            inspection,
            self.spec.container_name(),
            &self.host,
            Arc::clone(&self.client),
        )
    }

    fn inspect_failure(&self, error: &bollard::errors::Error) -> TockerError {
        map_daemon_error("inspect container", error, |message| {
            TockerError::from(ContainerError::InspectFailed {
                container: String::from(self.spec.container_name()),
                message,
            })
        })
    }
}

fn is_running(inspection: &ContainerInspectResponse) -> bool {
    inspection
        .state
        .as_ref()
        .and_then(|state| state.running)
        .unwrap_or(false)
}
