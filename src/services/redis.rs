//! A Redis server container that is ready once it answers `PING`.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::alive::AliveStrategy;
use crate::alive::up_checks::{connect, error_is_down};
use crate::config::TockerConfig;
use crate::container::{ContainerSpec, DockerInstance, PortMap, RunningDockerInstance};
use crate::engine::DaemonClient;
use crate::error::TockerError;

/// The image Redis containers are created from.
pub const REDIS_IMAGE: &str = "redis";

/// The port Redis listens on inside its container.
pub const REDIS_PORT: u16 = 6379;

const PING_ATTEMPTS: u32 = 50;
const PING_DELAY: Duration = Duration::from_millis(10);
const IO_TIMEOUT: Duration = Duration::from_secs(1);
const PING_COMMAND: &[u8] = b"*1\r\n$4\r\nPING\r\n";
const PONG_REPLY: &str = "+PONG";

/// A Redis container published on a fixed host port.
#[derive(Debug)]
pub struct RedisInstance {
    instance: DockerInstance,
    port: u16,
}

impl RedisInstance {
    /// The container declaration for Redis on `port`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `container_name` is blank.
    pub fn spec(port: u16, container_name: &str) -> Result<ContainerSpec, TockerError> {
        ContainerSpec::from_image(REDIS_IMAGE)
            .mapping_ports(PortMap::of(REDIS_PORT, port))
            .with_container_name(container_name)
            .build()
    }

    /// Connect to the configured daemon and declare Redis on `port`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::spec`] and [`DockerInstance::connect`].
    pub fn new<E: mockable::Env>(
        runtime: &tokio::runtime::Handle,
        port: u16,
        container_name: &str,
        config: &TockerConfig,
        env: &E,
    ) -> Result<Self, TockerError> {
        let spec = Self::spec(port, container_name)?;
        let instance = DockerInstance::connect(runtime, spec, config, env)?;
        Ok(Self { instance, port })
    }

    /// Declare Redis on `port` against an existing daemon client.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::spec`].
    pub fn with_client(
        port: u16,
        container_name: &str,
        client: Arc<dyn DaemonClient>,
        host: impl Into<String>,
    ) -> Result<Self, TockerError> {
        let spec = Self::spec(port, container_name)?;
        Ok(Self {
            instance: DockerInstance::with_client(spec, client, host),
            port,
        })
    }

    /// Fifty `PING`s, ten milliseconds apart.
    #[must_use]
    pub fn alive_strategy() -> AliveStrategy {
        let up_check = error_is_down(|instance: &RunningDockerInstance| {
            let host_port = instance
                .mapped_ports()
                .for_container_port(REDIS_PORT)
                .map_err(|error| io::Error::other(error.to_string()))?;
            ping(instance.host(), host_port)
        });
        AliveStrategy::retrying(up_check, PING_ATTEMPTS, PING_DELAY)
    }

    /// Make sure Redis is running and answering `PING`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DockerInstance::run_async`].
    pub async fn is_running_async(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RunningDockerInstance, TockerError> {
        self.instance
            .run_async(&Self::alive_strategy(), cancel)
            .await
    }

    /// Make sure Redis is running and answering `PING`, blocking on
    /// `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DockerInstance::run`].
    pub fn is_running(
        &self,
        runtime: &tokio::runtime::Handle,
    ) -> Result<RunningDockerInstance, TockerError> {
        self.instance.run(runtime, &Self::alive_strategy())
    }

    /// Host on which Redis is reachable.
    #[must_use]
    pub fn host(&self) -> &str {
        self.instance.host()
    }

    /// Host port Redis is published on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Stop the Redis container.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DockerInstance::stop`].
    pub fn stop(&self, runtime: &tokio::runtime::Handle) -> Result<(), TockerError> {
        self.instance.stop(runtime)
    }
}

/// Send a RESP `PING` to `host:port` and expect `+PONG`.
///
/// # Errors
///
/// Returns the I/O error when the server cannot be reached and
/// `io::ErrorKind::InvalidData` when it answers anything else.
pub fn ping(host: &str, port: u16) -> io::Result<()> {
    let mut stream = connect(host, port)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;
    stream.write_all(PING_COMMAND)?;

    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply)?;
    let trimmed = reply.trim_end();
    if trimmed == PONG_REPLY {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected PING reply '{trimmed}'"),
        ))
    }
}
