//! Daemon endpoint resolution and client construction.
//!
//! An endpoint comes from configuration, then the `DOCKER_HOST`,
//! `CONTAINER_HOST` and `PODMAN_HOST` variables, then the platform default.
//! The same string also decides which host published ports are reachable on.

mod error_classification;
mod health_check;

use bollard::Docker;

pub(crate) use error_classification::{classify_connection_error, is_transport_failure};

use crate::error::TockerError;

const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Client timeout in seconds for daemon API requests.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

const LOCAL_HOST: &str = "localhost";

#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Looks up a daemon endpoint in the environment.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use tocker::engine::SocketResolver;
///
/// let env = DefaultEnv::new();
/// let endpoint = SocketResolver::new(&env)
///     .resolve_from_env()
///     .unwrap_or_else(|| String::from(SocketResolver::<DefaultEnv>::default_socket()));
/// ```
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Resolve against `env`.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// The first non-empty of `DOCKER_HOST`, `CONTAINER_HOST` and
    /// `PODMAN_HOST`.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// The platform default endpoint.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// A daemon endpoint in the form Bollard connects to.
#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    /// A Unix socket or named pipe URI.
    Local(String),
    /// A plain or TLS HTTP base URL.
    Http(String),
}

impl Endpoint {
    /// Classify `socket` by scheme. `tcp://` becomes `http://`, and bare
    /// paths become `npipe://` when they start with `\\` or `//`, else
    /// `unix://`.
    fn parse(socket: &str) -> Self {
        if socket.starts_with("unix://") || socket.starts_with("npipe://") {
            return Self::Local(String::from(socket));
        }
        if let Some(authority) = socket.strip_prefix("tcp://") {
            return Self::Http(format!("http://{authority}"));
        }
        if socket.starts_with("http://") || socket.starts_with("https://") {
            return Self::Http(String::from(socket));
        }
        if socket.starts_with("\\\\") || socket.starts_with("//") {
            Self::Local(format!("npipe://{socket}"))
        } else {
            Self::Local(format!("unix://{socket}"))
        }
    }

    /// Where published ports of this daemon's containers are reachable.
    fn host(&self) -> String {
        let Self::Http(url) = self else {
            return String::from(LOCAL_HOST);
        };
        let authority = url
            .split_once("://")
            .map_or(url.as_str(), |(_, rest)| rest);
        let host_and_port = authority.split(['/', '?']).next().unwrap_or_default();
        let without_credentials = host_and_port.rsplit('@').next().unwrap_or(host_and_port);

        let host = without_credentials.strip_prefix('[').map_or_else(
            || {
                without_credentials
                    .split(':')
                    .next()
                    .unwrap_or(without_credentials)
            },
            |bracketed| bracketed.split(']').next().unwrap_or_default(),
        );

        if host.is_empty() {
            String::from(LOCAL_HOST)
        } else {
            String::from(host)
        }
    }
}

/// Builds Bollard clients for Docker or Podman daemons.
pub struct EngineConnector;

impl EngineConnector {
    /// Build a client for `socket` without contacting the daemon.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://`, `http://` and `https://`
    /// endpoints as well as bare socket paths.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConnectionFailed`, `SocketNotFound` or
    /// `PermissionDenied` if the client cannot be constructed.
    pub fn connect(socket: &str) -> Result<Docker, TockerError> {
        let connected = match Endpoint::parse(socket) {
            Endpoint::Local(uri) => {
                Docker::connect_with_socket(&uri, CONNECTION_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            Endpoint::Http(url) => {
                Docker::connect_with_http(&url, CONNECTION_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
        };
        connected.map_err(|e| TockerError::from(classify_connection_error(&e, socket)))
    }

    /// Pick the endpoint: `config_socket` when non-empty, then the
    /// environment, then the platform default.
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| String::from(SocketResolver::<E>::default_socket()))
    }

    /// The host on which containers of the daemon at `socket` publish
    /// ports.
    ///
    /// Local sockets and named pipes report `localhost`; TCP and HTTP(S)
    /// endpoints report their URL host without IPv6 brackets.
    #[must_use]
    pub fn host_from_endpoint(socket: &str) -> String {
        Endpoint::parse(socket).host()
    }
}
