//! Configuration data types for tocker.

use std::net::IpAddr;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default number of liveness attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Default pause between liveness attempts, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 10;

/// Default address published ports are bound to.
pub const DEFAULT_HOST_IP: &str = "0.0.0.0";

/// Daemon connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ping the daemon right after connecting.
    pub verify_on_connect: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_on_connect: true,
        }
    }
}

/// Readiness gate settings used by [`crate::AliveStrategy::from_config`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// How many times the up-check runs before the gate gives up.
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    pub delay_ms: u64,

    /// Overall limit for the gate in milliseconds.
    pub deadline_ms: Option<u64>,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_DELAY_MS,
            deadline_ms: None,
        }
    }
}

/// Port publishing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Host address published ports are bound to.
    pub host_ip: String,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            host_ip: String::from(DEFAULT_HOST_IP),
        }
    }
}

/// Root configuration.
///
/// Loaded with layered precedence, lowest to highest: defaults,
/// configuration file, environment variables.
///
/// Configuration files are discovered in this order:
/// 1. An explicit path passed to [`crate::config::load_config`]
/// 2. Path specified via the `TOCKER_CONFIG_PATH` environment variable
/// 3. `.tocker.toml` in the current working directory
/// 4. `.tocker.toml` in the home directory
/// 5. `~/.config/tocker/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "TOCKER",
    post_merge_hook,
    discovery(
        app_name = "tocker",
        env_var = "TOCKER_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".tocker.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct TockerConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// Daemon connection settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub engine: EngineConfig,

    /// Readiness gate settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub liveness: LivenessConfig,

    /// Port publishing settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub ports: PortsConfig,
}

impl TockerConfig {
    /// Treat blank strings as unset.
    pub(crate) fn normalise(&mut self) {
        self.engine_socket = self
            .engine_socket
            .take()
            .map(|socket| String::from(socket.trim()))
            .filter(|socket| !socket.is_empty());

        let host_ip = self.ports.host_ip.trim();
        self.ports.host_ip = if host_ip.is_empty() {
            String::from(DEFAULT_HOST_IP)
        } else {
            String::from(host_ip)
        };
    }

    /// Check values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when `liveness.max_attempts` is
    /// zero or `ports.host_ip` is not an IP address.
    pub fn validate(&self) -> Result<()> {
        if self.liveness.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: String::from("liveness.max_attempts"),
                reason: String::from("must be at least 1"),
            }
            .into());
        }

        if self.ports.host_ip.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: String::from("ports.host_ip"),
                reason: format!("'{}' is not an IP address", self.ports.host_ip),
            }
            .into());
        }

        Ok(())
    }
}

impl PostMergeHook for TockerConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        self.normalise();
        Ok(())
    }
}
