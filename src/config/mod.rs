//! Configuration system for tocker.
//!
//! Defaults suit a local Docker or Podman daemon; CI jobs override them
//! through a TOML file or `TOCKER_*` environment variables. Precedence,
//! lowest to highest: defaults, configuration file, environment variables.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/podman/podman.sock"
//!
//! [engine]
//! verify_on_connect = true
//!
//! [liveness]
//! max_attempts = 100
//! delay_ms = 50
//! deadline_ms = 30000
//!
//! [ports]
//! host_ip = "127.0.0.1"
//! ```

mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use loader::{CONFIG_PATH_ENV_VAR, env_var_names, load_config};
pub use types::{
    DEFAULT_DELAY_MS, DEFAULT_HOST_IP, DEFAULT_MAX_ATTEMPTS, EngineConfig, LivenessConfig,
    PortsConfig, TockerConfig,
};
