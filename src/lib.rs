//! Containers as test fixtures.
//!
//! `tocker` makes sure a named container, built from a declared image, is
//! running and reachable before a test that depends on it proceeds. Declare
//! the container once with a [`ContainerSpec`]; [`DockerInstance::run`]
//! reconciles the daemon's state against it, creating and starting only what
//! is missing, and blocks until an [`AliveStrategy`] says the service inside
//! is ready. A container that is already running is reused as is, so a
//! suite pays the start-up cost once.
//!
//! # Modules
//!
//! - [`alive`]: Readiness gate and stock up-checks
//! - [`config`]: Layered configuration (defaults < file < environment)
//! - [`container`]: Container specs, reconciliation and running snapshots
//! - [`engine`]: Daemon connection, the daemon trait seam and image strategies
//! - [`error`]: Semantic error types
//! - [`services`]: Ready-made wrappers for common services

pub mod alive;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod services;

pub use alive::{AliveStrategy, UpCheck};
pub use config::TockerConfig;
pub use container::{
    ContainerSpec, ContainerSpecBuilder, DockerInstance, MappedPorts, PortMap,
    RunningDockerInstance,
};
pub use engine::ImageStrategy;
pub use error::{Result, TockerError};
