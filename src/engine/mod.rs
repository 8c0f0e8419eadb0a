//! Container daemon access.
//!
//! The daemon endpoint is resolved through a priority-based fallback chain:
//!
//! 1. Config file or `TOCKER_ENGINE_SOCKET` (`engine_socket`)
//! 2. `DOCKER_HOST` environment variable
//! 3. `CONTAINER_HOST` environment variable
//! 4. `PODMAN_HOST` environment variable
//! 5. Platform default (`/var/run/docker.sock` on Unix)
//!
//! Reconciliation talks to the daemon only through [`DaemonClient`], which
//! `bollard::Docker` implements.

mod connection;
pub(crate) mod daemon;
mod image;

pub use connection::{EngineConnector, SocketResolver};
pub use daemon::{DaemonClient, DaemonFuture, is_not_found};
pub use image::{ImageStrategy, parse_image_ref};
