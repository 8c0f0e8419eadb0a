//! Semantic error types for tocker.
//!
//! Each failure a caller might want to tell apart gets its own `thiserror`
//! enum: image problems, daemon problems, container problems and liveness
//! failures are distinct types so integration-test diagnostics can say which
//! of them stopped a container from coming up. `TockerError` aggregates them
//! for `?` propagation; callers wanting an opaque report can convert it into
//! `eyre::Report` at their own boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error while merging layers.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while talking to the container daemon itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// The daemon could not be reached while performing an operation.
    #[error("container daemon unreachable during {operation}: {message}")]
    DaemonUnreachable {
        /// The daemon operation that was in flight.
        operation: String,
        /// A description of the transport failure.
        message: String,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// Errors raised while materialising the image a container is created from.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Inspecting the image failed for a reason other than absence.
    #[error("failed to inspect image '{image}': {message}")]
    InspectFailed {
        /// The image reference.
        image: String,
        /// A description of the failure.
        message: String,
    },

    /// Pulling the image from its registry failed.
    #[error("failed to pull image '{image}': {message}")]
    PullFailed {
        /// The image reference.
        image: String,
        /// A description of the failure.
        message: String,
    },

    /// Building the image from a local context failed.
    #[error("failed to build image '{image}' from '{context}': {message}")]
    BuildFailed {
        /// The image reference the build was tagged with.
        image: String,
        /// The build context directory.
        context: PathBuf,
        /// A description of the failure.
        message: String,
    },
}

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Inspecting a container failed for a reason other than absence.
    #[error("failed to inspect container '{container}': {message}")]
    InspectFailed {
        /// The container name or ID.
        container: String,
        /// A description of the failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container '{container}': {message}")]
    CreateFailed {
        /// The requested container name.
        container: String,
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Failed to stop a container.
    #[error("failed to stop container '{container}': {message}")]
    StopFailed {
        /// The container name.
        container: String,
        /// A description of the stop failure.
        message: String,
    },

    /// A container port was looked up that the container does not publish.
    #[error("container port {port} is not mapped to a host port")]
    PortNotMapped {
        /// The container-side port that was requested.
        port: u16,
    },

    /// A declared or daemon-reported environment entry lacks a `=` separator.
    #[error("malformed environment entry '{entry}': expected KEY=VALUE")]
    MalformedEnvironmentEntry {
        /// The raw entry.
        entry: String,
    },

    /// A port binding reported by the daemon could not be parsed.
    #[error("malformed port binding '{binding}': {reason}")]
    MalformedPortBinding {
        /// The raw binding key or host port.
        binding: String,
        /// Why the binding was rejected.
        reason: String,
    },
}

/// Errors raised by the post-start readiness gate.
#[derive(Debug, Error)]
pub enum LivenessError {
    /// Every attempt ran without the up-check reporting the service alive.
    #[error("service not alive after {attempts} attempts ({elapsed_ms} ms)")]
    Timeout {
        /// How many times the up-check was invoked.
        attempts: u32,
        /// Wall time spent in the gate, in milliseconds.
        elapsed_ms: u64,
    },

    /// The gate's overall deadline passed before the service came up.
    #[error("service not alive within deadline of {deadline_ms} ms ({attempts} attempts)")]
    DeadlineExceeded {
        /// The configured deadline in milliseconds.
        deadline_ms: u64,
        /// How many times the up-check was invoked.
        attempts: u32,
    },

    /// The caller cancelled the gate.
    #[error("liveness check cancelled after {attempts} attempts")]
    Cancelled {
        /// How many times the up-check was invoked.
        attempts: u32,
    },
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied when accessing a path.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

/// Top-level error type for tocker.
#[derive(Debug, Error)]
pub enum TockerError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The container daemon failed or could not be reached.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The image could not be inspected, pulled or built.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// A container operation or snapshot lookup failed.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// The service inside the container never became ready.
    #[error(transparent)]
    Liveness(#[from] LivenessError),

    /// An error occurred during filesystem operations.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// A specialised `Result` type for tocker operations.
pub type Result<T> = std::result::Result<T, TockerError>;
