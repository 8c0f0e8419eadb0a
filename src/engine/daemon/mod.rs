//! The daemon operations the reconciliation engine consumes.
//!
//! [`DaemonClient`] wraps the handful of Bollard calls tocker needs behind a
//! small trait seam, so reconciliation can be unit-tested without a running
//! daemon. Each call returns the raw Bollard error; mapping onto semantic
//! errors happens in the caller, which knows what it was trying to do.

use std::future::Future;
use std::pin::Pin;

use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, ImageInspect,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, InspectContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::{Docker, body_full};
use futures_util::TryStreamExt;

use super::connection::is_transport_failure;
use crate::error::{EngineError, TockerError};

#[cfg(test)]
pub(crate) mod mock;

/// Boxed future type returned by [`DaemonClient`] implementors.
pub type DaemonFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BollardError>> + Send + 'a>>;

/// Behaviour required from a container daemon.
///
/// Implementations must report absent containers and images as a
/// `DockerResponseServerError` with status 404; every other error is treated
/// as fatal by the engine.
pub trait DaemonClient: Send + Sync {
    /// Inspect a container by name or ID.
    fn inspect_container(&self, container: &str) -> DaemonFuture<'_, ContainerInspectResponse>;

    /// Inspect an image by reference.
    fn inspect_image(&self, image: &str) -> DaemonFuture<'_, ImageInspect>;

    /// Pull an image, draining the progress stream until it completes.
    fn pull_image(&self, options: CreateImageOptions) -> DaemonFuture<'_, ()>;

    /// Build an image from a tar-encoded context, draining build output.
    fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> DaemonFuture<'_, ()>;

    /// Create a container.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> DaemonFuture<'_, ContainerCreateResponse>;

    /// Start a created or stopped container.
    fn start_container(&self, container_id: &str) -> DaemonFuture<'_, ()>;

    /// Stop a running container.
    fn stop_container(
        &self,
        container: &str,
        options: Option<StopContainerOptions>,
    ) -> DaemonFuture<'_, ()>;
}

impl DaemonClient for Docker {
    fn inspect_container(&self, container: &str) -> DaemonFuture<'_, ContainerInspectResponse> {
        let container_owned = String::from(container);
        Box::pin(async move {
            Self::inspect_container(self, &container_owned, None::<InspectContainerOptions>).await
        })
    }

    fn inspect_image(&self, image: &str) -> DaemonFuture<'_, ImageInspect> {
        let image_owned = String::from(image);
        Box::pin(async move { Self::inspect_image(self, &image_owned).await })
    }

    fn pull_image(&self, options: CreateImageOptions) -> DaemonFuture<'_, ()> {
        Box::pin(async move {
            Self::create_image(self, Some(options), None, None)
                .try_for_each(|progress| {
                    if let Some(status) = progress.status {
                        tracing::trace!(status = %status, "pull progress");
                    }
                    futures_util::future::ready(Ok(()))
                })
                .await
        })
    }

    fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> DaemonFuture<'_, ()> {
        Box::pin(async move {
            Self::build_image(self, options, None, Some(body_full(context.into())))
                .try_for_each(|output| {
                    if let Some(stream) = output.stream {
                        tracing::trace!(output = %stream.trim_end(), "build output");
                    }
                    futures_util::future::ready(Ok(()))
                })
                .await
        })
    }

    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> DaemonFuture<'_, ContainerCreateResponse> {
        Box::pin(async move { Self::create_container(self, options, config).await })
    }

    fn start_container(&self, container_id: &str) -> DaemonFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::start_container(self, &container_id_owned, None::<StartContainerOptions>).await
        })
    }

    fn stop_container(
        &self,
        container: &str,
        options: Option<StopContainerOptions>,
    ) -> DaemonFuture<'_, ()> {
        let container_owned = String::from(container);
        Box::pin(async move { Self::stop_container(self, &container_owned, options).await })
    }
}

/// Whether the daemon answered that the requested object does not exist.
#[must_use]
pub fn is_not_found(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Map a failed daemon call onto a semantic error.
///
/// Transport failures become `EngineError::DaemonUnreachable` naming
/// `operation`; anything the daemon actually answered goes through
/// `on_response`.
pub(crate) fn map_daemon_error(
    operation: &str,
    error: &BollardError,
    on_response: impl FnOnce(String) -> TockerError,
) -> TockerError {
    if is_transport_failure(error) {
        return TockerError::from(EngineError::DaemonUnreachable {
            operation: String::from(operation),
            message: error.to_string(),
        });
    }
    on_response(error.to_string())
}
