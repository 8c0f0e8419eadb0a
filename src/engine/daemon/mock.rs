//! Mock daemon shared by unit tests across the crate.

use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, ImageInspect,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, StopContainerOptions,
};
use mockall::mock;

use super::{DaemonClient, DaemonFuture};

mock! {
    #[derive(Debug)]
    pub Daemon {}

    impl DaemonClient for Daemon {
        fn inspect_container<'a>(&'a self, container: &str) -> DaemonFuture<'a, ContainerInspectResponse>;
        fn inspect_image<'a>(&'a self, image: &str) -> DaemonFuture<'a, ImageInspect>;
        fn pull_image<'a>(&'a self, options: CreateImageOptions) -> DaemonFuture<'a, ()>;
        fn build_image<'a>(&'a self, options: BuildImageOptions, context: Vec<u8>) -> DaemonFuture<'a, ()>;
        fn create_container<'a>(
            &'a self,
            options: Option<CreateContainerOptions>,
            config: ContainerCreateBody,
        ) -> DaemonFuture<'a, ContainerCreateResponse>;
        fn start_container<'a>(&'a self, container_id: &str) -> DaemonFuture<'a, ()>;
        fn stop_container<'a>(
            &'a self,
            container: &str,
            options: Option<StopContainerOptions>,
        ) -> DaemonFuture<'a, ()>;
    }
}

/// A 404 response as the daemon reports missing containers and images.
pub(crate) fn not_found(object: &str) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code: 404,
        message: format!("No such object: {object}"),
    }
}

/// A non-404 daemon response.
pub(crate) fn server_error(status_code: u16, message: &str) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code,
        message: String::from(message),
    }
}

/// A transport failure, as when the daemon socket refuses connections.
pub(crate) fn connection_refused() -> BollardError {
    BollardError::IOError {
        err: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
    }
}

/// Wrap a value in the boxed future the trait returns.
pub(crate) fn ready<'a, T: Send + 'a>(result: Result<T, BollardError>) -> DaemonFuture<'a, T> {
    Box::pin(async move { result })
}
