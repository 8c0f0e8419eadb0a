//! An in-memory daemon that remembers what it was asked to do.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, ContainerState,
    ImageInspect, NetworkSettings, PortBinding,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, StopContainerOptions,
};
use tocker::engine::{DaemonClient, DaemonFuture};

/// Container ID the fake daemon hands out on create.
pub(crate) const FAKE_CONTAINER_ID: &str = "f4ke0000c0ffee";

/// What the daemon knows about the declared container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presence {
    /// No container with the name exists.
    Absent,
    /// The container exists but is not running.
    Stopped,
    /// The container is running.
    Running,
}

#[derive(Debug)]
struct Inner {
    presence: Presence,
    image_present: bool,
    reject_create: bool,
    published: BTreeMap<u16, u16>,
    calls: Vec<&'static str>,
}

/// Daemon double driven by scenario steps.
#[derive(Debug)]
pub(crate) struct FakeDaemon {
    inner: Mutex<Inner>,
}

impl FakeDaemon {
    pub(crate) const fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                presence: Presence::Absent,
                image_present: true,
                reject_create: false,
                published: BTreeMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_presence(&self, presence: Presence) {
        self.lock().presence = presence;
    }

    pub(crate) fn set_image_present(&self, present: bool) {
        self.lock().image_present = present;
    }

    pub(crate) fn reject_create(&self) {
        self.lock().reject_create = true;
    }

    pub(crate) fn publish(&self, container_port: u16, host_port: u16) {
        self.lock().published.insert(container_port, host_port);
    }

    /// How many times `operation` was requested.
    pub(crate) fn count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    /// Position of the first `operation` request, if any.
    pub(crate) fn first_index(&self, operation: &str) -> Option<usize> {
        self.lock().calls.iter().position(|call| *call == operation)
    }

    fn record(&self, operation: &'static str) -> MutexGuard<'_, Inner> {
        let mut inner = self.lock();
        inner.calls.push(operation);
        inner
    }
}

fn not_found(object: &str) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code: 404,
        message: format!("No such object: {object}"),
    }
}

fn inspection(inner: &Inner) -> ContainerInspectResponse {
    let running = inner.presence == Presence::Running;
    let ports: HashMap<String, Option<Vec<PortBinding>>> = inner
        .published
        .iter()
        .map(|(container_port, host_port)| {
            (
                format!("{container_port}/tcp"),
                Some(vec![PortBinding {
                    host_ip: Some(String::from("0.0.0.0")),
                    host_port: Some(host_port.to_string()),
                }]),
            )
        })
        .collect();

    ContainerInspectResponse {
        id: Some(String::from(FAKE_CONTAINER_ID)),
        state: Some(ContainerState {
            running: Some(running),
            ..ContainerState::default()
        }),
        network_settings: Some(NetworkSettings {
            ports: running.then_some(ports),
            ..NetworkSettings::default()
        }),
        ..ContainerInspectResponse::default()
    }
}

fn published_ports(body: &ContainerCreateBody) -> BTreeMap<u16, u16> {
    body.host_config
        .as_ref()
        .and_then(|host_config| host_config.port_bindings.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|(key, bindings)| {
            let container_port = key.split_once('/')?.0.parse().ok()?;
            let host_port = bindings
                .as_ref()?
                .first()?
                .host_port
                .as_ref()?
                .parse()
                .ok()?;
            Some((container_port, host_port))
        })
        .collect()
}

impl DaemonClient for FakeDaemon {
    fn inspect_container(&self, container: &str) -> DaemonFuture<'_, ContainerInspectResponse> {
        let inner = self.record("inspect container");
        let result = if inner.presence == Presence::Absent {
            Err(not_found(container))
        } else {
            Ok(inspection(&inner))
        };
        Box::pin(async move { result })
    }

    fn inspect_image(&self, image: &str) -> DaemonFuture<'_, ImageInspect> {
        let inner = self.record("inspect image");
        let result = if inner.image_present {
            Ok(ImageInspect::default())
        } else {
            Err(not_found(image))
        };
        Box::pin(async move { result })
    }

    fn pull_image(&self, _options: CreateImageOptions) -> DaemonFuture<'_, ()> {
        self.record("pull image").image_present = true;
        Box::pin(async { Ok(()) })
    }

    fn build_image(&self, _options: BuildImageOptions, _context: Vec<u8>) -> DaemonFuture<'_, ()> {
        self.record("build image").image_present = true;
        Box::pin(async { Ok(()) })
    }

    fn create_container(
        &self,
        _options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> DaemonFuture<'_, ContainerCreateResponse> {
        let mut inner = self.record("create container");
        let result = if inner.reject_create {
            Err(BollardError::DockerResponseServerError {
                status_code: 409,
                message: String::from("container name already in use"),
            })
        } else {
            inner.published = published_ports(&config);
            inner.presence = Presence::Stopped;
            Ok(ContainerCreateResponse {
                id: String::from(FAKE_CONTAINER_ID),
                warnings: vec![],
            })
        };
        Box::pin(async move { result })
    }

    fn start_container(&self, _container_id: &str) -> DaemonFuture<'_, ()> {
        self.record("start container").presence = Presence::Running;
        Box::pin(async { Ok(()) })
    }

    fn stop_container(
        &self,
        _container: &str,
        _options: Option<StopContainerOptions>,
    ) -> DaemonFuture<'_, ()> {
        self.record("stop container").presence = Presence::Stopped;
        Box::pin(async { Ok(()) })
    }
}
