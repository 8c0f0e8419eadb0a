//! Image materialisation strategies.
//!
//! A container can only be created once its image exists locally. When the
//! image inspection answers 404 the engine asks the container's
//! [`ImageStrategy`] to produce it, either by pulling from a registry or by
//! building a local context through the daemon.

mod archive;

use std::io;

use bollard::query_parameters::{BuildImageOptionsBuilder, CreateImageOptionsBuilder};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use super::daemon::{DaemonClient, map_daemon_error};
use crate::error::{FilesystemError, ImageError, TockerError};
use archive::{IgnoreRules, build_context_archive};

const DEFAULT_TAG: &str = "latest";
const DOCKERFILE_NAME: &str = "Dockerfile";

/// How the image for a container is obtained when it is missing locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStrategy {
    /// Pull the image from its registry.
    Pull {
        /// The image reference, for example `redis` or `postgres:16`.
        image: String,
    },

    /// Build the image from a local directory containing a `Dockerfile`.
    Build {
        /// The build context directory.
        context_dir: Utf8PathBuf,
        /// The reference the built image is tagged with.
        image: String,
    },
}

impl ImageStrategy {
    /// The image reference this strategy produces.
    #[must_use]
    pub fn image(&self) -> &str {
        match self {
            Self::Pull { image } | Self::Build { image, .. } => image,
        }
    }

    /// Produce the image through the daemon.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::PullFailed` or `ImageError::BuildFailed` when the
    /// daemon rejects the request, `EngineError::DaemonUnreachable` when it
    /// cannot be reached, and a `FilesystemError` when a build context
    /// cannot be read.
    pub async fn materialize_async(&self, client: &dyn DaemonClient) -> Result<(), TockerError> {
        match self {
            Self::Pull { image } => pull_async(client, image).await,
            Self::Build { context_dir, image } => build_async(client, context_dir, image).await,
        }
    }
}

async fn pull_async(client: &dyn DaemonClient, image: &str) -> Result<(), TockerError> {
    let (name, tag) = parse_image_ref(image);
    tracing::info!(image = %image, "pulling image");

    let mut builder = CreateImageOptionsBuilder::new().from_image(name);
    if let Some(tag_value) = tag {
        builder = builder.tag(tag_value);
    }

    client
        .pull_image(builder.build())
        .await
        .map_err(|error| {
            map_daemon_error("pull image", &error, |message| {
                TockerError::from(ImageError::PullFailed {
                    image: String::from(image),
                    message,
                })
            })
        })?;

    tracing::info!(image = %image, "image pulled");
    Ok(())
}

async fn build_async(
    client: &dyn DaemonClient,
    context_dir: &Utf8Path,
    image: &str,
) -> Result<(), TockerError> {
    tracing::info!(image = %image, context = %context_dir, "building image");

    let archive_bytes = read_context(context_dir)?;
    let options = BuildImageOptionsBuilder::new()
        .dockerfile(DOCKERFILE_NAME)
        .t(image)
        .rm(true)
        .build();

    client
        .build_image(options, archive_bytes)
        .await
        .map_err(|error| {
            map_daemon_error("build image", &error, |message| {
                TockerError::from(ImageError::BuildFailed {
                    image: String::from(image),
                    context: context_dir.as_std_path().to_path_buf(),
                    message,
                })
            })
        })?;

    tracing::info!(image = %image, "image built");
    Ok(())
}

fn read_context(context_dir: &Utf8Path) -> Result<Vec<u8>, TockerError> {
    let context = Dir::open_ambient_dir(context_dir, ambient_authority())
        .map_err(|error| map_context_error(context_dir, &error))?;
    let ignore =
        IgnoreRules::load(&context).map_err(|error| map_context_error(context_dir, &error))?;
    build_context_archive(context_dir, &ignore)
        .map_err(|error| map_context_error(context_dir, &error))
}

fn map_context_error(context_dir: &Utf8Path, error: &io::Error) -> TockerError {
    let path = context_dir.as_std_path().to_path_buf();
    let filesystem_error = match error.kind() {
        io::ErrorKind::NotFound => FilesystemError::NotFound { path },
        io::ErrorKind::PermissionDenied => FilesystemError::PermissionDenied { path },
        _ => FilesystemError::IoError {
            path,
            message: error.to_string(),
        },
    };
    TockerError::from(filesystem_error)
}

/// Split an image reference into the name and tag the pull endpoint expects.
///
/// References pinned by digest are passed through whole with no tag. A
/// colon only separates a tag when it follows the last `/`, so registry
/// ports such as `localhost:5000/redis` are not mistaken for tags.
#[must_use]
pub fn parse_image_ref(image: &str) -> (&str, Option<&str>) {
    if image.contains('@') {
        return (image, None);
    }

    let last_segment = image.rsplit_once('/').map_or(image, |(_, segment)| segment);
    match image.rsplit_once(':') {
        Some((name, tag)) if last_segment.contains(':') => (name, Some(tag)),
        _ => (image, Some(DEFAULT_TAG)),
    }
}
