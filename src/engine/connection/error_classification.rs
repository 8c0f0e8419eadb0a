//! Error classification helpers for container engine failures.
//!
//! This module converts low-level `Bollard` errors into semantic
//! `EngineError` variants so callers receive actionable diagnostics, and
//! decides which request failures mean the daemon itself is unreachable.

use std::path::Path;

use crate::error::EngineError;

/// Extract the filesystem path from a socket URI.
///
/// Strips the scheme prefix (`unix://`, `npipe://`) to get the raw path.
/// HTTP endpoints and bare paths return `None`.
fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Path::new)
}

fn classify_io_error_kind(
    kind: std::io::ErrorKind,
    socket_path: Option<&Path>,
    error_msg: &str,
) -> EngineError {
    match kind {
        std::io::ErrorKind::PermissionDenied => socket_path.map_or_else(
            || EngineError::ConnectionFailed {
                message: error_msg.to_owned(),
            },
            |path| EngineError::PermissionDenied {
                path: path.to_path_buf(),
            },
        ),
        std::io::ErrorKind::NotFound => socket_path.map_or_else(
            || EngineError::ConnectionFailed {
                message: error_msg.to_owned(),
            },
            |path| EngineError::SocketNotFound {
                path: path.to_path_buf(),
            },
        ),
        _ => EngineError::ConnectionFailed {
            message: error_msg.to_owned(),
        },
    }
}

/// Classify a `Bollard` connection error into a semantic `EngineError`.
///
/// Falls back to `ConnectionFailed` for errors that do not match known
/// patterns or for endpoints without filesystem paths.
pub(crate) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket_uri: &str,
) -> EngineError {
    let socket_path = extract_socket_path(socket_uri);
    let error_msg = bollard_error.to_string();

    match bollard_error {
        bollard::errors::Error::SocketNotFoundError(_) => {
            if let Some(path) = socket_path {
                return EngineError::SocketNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        bollard::errors::Error::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            return classify_io_error_kind(kind, socket_path, &error_msg);
        }
        _ => {}
    }

    if let Some(kind) = io_error_kind_in_chain(bollard_error) {
        return classify_io_error_kind(kind, socket_path, &error_msg);
    }

    EngineError::ConnectionFailed { message: error_msg }
}

/// Whether a request failed because the daemon could not be reached at all.
///
/// Responses from the daemon, even error responses, are not transport
/// failures; socket, timeout and I/O failures anywhere in the source chain
/// are.
pub(crate) fn is_transport_failure(bollard_error: &bollard::errors::Error) -> bool {
    match bollard_error {
        bollard::errors::Error::DockerResponseServerError { .. } => false,
        bollard::errors::Error::SocketNotFoundError(_)
        | bollard::errors::Error::IOError { .. }
        | bollard::errors::Error::RequestTimeoutError => true,
        other => io_error_kind_in_chain(other).is_some(),
    }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
