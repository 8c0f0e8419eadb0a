//! Ready-made [`UpCheck`] constructors.

use std::fmt::Display;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::UpCheck;
use crate::container::RunningDockerInstance;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Treat a fallible probe as a predicate: `Ok` is up, any error is down.
///
/// Errors are logged at `debug` and otherwise discarded.
pub fn error_is_down<F, E>(probe: F) -> UpCheck
where
    F: Fn(&RunningDockerInstance) -> Result<(), E> + Send + Sync + 'static,
    E: Display,
{
    UpCheck::new(move |instance| match probe(instance) {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(error = %error, "probe reported service down");
            false
        }
    })
}

/// Up once a TCP connection to the published `container_port` succeeds.
///
/// Useful for services without a cheap protocol-level health command. The
/// port is resolved through the instance's mapped ports and dialled on its
/// daemon host; an unmapped port counts as down.
#[must_use]
pub fn tcp_port_open(container_port: u16) -> UpCheck {
    error_is_down(move |instance: &RunningDockerInstance| {
        let host_port = instance
            .mapped_ports()
            .for_container_port(container_port)
            .map_err(|error| std::io::Error::other(error.to_string()))?;
        connect(instance.host(), host_port).map(drop)
    })
}

/// Open a TCP connection to `host:port` with a short timeout.
///
/// Every resolved address is tried in turn; the last error is returned if
/// none accepts.
pub(crate) fn connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let mut last_error = None;
    for address in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&address, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{host}:{port} did not resolve"),
        )
    }))
}
