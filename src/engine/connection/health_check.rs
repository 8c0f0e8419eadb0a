//! Ping the daemon so an unreachable one is reported at connect time.

use std::time::Duration;

use bollard::Docker;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS};
use crate::error::{EngineError, TockerError};

impl EngineConnector {
    /// Ping the daemon behind `docker`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::HealthCheckFailed` if the daemon answers with an
    /// error, or `EngineError::HealthCheckTimeout` if it does not answer
    /// within ten seconds.
    pub async fn health_check_async(docker: &Docker) -> Result<(), TockerError> {
        let ping = tokio::time::timeout(
            Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS),
            docker.ping(),
        )
        .await
        .map_err(|_| EngineError::HealthCheckTimeout {
            seconds: HEALTH_CHECK_TIMEOUT_SECS,
        })?;

        ping.map(drop).map_err(|e| {
            TockerError::from(EngineError::HealthCheckFailed {
                message: e.to_string(),
            })
        })
    }

    /// Ping the daemon behind `docker`, blocking on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::health_check_async`].
    pub fn health_check(
        runtime: &tokio::runtime::Handle,
        docker: &Docker,
    ) -> Result<(), TockerError> {
        runtime.block_on(Self::health_check_async(docker))
    }
}
