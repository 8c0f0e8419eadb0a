//! Post-start readiness gate.
//!
//! A started container is not necessarily serving yet. An [`AliveStrategy`]
//! decides when `run` may return: immediately, or once a caller-supplied
//! [`UpCheck`] reports the service up within a bounded number of attempts.

pub mod up_checks;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::LivenessConfig;
use crate::container::RunningDockerInstance;
use crate::error::{LivenessError, TockerError};

type CheckFn = dyn Fn(&RunningDockerInstance) -> bool + Send + Sync;

/// A readiness predicate evaluated against a started container.
///
/// Probes are synchronous and may block; each attempt runs on Tokio's
/// blocking pool. A probe that panics counts as not up. When the gate is
/// cancelled or its deadline passes mid-probe, the probe is abandoned and
/// left to finish on the blocking pool.
#[derive(Clone)]
pub struct UpCheck {
    check: Arc<CheckFn>,
}

impl UpCheck {
    /// Wrap a predicate that inspects the started container.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&RunningDockerInstance) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }

    /// Wrap a predicate that needs nothing from the container.
    pub fn from_fn<F>(check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::new(move |_| check())
    }

    /// Evaluate the predicate once.
    #[must_use]
    pub fn is_up(&self, instance: &RunningDockerInstance) -> bool {
        (self.check)(instance)
    }
}

impl fmt::Debug for UpCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpCheck").finish_non_exhaustive()
    }
}

/// When a started container counts as ready.
#[derive(Debug, Clone)]
pub enum AliveStrategy {
    /// Ready as soon as it is started.
    AlwaysAlive,

    /// Ready once `up_check` passes.
    Retrying {
        /// The readiness predicate.
        up_check: UpCheck,
        /// How many times the predicate is evaluated before giving up.
        max_attempts: u32,
        /// Pause between attempts.
        delay: Duration,
        /// Overall time limit for the gate, if any.
        deadline: Option<Duration>,
    },
}

impl AliveStrategy {
    /// A bounded poll of `up_check` with no overall deadline.
    #[must_use]
    pub const fn retrying(up_check: UpCheck, max_attempts: u32, delay: Duration) -> Self {
        Self::Retrying {
            up_check,
            max_attempts,
            delay,
            deadline: None,
        }
    }

    /// A retrying gate shaped by the `[liveness]` configuration section.
    #[must_use]
    pub fn from_config(up_check: UpCheck, config: &LivenessConfig) -> Self {
        Self::Retrying {
            up_check,
            max_attempts: config.max_attempts,
            delay: Duration::from_millis(config.delay_ms),
            deadline: config.deadline_ms.map(Duration::from_millis),
        }
    }

    /// Bound the whole gate by `deadline`. Has no effect on `AlwaysAlive`.
    #[must_use]
    pub fn with_deadline(self, limit: Duration) -> Self {
        match self {
            Self::AlwaysAlive => Self::AlwaysAlive,
            Self::Retrying {
                up_check,
                max_attempts,
                delay,
                ..
            } => Self::Retrying {
                up_check,
                max_attempts,
                delay,
                deadline: Some(limit),
            },
        }
    }

    /// Block until the container is ready.
    ///
    /// # Errors
    ///
    /// Returns `LivenessError::Timeout` when every attempt fails,
    /// `LivenessError::DeadlineExceeded` when the deadline passes first, and
    /// `LivenessError::Cancelled` when `cancel` fires.
    pub async fn wait_until_alive(
        &self,
        instance: &RunningDockerInstance,
        cancel: &CancellationToken,
    ) -> Result<(), TockerError> {
        match self {
            Self::AlwaysAlive => Ok(()),
            Self::Retrying {
                up_check,
                max_attempts,
                delay,
                deadline,
            } => {
                let gate = RetryGate {
                    up_check,
                    max_attempts: *max_attempts,
                    delay: *delay,
                    deadline: *deadline,
                };
                gate.wait(instance, cancel).await
            }
        }
    }
}

struct RetryGate<'a> {
    up_check: &'a UpCheck,
    max_attempts: u32,
    delay: Duration,
    deadline: Option<Duration>,
}

impl RetryGate<'_> {
    async fn wait(
        &self,
        instance: &RunningDockerInstance,
        cancel: &CancellationToken,
    ) -> Result<(), TockerError> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        while attempts < self.max_attempts {
            if cancel.is_cancelled() {
                return Err(LivenessError::Cancelled { attempts }.into());
            }
            if let Some(limit) = self.deadline
                && started.elapsed() >= limit
            {
                return Err(deadline_exceeded(limit, attempts));
            }

            // An in-flight probe is abandoned, not joined, when the gate gives up.
            attempts += 1;
            let up = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(LivenessError::Cancelled { attempts }.into());
                }
                limit = expiry(self.deadline, started) => {
                    return Err(deadline_exceeded(limit, attempts));
                }
                up = probe(self.up_check, instance) => up,
            };
            tracing::debug!(attempt = attempts, up, "liveness probe");
            if up {
                tracing::info!(attempts, "service alive");
                return Ok(());
            }
            if attempts == self.max_attempts {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(LivenessError::Cancelled { attempts }.into());
                }
                limit = expiry(self.deadline, started) => {
                    return Err(deadline_exceeded(limit, attempts));
                }
                () = tokio::time::sleep(self.delay) => {}
            }
        }

        let elapsed_ms = millis(started.elapsed());
        tracing::warn!(attempts, elapsed_ms, "service never became alive");
        Err(LivenessError::Timeout {
            attempts,
            elapsed_ms,
        }
        .into())
    }
}

/// Resolves with the limit once the gate's deadline passes; never without one.
async fn expiry(deadline: Option<Duration>, started: Instant) -> Duration {
    let Some((limit, expires)) =
        deadline.and_then(|limit| started.checked_add(limit).map(|expires| (limit, expires)))
    else {
        return std::future::pending().await;
    };
    tokio::time::sleep_until(tokio::time::Instant::from_std(expires)).await;
    limit
}

fn deadline_exceeded(limit: Duration, attempts: u32) -> TockerError {
    let deadline_ms = millis(limit);
    tracing::warn!(attempts, deadline_ms, "liveness deadline passed");
    LivenessError::DeadlineExceeded {
        deadline_ms,
        attempts,
    }
    .into()
}

async fn probe(up_check: &UpCheck, instance: &RunningDockerInstance) -> bool {
    let check = up_check.clone();
    let target = instance.clone();
    match tokio::task::spawn_blocking(move || check.is_up(&target)).await {
        Ok(up) => up,
        Err(error) => {
            tracing::warn!(error = %error, "liveness probe panicked");
            false
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
