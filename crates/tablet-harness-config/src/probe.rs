//! Timing parameters for the readiness probe.

use std::time::Duration;

use thiserror::Error;

/// Validated timing for the readiness probe.
///
/// The probe sleeps `interval` before every attempt, gives each request
/// `attempt_timeout` to answer, and gives up once `deadline` has elapsed
/// since polling began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    interval: Duration,
    attempt_timeout: Duration,
    deadline: Duration,
}

/// Errors raised when probe timing is unusable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSettingsError {
    /// A zero interval would spin without yielding.
    #[error("probe interval must be greater than zero")]
    ZeroInterval,
    /// A zero attempt timeout fails every request.
    #[error("probe attempt timeout must be greater than zero")]
    ZeroAttemptTimeout,
    /// A zero deadline fails before the first attempt.
    #[error("startup timeout must be greater than zero")]
    ZeroDeadline,
}

impl ProbeSettings {
    /// Builds probe settings, rejecting zero durations.
    pub fn new(
        interval: Duration,
        attempt_timeout: Duration,
        deadline: Duration,
    ) -> Result<Self, ProbeSettingsError> {
        if interval.is_zero() {
            return Err(ProbeSettingsError::ZeroInterval);
        }
        if attempt_timeout.is_zero() {
            return Err(ProbeSettingsError::ZeroAttemptTimeout);
        }
        if deadline.is_zero() {
            return Err(ProbeSettingsError::ZeroDeadline);
        }
        Ok(Self {
            interval,
            attempt_timeout,
            deadline,
        })
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Timeout for one probe request.
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Overall polling budget.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }
}
