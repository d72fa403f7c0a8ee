//! Errors surfaced by the lifecycle controller.

use std::sync::Arc;

use ortho_config::OrthoError;
use tablet_harness_config::ProbeSettingsError;
use thiserror::Error;

use crate::readiness::ProbeError;
use crate::service::ServiceError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::LifecycleState;

/// Errors returned by [`super::TabletHarness`] and [`super::bootstrap_with`].
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Readiness probe timing is unusable.
    #[error("invalid readiness probe settings: {source}")]
    ProbeSettings {
        /// Validation failure.
        #[source]
        source: ProbeSettingsError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The operation is not valid in the current lifecycle state.
    #[error("cannot {operation} while the harness is {state}")]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,
        /// State at the time of the call.
        state: LifecycleState,
    },
    /// The backing service refused to start.
    #[error("could not start service: {source}")]
    ServiceStart {
        /// Error reported by the service.
        #[source]
        source: ServiceError,
    },
    /// The blocking start call did not complete.
    #[error("service start task failed: {message}")]
    ServiceTask {
        /// Description reported by the runtime.
        message: String,
    },
    /// The diagnostic listener could not be opened.
    #[error("could not start listener: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The server never answered the readiness probe.
    #[error("server did not become ready: {source}")]
    Readiness {
        /// Underlying probe error.
        #[source]
        source: ProbeError,
    },
    /// The serving loop did not exit cleanly during teardown.
    #[error("serving loop did not stop cleanly: {source}")]
    Shutdown {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
}

impl HarnessError {
    /// Returns true when readiness polling ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Readiness {
                source: ProbeError::TimedOut { .. }
            }
        )
    }

    /// Returns true when readiness polling was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Readiness {
                source: ProbeError::Cancelled { .. }
            }
        )
    }
}
