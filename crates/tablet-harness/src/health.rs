//! Structured reporting for harness lifecycle events.

use std::sync::Arc;

use tablet_harness_config::HarnessConfig;

use crate::address::ServerAddress;
use crate::dbconfig::ConnParams;
use crate::lifecycle::HarnessError;
use crate::target::Target;

const HEALTH_TARGET: &str = "tablet_harness::health";

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked after configuration and telemetry are in place.
    fn bootstrap_succeeded(&self, config: &HarnessConfig);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &HarnessError);

    /// Invoked when a start is accepted.
    fn start_requested(&self, conn_params: &ConnParams);

    /// Invoked once the backing service reports it is serving.
    fn service_started(&self, target: &Target);

    /// Invoked once the diagnostic listener holds a port.
    fn listener_bound(&self, address: &ServerAddress);

    /// Invoked when the readiness probe succeeds.
    fn server_ready(&self, address: &ServerAddress, attempts: u32);

    /// Invoked when a start fails at any step.
    fn start_failed(&self, error: &HarnessError);

    /// Invoked when a stop is accepted.
    fn stop_requested(&self);

    /// Invoked after the service and serving loop have stopped.
    fn stop_completed(&self);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn bootstrap_succeeded(&self, config: &HarnessConfig) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &HarnessError) {
        (**self).bootstrap_failed(error);
    }

    fn start_requested(&self, conn_params: &ConnParams) {
        (**self).start_requested(conn_params);
    }

    fn service_started(&self, target: &Target) {
        (**self).service_started(target);
    }

    fn listener_bound(&self, address: &ServerAddress) {
        (**self).listener_bound(address);
    }

    fn server_ready(&self, address: &ServerAddress, attempts: u32) {
        (**self).server_ready(address, attempts);
    }

    fn start_failed(&self, error: &HarnessError) {
        (**self).start_failed(error);
    }

    fn stop_requested(&self) {
        (**self).stop_requested();
    }

    fn stop_completed(&self) {
        (**self).stop_completed();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn bootstrap_succeeded(&self, config: &HarnessConfig) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen_host = %config.listen_host(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            startup_timeout_ms = config.startup_timeout_ms,
            "harness bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &HarnessError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "harness bootstrap failed"
        );
    }

    fn start_requested(&self, conn_params: &ConnParams) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "start_requested",
            database = %conn_params,
            "starting tablet server"
        );
    }

    fn service_started(&self, target: &Target) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "service_started",
            tablet = %target,
            "backing service started"
        );
    }

    fn listener_bound(&self, address: &ServerAddress) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "listener_bound",
            address = %address,
            "diagnostic listener bound"
        );
    }

    fn server_ready(&self, address: &ServerAddress, attempts: u32) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_ready",
            address = %address,
            attempts,
            "tablet server ready"
        );
    }

    fn start_failed(&self, error: &HarnessError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "start_failed",
            error = %error,
            "tablet server failed to start"
        );
    }

    fn stop_requested(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stop_requested",
            "stopping tablet server"
        );
    }

    fn stop_completed(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stop_completed",
            "tablet server stopped"
        );
    }
}
