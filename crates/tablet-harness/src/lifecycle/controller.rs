//! The lifecycle controller.
//!
//! [`TabletHarness`] turns "service constructed" into "server verified
//! reachable" and back again. It is the only owner of the running service
//! and the serving loop, and publishes the server's address only after the
//! readiness probe has seen it answer.

use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use tablet_harness_config::HarnessConfig;

use crate::address::ServerAddress;
use crate::dbconfig::{ConnParams, DbConfigs};
use crate::health::LifecycleReporter;
use crate::process_manager::DatabaseProcessManager;
use crate::readiness::ReadinessProbe;
use crate::schema::SchemaOverride;
use crate::server_config::ServerConfig;
use crate::service::{ServiceFactory, StartRequest, TabletService};
use crate::target::{HARNESS_KEYSPACE, HARNESS_SHARD, TabletType, Target};
use crate::transport::{self, DiagnosticListener, ListenerHandle};
use crate::vars::VarsRegistry;

use super::{HarnessError, LifecycleState};

const LIFECYCLE_TARGET: &str = "tablet_harness::lifecycle";

/// State published once a start has succeeded.
#[derive(Debug)]
pub struct RunningServer<S> {
    base_config: ServerConfig,
    target: Target,
    service: Arc<S>,
    vars: Arc<VarsRegistry>,
    address: ServerAddress,
}

impl<S> RunningServer<S> {
    /// Configuration the service was constructed from.
    #[must_use]
    pub const fn base_config(&self) -> &ServerConfig {
        &self.base_config
    }

    /// Dataset the service serves.
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// The live service.
    #[must_use]
    pub const fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Variables exported by this run.
    #[must_use]
    pub const fn vars(&self) -> &Arc<VarsRegistry> {
        &self.vars
    }

    /// Address verified by the readiness probe.
    #[must_use]
    pub const fn address(&self) -> &ServerAddress {
        &self.address
    }
}

/// Owns one server instance per start/stop cycle.
///
/// Entry points check [`LifecycleState`], so a second start while a server
/// is running, or a stop with nothing running, fails with
/// [`HarnessError::InvalidState`] instead of racing.
pub struct TabletHarness<F: ServiceFactory> {
    config: HarnessConfig,
    factory: F,
    reporter: Arc<dyn LifecycleReporter>,
    probe: ReadinessProbe,
    tablet_type: TabletType,
    #[cfg(test)]
    startup_delay: Duration,
    state: LifecycleState,
    running: Option<RunningServer<F::Service>>,
    listener: Option<ListenerHandle>,
}

impl<F: ServiceFactory> TabletHarness<F> {
    /// Builds a harness that has not yet started a server.
    pub fn new(
        config: HarnessConfig,
        factory: F,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<Self, HarnessError> {
        let settings = config
            .probe_settings()
            .map_err(|source| HarnessError::ProbeSettings { source })?;
        let probe =
            ReadinessProbe::new(settings).map_err(|source| HarnessError::Readiness { source })?;
        Ok(Self {
            config,
            factory,
            reporter,
            probe,
            tablet_type: TabletType::default(),
            #[cfg(test)]
            startup_delay: Duration::ZERO,
            state: LifecycleState::NotStarted,
            running: None,
            listener: None,
        })
    }

    /// Sets the role requested for the next start.
    #[must_use]
    pub fn with_tablet_type(mut self, tablet_type: TabletType) -> Self {
        self.tablet_type = tablet_type;
        self
    }

    /// Delays the serving loop of subsequent starts by `delay`.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Harness configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// The running server, once a start has succeeded.
    #[must_use]
    pub const fn running(&self) -> Option<&RunningServer<F::Service>> {
        self.running.as_ref()
    }

    /// The published address. `None` unless the harness is ready.
    #[must_use]
    pub fn address(&self) -> Option<&ServerAddress> {
        self.running.as_ref().map(RunningServer::address)
    }

    /// Starts a server and waits until it answers.
    ///
    /// Equivalent to [`Self::start_cancellable`] with a token nobody
    /// cancels; the configured startup timeout still applies.
    pub async fn start(
        &mut self,
        conn_params: ConnParams,
        schema_overrides: Vec<SchemaOverride>,
    ) -> Result<&RunningServer<F::Service>, HarnessError> {
        self.start_cancellable(conn_params, schema_overrides, &CancellationToken::new())
            .await
    }

    /// Starts a server and waits until it answers or `cancel` fires.
    ///
    /// On error nothing is published and the state is unchanged. A service
    /// that started before the failure is stopped again.
    pub async fn start_cancellable(
        &mut self,
        conn_params: ConnParams,
        schema_overrides: Vec<SchemaOverride>,
        cancel: &CancellationToken,
    ) -> Result<&RunningServer<F::Service>, HarnessError> {
        self.ensure_state("start", LifecycleState::can_start)?;
        self.reporter.start_requested(&conn_params);

        match self.launch(conn_params, schema_overrides, cancel).await {
            Ok((running, listener, attempts)) => {
                self.reporter.server_ready(running.address(), attempts);
                self.listener = Some(listener);
                self.state = LifecycleState::Ready;
                Ok(&*self.running.insert(running))
            }
            Err(error) => {
                self.reporter.start_failed(&error);
                Err(error)
            }
        }
    }

    /// Stops the service, then the serving loop, and waits for the loop to
    /// release its socket.
    pub async fn stop(&mut self) -> Result<(), HarnessError> {
        self.ensure_state("stop", LifecycleState::can_stop)?;
        self.reporter.stop_requested();

        if let Some(running) = self.running.take() {
            stop_backing_service(&running.service).await;
        }
        let result = match self.listener.take() {
            Some(listener) => {
                listener.shutdown();
                listener
                    .join()
                    .await
                    .map_err(|source| HarnessError::Shutdown { source })
            }
            None => Ok(()),
        };

        self.state = LifecycleState::Stopped;
        self.reporter.stop_completed();
        result
    }

    fn ensure_state(
        &self,
        operation: &'static str,
        allowed: fn(LifecycleState) -> bool,
    ) -> Result<(), HarnessError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(HarnessError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    async fn launch(
        &self,
        conn_params: ConnParams,
        schema_overrides: Vec<SchemaOverride>,
        cancel: &CancellationToken,
    ) -> Result<(RunningServer<F::Service>, ListenerHandle, u32), HarnessError> {
        let base_config = ServerConfig::for_run(&self.config);
        let target = Target::harness(self.tablet_type);
        let service = Arc::new(self.factory.construct(&base_config));
        let vars = Arc::new(VarsRegistry::new());
        service.register(&vars);

        let dbconfigs = DbConfigs::for_app(conn_params, HARNESS_KEYSPACE, HARNESS_SHARD);
        let request = StartRequest {
            target: target.clone(),
            process_manager: DatabaseProcessManager::from_db_configs(&dbconfigs),
            dbconfigs,
            schema_overrides,
        };
        start_backing_service(&service, request).await?;
        self.reporter.service_started(&target);

        match self.serve_until_ready(&vars, cancel).await {
            Ok((address, listener, attempts)) => Ok((
                RunningServer {
                    base_config,
                    target,
                    service,
                    vars,
                    address,
                },
                listener,
                attempts,
            )),
            Err(error) => {
                stop_backing_service(&service).await;
                Err(error)
            }
        }
    }

    async fn serve_until_ready(
        &self,
        vars: &Arc<VarsRegistry>,
        cancel: &CancellationToken,
    ) -> Result<(ServerAddress, ListenerHandle, u32), HarnessError> {
        let listener = DiagnosticListener::bind(self.config.listen_host())
            .await
            .map_err(|source| HarnessError::Listener { source })?;
        #[cfg(test)]
        let listener = listener.with_startup_delay(self.startup_delay);
        let address = ServerAddress::from_socket_addr(listener.local_addr())
            .map_err(|source| HarnessError::Listener { source })?;
        self.reporter.listener_bound(&address);

        let handle = listener.start(transport::router(Arc::clone(vars)));
        match self.probe.wait_until_ready(&address, cancel).await {
            Ok(attempts) => Ok((address, handle, attempts)),
            Err(source) => {
                handle.shutdown();
                if let Err(error) = handle.join().await {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        error = %error,
                        "serving loop failed while abandoning start"
                    );
                }
                Err(HarnessError::Readiness { source })
            }
        }
    }
}

impl<F: ServiceFactory> Drop for TabletHarness<F> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.service.stop_service();
        }
    }
}

async fn start_backing_service<S: TabletService>(
    service: &Arc<S>,
    request: StartRequest,
) -> Result<(), HarnessError> {
    let worker = Arc::clone(service);
    match tokio::task::spawn_blocking(move || worker.start_service(&request)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(HarnessError::ServiceStart { source }),
        Err(error) => Err(HarnessError::ServiceTask {
            message: error.to_string(),
        }),
    }
}

async fn stop_backing_service<S: TabletService>(service: &Arc<S>) {
    let worker = Arc::clone(service);
    if let Err(error) = tokio::task::spawn_blocking(move || worker.stop_service()).await {
        warn!(
            target: LIFECYCLE_TARGET,
            error = %error,
            "service stop task failed"
        );
    }
}
