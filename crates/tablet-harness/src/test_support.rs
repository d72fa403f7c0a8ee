//! Doubles for exercising the harness without a real query engine.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tablet_harness_config::HarnessConfig;

use crate::address::ServerAddress;
use crate::dbconfig::ConnParams;
use crate::health::LifecycleReporter;
use crate::lifecycle::HarnessError;
use crate::server_config::ServerConfig;
use crate::service::{ServiceError, ServiceFactory, StartRequest, TabletService};
use crate::target::Target;
use crate::vars::{Counter, VarsRegistry};

/// Lifecycle events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Bootstrap completed.
    BootstrapSucceeded,
    /// Bootstrap failed with the rendered error.
    BootstrapFailed(String),
    /// A start was accepted.
    StartRequested,
    /// The backing service started.
    ServiceStarted,
    /// The listener bound the given address.
    ListenerBound(String),
    /// The server answered the readiness probe.
    ServerReady(String),
    /// A start failed with the rendered error.
    StartFailed(String),
    /// A stop was accepted.
    StopRequested,
    /// A stop finished.
    StopCompleted,
}

/// Reporter that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn bootstrap_succeeded(&self, _config: &HarnessConfig) {
        self.record(LifecycleEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &HarnessError) {
        self.record(LifecycleEvent::BootstrapFailed(error.to_string()));
    }

    fn start_requested(&self, _conn_params: &ConnParams) {
        self.record(LifecycleEvent::StartRequested);
    }

    fn service_started(&self, _target: &Target) {
        self.record(LifecycleEvent::ServiceStarted);
    }

    fn listener_bound(&self, address: &ServerAddress) {
        self.record(LifecycleEvent::ListenerBound(address.to_string()));
    }

    fn server_ready(&self, address: &ServerAddress, _attempts: u32) {
        self.record(LifecycleEvent::ServerReady(address.to_string()));
    }

    fn start_failed(&self, error: &HarnessError) {
        self.record(LifecycleEvent::StartFailed(error.to_string()));
    }

    fn stop_requested(&self) {
        self.record(LifecycleEvent::StopRequested);
    }

    fn stop_completed(&self) {
        self.record(LifecycleEvent::StopCompleted);
    }
}

/// Call counts shared by every service a [`RecordingServiceFactory`] builds.
#[derive(Debug, Default)]
pub struct ServiceCalls {
    /// Services constructed.
    pub constructed: AtomicUsize,
    /// `register` calls.
    pub registered: AtomicUsize,
    /// `start_service` calls.
    pub started: AtomicUsize,
    /// `stop_service` calls.
    pub stopped: AtomicUsize,
}

impl ServiceCalls {
    /// Reads one counter.
    #[must_use]
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Factory for services that succeed or fail on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingServiceFactory {
    calls: Arc<ServiceCalls>,
    failure: Arc<Mutex<Option<String>>>,
    start_delay: Duration,
}

impl RecordingServiceFactory {
    /// Builds a factory whose services start successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent starts fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    /// Makes subsequent starts succeed.
    pub fn succeed(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Makes every start block for `delay` first.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Shared call counts.
    #[must_use]
    pub fn calls(&self) -> &Arc<ServiceCalls> {
        &self.calls
    }
}

impl ServiceFactory for RecordingServiceFactory {
    type Service = RecordingService;

    fn construct(&self, config: &ServerConfig) -> RecordingService {
        self.calls.constructed.fetch_add(1, Ordering::SeqCst);
        RecordingService {
            config: config.clone(),
            calls: Arc::clone(&self.calls),
            failure: self
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            start_delay: self.start_delay,
            requests: Mutex::new(Vec::new()),
            starts: Counter::new(),
        }
    }
}

/// Service built by [`RecordingServiceFactory`].
#[derive(Debug)]
pub struct RecordingService {
    config: ServerConfig,
    calls: Arc<ServiceCalls>,
    failure: Option<String>,
    start_delay: Duration,
    requests: Mutex<Vec<StartRequest>>,
    starts: Counter,
}

impl RecordingService {
    /// Configuration the service was built from.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Requests passed to `start_service`.
    #[must_use]
    pub fn requests(&self) -> Vec<StartRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TabletService for RecordingService {
    fn register(&self, vars: &VarsRegistry) {
        self.calls.registered.fetch_add(1, Ordering::SeqCst);
        if let Err(error) = vars.publish("RecordingStarts", Arc::new(self.starts.clone())) {
            tracing::debug!(error = %error, "recording service registered twice");
        }
    }

    fn start_service(&self, request: &StartRequest) -> Result<(), ServiceError> {
        self.calls.started.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if !self.start_delay.is_zero() {
            std::thread::sleep(self.start_delay);
        }
        match &self.failure {
            Some(message) => Err(ServiceError::new(message.clone())),
            None => {
                self.starts.add(1);
                Ok(())
            }
        }
    }

    fn stop_service(&self) {
        self.calls.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// A TCP endpoint standing in for a reachable database.
///
/// Connections complete through the socket backlog; nothing is ever read.
#[derive(Debug)]
pub struct FakeDatabase {
    listener: TcpListener,
}

impl FakeDatabase {
    /// Binds a loopback port.
    pub fn bind() -> std::io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0")?,
        })
    }

    /// Address of the endpoint.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Connection parameters pointing at the endpoint.
    pub fn conn_params(&self) -> std::io::Result<ConnParams> {
        let addr = self.local_addr()?;
        Ok(ConnParams::tcp(addr.ip().to_string(), addr.port())
            .with_credentials("vt_app", "")
            .with_dbname("vttest"))
    }
}

/// Connection parameters for a loopback port nobody listens on.
pub fn unreachable_conn_params() -> std::io::Result<ConnParams> {
    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    Ok(ConnParams::tcp(addr.ip().to_string(), addr.port()).with_dbname("vttest"))
}
