//! Reference service used when no real query engine is plugged in.
//!
//! It performs the checks a real engine performs before it starts serving:
//! the target must match the configured keyspace and the backing database
//! must accept a connection. It does not run queries.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dbconfig::ConnParams;
use crate::server_config::ServerConfig;
use crate::vars::{Counter, ExportedVar, Gauge, StringVar, VarsRegistry};

use super::{ServiceError, ServiceFactory, StartRequest, TabletService};

/// Upper bound on a single connection attempt to the backing database.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Variable holding the serving state name.
pub const TABLET_STATE_VAR: &str = "TabletStateName";
/// Variable counting successful starts.
pub const QUERY_SERVICE_STARTS_VAR: &str = "QueryServiceStarts";
/// Variable holding the number of schema overrides in effect.
pub const SCHEMA_OVERRIDES_VAR: &str = "SchemaOverrides";

const SERVICE_TARGET: &str = "tablet_harness::service";

const NOT_SERVING: &str = "NOT_SERVING";
const SERVING: &str = "SERVING";

/// Builds [`StandaloneTabletService`] instances.
#[derive(Debug, Clone, Copy)]
pub struct StandaloneServiceFactory {
    connect_timeout: Duration,
}

impl Default for StandaloneServiceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl StandaloneServiceFactory {
    /// Builds a factory whose services give up connecting after
    /// `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl ServiceFactory for StandaloneServiceFactory {
    type Service = StandaloneTabletService;

    fn construct(&self, config: &ServerConfig) -> StandaloneTabletService {
        StandaloneTabletService::new(config.clone(), self.connect_timeout)
    }
}

/// Service that validates its request and the database endpoint.
#[derive(Debug)]
pub struct StandaloneTabletService {
    config: ServerConfig,
    connect_timeout: Duration,
    state: StringVar,
    starts: Counter,
    overrides: Gauge,
}

impl StandaloneTabletService {
    /// Builds a service that has not yet been started.
    #[must_use]
    pub fn new(config: ServerConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
            state: StringVar::new(NOT_SERVING),
            starts: Counter::new(),
            overrides: Gauge::new(),
        }
    }

    /// Configuration the service was built from.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current serving state name.
    #[must_use]
    pub fn state_name(&self) -> String {
        self.state.get()
    }

    /// Number of successful starts.
    #[must_use]
    pub fn starts(&self) -> i64 {
        self.starts.get()
    }

    fn check_database(&self, params: &ConnParams) -> Result<(), ServiceError> {
        if params.is_unset() {
            return Err(ServiceError::new(
                "connection parameters name neither a host nor a socket",
            ));
        }
        #[cfg(unix)]
        if let Some(socket) = &params.unix_socket {
            return std::os::unix::net::UnixStream::connect(socket)
                .map(drop)
                .map_err(|source| {
                    ServiceError::with_source(format!("database at {params} is unreachable"), source)
                });
        }
        let addrs = resolve(params).map_err(|source| {
            ServiceError::with_source(format!("could not resolve database at {params}"), source)
        })?;
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(_) => return Ok(()),
                Err(error) => {
                    debug!(
                        target: SERVICE_TARGET,
                        addr = %addr,
                        error = %error,
                        "database connection attempt failed"
                    );
                    last_error = Some(error);
                }
            }
        }
        let source = last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
        });
        Err(ServiceError::with_source(
            format!("database at {params} is unreachable"),
            source,
        ))
    }
}

fn resolve(params: &ConnParams) -> io::Result<Vec<SocketAddr>> {
    (params.host.as_str(), params.port)
        .to_socket_addrs()
        .map(Iterator::collect)
}

impl TabletService for StandaloneTabletService {
    fn register(&self, vars: &VarsRegistry) {
        let exported: [(&str, Arc<dyn ExportedVar>); 3] = [
            (TABLET_STATE_VAR, Arc::new(self.state.clone())),
            (QUERY_SERVICE_STARTS_VAR, Arc::new(self.starts.clone())),
            (SCHEMA_OVERRIDES_VAR, Arc::new(self.overrides.clone())),
        ];
        for (name, var) in exported {
            if let Err(error) = vars.publish(name, var) {
                warn!(target: SERVICE_TARGET, error = %error, "variable not exported");
            }
        }
    }

    fn start_service(&self, request: &StartRequest) -> Result<(), ServiceError> {
        let app = &request.dbconfigs.app;
        if request.target.keyspace != app.keyspace {
            return Err(ServiceError::new(format!(
                "target keyspace '{}' does not match database keyspace '{}'",
                request.target.keyspace, app.keyspace
            )));
        }
        self.check_database(&app.conn_params)?;

        let overrides = i64::try_from(request.schema_overrides.len()).unwrap_or(i64::MAX);
        self.overrides.set(overrides);
        self.starts.add(1);
        self.state.set(SERVING);
        info!(
            target: SERVICE_TARGET,
            tablet = %request.target,
            database = %app.conn_params,
            schema_overrides = overrides,
            "query service serving"
        );
        Ok(())
    }

    fn stop_service(&self) {
        self.state.set(NOT_SERVING);
    }
}
