//! Contracts the harness requires from the query service it hosts.
//!
//! The harness never executes queries itself. It constructs a service from
//! a [`ServerConfig`], registers the service's diagnostic variables, asks it
//! to start against the backing database, and stops it during teardown.

mod standalone;

use std::error::Error as StdError;

use thiserror::Error;

use crate::dbconfig::DbConfigs;
use crate::process_manager::DatabaseProcessManager;
use crate::schema::SchemaOverride;
use crate::server_config::ServerConfig;
use crate::target::Target;
use crate::vars::VarsRegistry;

pub use self::standalone::{
    DEFAULT_CONNECT_TIMEOUT, QUERY_SERVICE_STARTS_VAR, SCHEMA_OVERRIDES_VAR,
    StandaloneServiceFactory, StandaloneTabletService, TABLET_STATE_VAR,
};

/// Everything the service needs to start serving one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Dataset the service serves.
    pub target: Target,
    /// Role-labelled database connection parameters.
    pub dbconfigs: DbConfigs,
    /// Schema overrides applied on top of the discovered schema.
    pub schema_overrides: Vec<SchemaOverride>,
    /// Database process manager, passed through untouched.
    pub process_manager: DatabaseProcessManager,
}

/// A query service the harness can host.
#[cfg_attr(test, mockall::automock)]
pub trait TabletService: Send + Sync + 'static {
    /// Publishes the service's diagnostic variables.
    ///
    /// The harness calls this exactly once per constructed service.
    fn register(&self, vars: &VarsRegistry);

    /// Starts serving `request.target`.
    ///
    /// May block while connections are established. Must not return `Ok`
    /// until the service can accept requests, and must fail fast when the
    /// backing database is unreachable.
    fn start_service(&self, request: &StartRequest) -> Result<(), ServiceError>;

    /// Best-effort shutdown. Safe to call more than once.
    fn stop_service(&self);
}

/// Builds services from the per-run configuration.
pub trait ServiceFactory: Send + Sync {
    /// Service type produced by this factory.
    type Service: TabletService;

    /// Constructs a service that has not yet been started.
    fn construct(&self, config: &ServerConfig) -> Self::Service;
}

impl<S, F> ServiceFactory for F
where
    S: TabletService,
    F: Fn(&ServerConfig) -> S + Send + Sync,
{
    type Service = S;

    fn construct(&self, config: &ServerConfig) -> S {
        self(config)
    }
}

/// Error reported by a service that failed to start.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ServiceError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}
