//! Test fixture that hosts one tablet query server per integration run.
//!
//! [`TabletHarness`] owns the full lifecycle of the server: it derives the
//! per-run [`ServerConfig`], constructs and registers the service, starts it
//! against the caller's database, opens a diagnostic listener on an
//! ephemeral port, and blocks until that listener answers
//! `GET /debug/vars`. Only then is the [`ServerAddress`] published, so a
//! caller can never observe an address that is not yet serving.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tablet_harness::{
//!     ConnParams, StandaloneServiceFactory, StaticConfigLoader, StructuredLifecycleReporter,
//!     bootstrap_with,
//! };
//! use tablet_harness_config::HarnessConfig;
//!
//! # async fn run() -> Result<(), tablet_harness::HarnessError> {
//! let loader = StaticConfigLoader::new(HarnessConfig::default());
//! let mut harness = bootstrap_with(
//!     &loader,
//!     Arc::new(StructuredLifecycleReporter::new()),
//!     StandaloneServiceFactory::default(),
//! )?;
//! let params = ConnParams::tcp("127.0.0.1", 3306).with_dbname("vttest");
//! let address = harness.start(params, Vec::new()).await?.address().clone();
//! println!("serving at {address}");
//! harness.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Readiness polling is bounded by the configured startup timeout and may be
//! cancelled through [`TabletHarness::start_cancellable`]. A start that fails
//! after the service came up stops the service again before returning.

mod address;
mod dbconfig;
mod health;
mod lifecycle;
mod process_manager;
mod readiness;
mod schema;
mod server_config;
mod service;
mod target;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
mod transport;
mod vars;

pub use address::ServerAddress;
pub use dbconfig::{ConnParams, DEFAULT_CHARSET, DbConfig, DbConfigs, DbRole, DbRoleParseError};
pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use lifecycle::{
    ConfigLoader, HarnessError, LifecycleState, RunningServer, StaticConfigLoader,
    SystemConfigLoader, TabletHarness, bootstrap_with,
};
pub use process_manager::{DatabaseProcessManager, Mycnf};
pub use readiness::{ProbeError, ReadinessProbe};
pub use schema::{OverrideCacheDesc, SchemaOverride, SchemaOverrideError, load_schema_overrides};
pub use server_config::{HARNESS_CACHE_CONNECTIONS, RowCacheConfig, ServerConfig};
pub use service::{
    DEFAULT_CONNECT_TIMEOUT, QUERY_SERVICE_STARTS_VAR, SCHEMA_OVERRIDES_VAR, ServiceError,
    ServiceFactory, StandaloneServiceFactory, StandaloneTabletService, StartRequest,
    TABLET_STATE_VAR, TabletService,
};
pub use target::{HARNESS_KEYSPACE, HARNESS_SHARD, TabletType, TabletTypeParseError, Target};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{DiagnosticListener, ListenerError, ListenerHandle, VARS_PATH, router};
pub use vars::{CMDLINE_VAR, Counter, ExportedVar, Gauge, StringVar, VarsError, VarsRegistry};

#[cfg(test)]
mod tests;
