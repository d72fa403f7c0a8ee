//! Query-service configuration built once per harness run.

use std::time::Duration;

use camino::Utf8PathBuf;
use once_cell::sync::Lazy;
use serde::Serialize;

use tablet_harness_config::HarnessConfig;

/// Row cache connections opened for a harness run.
pub const HARNESS_CACHE_CONNECTIONS: u32 = 100;

static PROCESS_DEFAULT: Lazy<ServerConfig> = Lazy::new(ServerConfig::default);

/// Row cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowCacheConfig {
    /// Whether the row cache is used at all.
    pub enabled: bool,
    /// Cache binary to launch.
    pub binary: Utf8PathBuf,
    /// Unix socket the cache listens on.
    pub socket: Utf8PathBuf,
    /// Size of the cache connection pool. Zero leaves the engine default.
    pub connections: u32,
    /// Memory budget in megabytes. Zero leaves the engine default.
    pub memory_mb: u32,
    /// Worker threads. Zero leaves the engine default.
    pub threads: u32,
}

/// Configuration handed to [`crate::ServiceFactory::construct`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// Connections in the query pool.
    pub pool_size: u32,
    /// Connections in the streaming pool.
    pub stream_pool_size: u32,
    /// Maximum concurrent transactions.
    pub transaction_cap: u32,
    /// Transaction lifetime before it is killed.
    pub transaction_timeout: Duration,
    /// Per-query timeout. Zero disables it.
    pub query_timeout: Duration,
    /// Idle time before pooled connections are recycled.
    pub idle_timeout: Duration,
    /// Interval between schema reloads.
    pub schema_reload_time: Duration,
    /// Maximum rows returned by a non-streaming query.
    pub max_result_size: u32,
    /// Entries kept in the query plan cache.
    pub query_cache_size: u32,
    /// Row cache settings.
    pub row_cache: RowCacheConfig,
    /// Rejects queries the planner cannot fully validate.
    pub strict_mode: bool,
    /// Wraps single statements in implicit transactions.
    pub enable_auto_commit: bool,
    /// Denies access to tables without an explicit ACL.
    pub strict_table_acl: bool,
    /// Prefix for the diagnostic endpoints.
    pub debug_url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            stream_pool_size: 750,
            transaction_cap: 20,
            transaction_timeout: Duration::from_secs(30),
            query_timeout: Duration::ZERO,
            idle_timeout: Duration::from_secs(30 * 60),
            schema_reload_time: Duration::from_secs(30 * 60),
            max_result_size: 10_000,
            query_cache_size: 5_000,
            row_cache: RowCacheConfig::default(),
            strict_mode: true,
            enable_auto_commit: false,
            strict_table_acl: false,
            debug_url_prefix: "/debug".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Process-wide default configuration, built on first use.
    #[must_use]
    pub fn process_default() -> &'static Self {
        &PROCESS_DEFAULT
    }

    /// Copies the process default and applies the per-run overrides.
    ///
    /// The row cache is enabled with its binary from `harness` and its socket
    /// under `harness.runtime_dir`, and the run enables auto-commit and strict
    /// table ACLs.
    #[must_use]
    pub fn for_run(harness: &HarnessConfig) -> Self {
        let mut config = Self::process_default().clone();
        config.row_cache.enabled = true;
        config.row_cache.binary = harness.cache_binary.clone();
        config.row_cache.socket = harness.cache_socket_path();
        config.row_cache.connections = HARNESS_CACHE_CONNECTIONS;
        config.enable_auto_commit = true;
        config.strict_table_acl = true;
        config
    }
}
