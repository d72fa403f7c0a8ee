use std::env;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the harness.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Host the diagnostic listener binds to unless overridden.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";

/// Poll interval between readiness probe attempts.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 10;

/// Timeout for a single readiness probe request.
pub const DEFAULT_PROBE_ATTEMPT_TIMEOUT_MS: u64 = 1_000;

/// Overall deadline for the readiness probe.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;

/// Row cache binary resolved through `PATH` unless overridden.
pub const DEFAULT_CACHE_BINARY: &str = "memcached";

/// File name of the row cache socket inside the runtime directory.
pub const CACHE_SOCKET_NAME: &str = "memcache.sock";

/// Default log filter expression used by the harness.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned listener host.
#[must_use]
pub fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_owned()
}

/// Host temporary directory, falling back to `/tmp` for non UTF-8 paths.
#[must_use]
pub fn default_runtime_dir() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

/// Row cache binary name.
#[must_use]
pub fn default_cache_binary() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CACHE_BINARY)
}
