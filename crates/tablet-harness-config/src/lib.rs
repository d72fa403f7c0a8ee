//! Shared configuration for the tablet test harness.
//!
//! [`HarnessConfig`] is resolved through `ortho_config`, layering built-in
//! defaults, an optional configuration file, `TABLET_HARNESS_*` environment
//! variables, and command-line flags (highest precedence). Malformed input
//! fails fast with an aggregated [`ortho_config::OrthoError`].
//!
//! The values here govern the harness itself: how it logs, where the
//! diagnostic listener binds, how aggressively the readiness probe polls,
//! and where the row cache keeps its runtime artefacts. The query-service
//! configuration handed to the engine is derived from these values by the
//! `tablet-harness` crate.

mod defaults;
mod logging;
mod probe;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    CACHE_SOCKET_NAME, DEFAULT_CACHE_BINARY, DEFAULT_LISTEN_HOST, DEFAULT_LOG_FILTER,
    DEFAULT_PROBE_ATTEMPT_TIMEOUT_MS, DEFAULT_PROBE_INTERVAL_MS, DEFAULT_STARTUP_TIMEOUT_MS,
    default_cache_binary, default_listen_host, default_log_filter, default_log_filter_string,
    default_log_format, default_runtime_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use probe::{ProbeSettings, ProbeSettingsError};

/// Harness configuration resolved from defaults, files, environment, and CLI.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "TABLET_HARNESS")]
pub struct HarnessConfig {
    /// Tracing filter expression applied to harness telemetry.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for harness telemetry.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Host the diagnostic listener binds to. The port is always ephemeral.
    #[ortho_config(default = defaults::default_listen_host())]
    pub listen_host: String,
    /// Delay between readiness probe attempts, in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_PROBE_INTERVAL_MS)]
    pub probe_interval_ms: u64,
    /// Timeout applied to each individual probe request, in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_PROBE_ATTEMPT_TIMEOUT_MS)]
    pub probe_attempt_timeout_ms: u64,
    /// Overall readiness deadline, in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_STARTUP_TIMEOUT_MS)]
    pub startup_timeout_ms: u64,
    /// Directory holding per-run artefacts such as the row cache socket.
    #[ortho_config(default = defaults::default_runtime_dir())]
    pub runtime_dir: Utf8PathBuf,
    /// Row cache binary launched by the query service.
    #[ortho_config(default = defaults::default_cache_binary())]
    pub cache_binary: Utf8PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            listen_host: defaults::default_listen_host(),
            probe_interval_ms: defaults::DEFAULT_PROBE_INTERVAL_MS,
            probe_attempt_timeout_ms: defaults::DEFAULT_PROBE_ATTEMPT_TIMEOUT_MS,
            startup_timeout_ms: defaults::DEFAULT_STARTUP_TIMEOUT_MS,
            runtime_dir: defaults::default_runtime_dir(),
            cache_binary: defaults::default_cache_binary(),
        }
    }
}

impl HarnessConfig {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Host used for the diagnostic listener.
    #[must_use]
    pub fn listen_host(&self) -> &str {
        self.listen_host.as_str()
    }

    /// Path of the row cache socket, derived from the runtime directory.
    ///
    /// Two runs sharing a runtime directory share this path; callers wanting
    /// isolation must point each run at its own directory.
    #[must_use]
    pub fn cache_socket_path(&self) -> Utf8PathBuf {
        self.runtime_dir.join(defaults::CACHE_SOCKET_NAME)
    }

    /// Readiness probe timing derived from the configured milliseconds.
    pub fn probe_settings(&self) -> Result<ProbeSettings, ProbeSettingsError> {
        ProbeSettings::new(
            Duration::from_millis(self.probe_interval_ms),
            Duration::from_millis(self.probe_attempt_timeout_ms),
            Duration::from_millis(self.startup_timeout_ms),
        )
    }
}
