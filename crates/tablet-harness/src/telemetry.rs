//! Log output for harness runs.
//!
//! Integration suites usually start many harnesses in one test binary, so
//! the subscriber is installed at most once per process and every later
//! bootstrap reuses it. Output goes to stderr to stay clear of the test
//! harness's own stdout capture.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use tablet_harness_config::{HarnessConfig, LogFormat};

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Proof that harness logging is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format chosen by the bootstrap that installed the subscriber.
    ///
    /// Later bootstraps asking for another format still see this one.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Errors raised while installing harness logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another subscriber was installed before the harness's.
    #[error("failed to install telemetry subscriber: {source}")]
    Subscriber {
        /// Error from `tracing`.
        #[source]
        source: SetGlobalDefaultError,
    },
}

/// Installs the process-wide subscriber on the first call.
///
/// A test binary that set its own global subscriber first gets
/// [`TelemetryError::Subscriber`].
///
/// ```rust
/// use tablet_harness::telemetry;
/// use tablet_harness_config::{HarnessConfig, LogFormat};
///
/// # fn main() -> Result<(), tablet_harness::TelemetryError> {
/// let handle = telemetry::initialise(&HarnessConfig::default())?;
/// let compact = HarnessConfig {
///     log_format: LogFormat::Compact,
///     ..HarnessConfig::default()
/// };
/// assert_eq!(telemetry::initialise(&compact)?.format(), handle.format());
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &HarnessConfig) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED_FORMAT
        .get_or_try_init(|| {
            let subscriber = build_subscriber(config)?;
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|source| TelemetryError::Subscriber { source })?;
            Ok(config.log_format())
        })
        .map(|format| TelemetryHandle { format: *format })
}

fn build_subscriber(config: &HarnessConfig) -> Result<BoxedSubscriber, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}
