//! Readiness probe for a freshly started server.
//!
//! The serving loop starts asynchronously, so a bound socket does not yet
//! mean requests are answered. The probe closes that window by polling the
//! exported variables endpoint until it answers, within a deadline and
//! subject to cancellation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tablet_harness_config::ProbeSettings;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::address::ServerAddress;

const PROBE_TARGET: &str = "tablet_harness::readiness";

/// Errors surfaced by [`ReadinessProbe`].
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The HTTP client could not be built.
    #[error("failed to build readiness probe client: {source}")]
    Client {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The server did not answer before the deadline.
    #[error("{url} did not answer after {attempts} attempts in {waited_ms} ms")]
    TimedOut {
        /// Endpoint that was polled.
        url: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// Time spent polling, in milliseconds.
        waited_ms: u64,
    },
    /// Polling was cancelled by the caller.
    #[error("readiness probe cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
    },
}

/// Polls a server's diagnostic endpoint until it answers.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: reqwest::Client,
    settings: ProbeSettings,
}

impl ReadinessProbe {
    /// Builds a probe whose client bypasses proxies and pools nothing.
    pub fn new(settings: ProbeSettings) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .timeout(settings.attempt_timeout())
            .build()
            .map_err(|source| ProbeError::Client { source })?;
        Ok(Self { client, settings })
    }

    /// Timing the probe runs with.
    #[must_use]
    pub const fn settings(&self) -> ProbeSettings {
        self.settings
    }

    /// Waits until `address` answers a request, returning the number of
    /// attempts made.
    ///
    /// Every attempt is preceded by the poll interval. Any HTTP response
    /// counts as an answer; connection failures and timeouts are retried.
    pub async fn wait_until_ready(
        &self,
        address: &ServerAddress,
        cancel: &CancellationToken,
    ) -> Result<u32, ProbeError> {
        let url = address.vars_url();
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let poll = async {
            loop {
                tokio::time::sleep(self.settings.interval()).await;
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                match self.client.get(url.clone()).send().await {
                    Ok(response) => {
                        debug!(
                            target: PROBE_TARGET,
                            url = %url,
                            attempt,
                            status = response.status().as_u16(),
                            "server answered readiness probe"
                        );
                        return;
                    }
                    Err(error) => {
                        trace!(
                            target: PROBE_TARGET,
                            url = %url,
                            attempt,
                            error = %error,
                            "readiness probe attempt failed"
                        );
                    }
                }
            }
        };

        tokio::select! {
            () = poll => Ok(attempts.load(Ordering::SeqCst)),
            () = tokio::time::sleep(self.settings.deadline()) => Err(ProbeError::TimedOut {
                url: url.to_string(),
                attempts: attempts.load(Ordering::SeqCst),
                waited_ms: millis(started.elapsed()),
            }),
            () = cancel.cancelled() => Err(ProbeError::Cancelled {
                attempts: attempts.load(Ordering::SeqCst),
            }),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
