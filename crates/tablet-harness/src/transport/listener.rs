//! Listener implementation for the diagnostic endpoint.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{LISTENER_TARGET, ListenerError};

/// Diagnostic listener bound to an ephemeral port but not yet serving.
#[derive(Debug)]
pub struct DiagnosticListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    #[cfg(test)]
    startup_delay: Duration,
}

impl DiagnosticListener {
    /// Binds an OS-assigned port on `host`.
    pub async fn bind(host: &str) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind((host, 0))
            .await
            .map_err(|source| ListenerError::Bind {
                host: host.to_owned(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            local_addr,
            #[cfg(test)]
            startup_delay: Duration::ZERO,
        })
    }

    /// Address the socket is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Holds back the serving loop for `delay` after [`Self::start`].
    ///
    /// Connections made during the delay queue in the socket backlog.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Spawns the serving loop on the current runtime.
    pub fn start(self, router: Router) -> ListenerHandle {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        #[cfg(test)]
        let startup_delay = self.startup_delay;
        #[cfg(not(test))]
        let startup_delay = Duration::ZERO;
        let Self {
            listener,
            local_addr,
            ..
        } = self;
        let task = tokio::spawn(async move {
            if !startup_delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(startup_delay) => {}
                    () = signal.cancelled() => return Ok(()),
                }
            }
            info!(
                target: LISTENER_TARGET,
                addr = %local_addr,
                "diagnostic listener active"
            );
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(signal.cancelled_owned())
                .await;
            debug!(
                target: LISTENER_TARGET,
                addr = %local_addr,
                "diagnostic listener stopped"
            );
            result
        });
        ListenerHandle {
            shutdown,
            task: Some(task),
        }
    }
}

/// Handle to the supervised serving task.
///
/// Dropping the handle signals shutdown without waiting for the task.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<io::Result<()>>>,
}

impl ListenerHandle {
    /// Signals the serving loop to stop accepting connections.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits for the serving loop to exit and releases the socket.
    pub async fn join(mut self) -> Result<(), ListenerError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ListenerError::Serve { source }),
            Err(error) => Err(ListenerError::Task {
                message: error.to_string(),
            }),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
