//! Error types for the diagnostic listener.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding or running the diagnostic listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// No ephemeral port could be bound on the host.
    #[error("failed to bind diagnostic listener on {host}: {source}")]
    Bind {
        /// Host the bind was attempted on.
        host: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bound socket did not report its address.
    #[error("failed to read diagnostic listener address: {source}")]
    LocalAddr {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bound address could not be expressed as a URL.
    #[error("diagnostic listener address {addr} is not a valid URL: {source}")]
    Address {
        /// Address as reported by the socket.
        addr: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The serving loop exited with an error.
    #[error("diagnostic serving loop failed: {source}")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The serving task panicked or was aborted.
    #[error("diagnostic serving task did not complete: {message}")]
    Task {
        /// Description reported by the runtime.
        message: String,
    },
}
