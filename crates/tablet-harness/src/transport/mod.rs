//! Diagnostic HTTP listener for the hosted service.
//!
//! The listener binds an ephemeral TCP port and serves the diagnostic
//! router from a supervised tokio task that stops when its handle signals
//! shutdown.

mod diagnostics;
mod errors;
mod listener;

pub use self::diagnostics::{VARS_PATH, router};
pub use self::errors::ListenerError;
pub use self::listener::{DiagnosticListener, ListenerHandle};

const LISTENER_TARGET: &str = "tablet_harness::transport";
