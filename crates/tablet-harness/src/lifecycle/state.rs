//! Lifecycle states of the harness.

use std::fmt;

/// Where the harness is in its start/stop cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No start has succeeded yet.
    #[default]
    NotStarted,
    /// A server is running and its address is published.
    Ready,
    /// The last server was stopped. A new start is allowed.
    Stopped,
}

impl LifecycleState {
    /// Returns true when `start` is accepted from this state.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::NotStarted | Self::Stopped)
    }

    /// Returns true when `stop` is accepted from this state.
    #[must_use]
    pub const fn can_stop(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
        };
        formatter.write_str(label)
    }
}
