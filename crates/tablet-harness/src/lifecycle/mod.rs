//! Lifecycle of the hosted server: bootstrap, start, readiness, stop.

mod bootstrap;
mod controller;
mod errors;
mod state;

pub use self::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
pub use self::controller::{RunningServer, TabletHarness};
pub use self::errors::HarnessError;
pub use self::state::LifecycleState;
