//! Harness bootstrap: configuration, telemetry, then the controller.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};

use tablet_harness_config::HarnessConfig;

use crate::health::LifecycleReporter;
use crate::service::ServiceFactory;
use crate::telemetry;

use super::{HarnessError, TabletHarness};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the harness configuration.
    fn load(&self) -> Result<HarnessConfig, Arc<OrthoError>>;
}

/// Loader that delegates to [`HarnessConfig::load`], reading the process
/// arguments, `TABLET_HARNESS_*` variables, and any configuration file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<HarnessConfig, Arc<OrthoError>> {
        HarnessConfig::load()
    }
}

/// Loader that returns a configuration fixed up front.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: HarnessConfig,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<HarnessConfig, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loads configuration, initialises telemetry, and builds a harness that
/// has not yet started a server.
pub fn bootstrap_with<F>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn LifecycleReporter>,
    factory: F,
) -> Result<TabletHarness<F>, HarnessError>
where
    F: ServiceFactory,
{
    let events = Arc::clone(&reporter);
    let fail = |error: HarnessError| {
        events.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(HarnessError::Configuration { source }))?;
    telemetry::initialise(&config)
        .map_err(|source| fail(HarnessError::Telemetry { source }))?;
    let harness = TabletHarness::new(config, factory, reporter).map_err(fail)?;

    events.bootstrap_succeeded(harness.config());
    Ok(harness)
}
