//! Shared fixtures for the harness test suites.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use tempfile::TempDir;
use tokio::runtime::Runtime;

use tablet_harness_config::HarnessConfig;

use crate::lifecycle::{
    HarnessError, LifecycleState, StaticConfigLoader, TabletHarness, bootstrap_with,
};
use crate::service::StandaloneServiceFactory;
use crate::test_support::{FakeDatabase, RecordingReporter, unreachable_conn_params};
use crate::{ConnParams, ServerAddress, VARS_PATH};

/// Harness configuration tuned for fast, isolated tests.
pub fn test_config(runtime_dir: &TempDir) -> HarnessConfig {
    let runtime_dir = Utf8PathBuf::from_path_buf(runtime_dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir is not UTF-8: {}", path.display()));
    HarnessConfig {
        log_filter: "warn".to_owned(),
        probe_interval_ms: 5,
        probe_attempt_timeout_ms: 500,
        startup_timeout_ms: 5_000,
        runtime_dir,
        ..HarnessConfig::default()
    }
}

/// HTTP client that never reuses connections.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("build HTTP client")
}

/// Issues one `GET /debug/vars` against `address`.
pub async fn get_vars(address: &ServerAddress) -> reqwest::Result<reqwest::Response> {
    http_client()
        .get(format!("{address}{VARS_PATH}"))
        .send()
        .await
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    harness: TabletHarness<StandaloneServiceFactory>,
    pub reporter: Arc<RecordingReporter>,
    database: Option<FakeDatabase>,
    conn_params: ConnParams,
    pub last_address: Option<ServerAddress>,
    pub start_result: Option<Result<ServerAddress, HarnessError>>,
    pub stop_result: Option<Result<(), HarnessError>>,
    _runtime_dir: TempDir,
    runtime: Runtime,
}

impl TestWorld {
    /// Builds a world whose harness has not started.
    pub fn new() -> Self {
        let runtime_dir = TempDir::new().expect("runtime dir");
        let reporter = Arc::new(RecordingReporter::default());
        let loader = StaticConfigLoader::new(test_config(&runtime_dir));
        let harness = bootstrap_with(
            &loader,
            reporter.clone(),
            StandaloneServiceFactory::new(Duration::from_millis(500)),
        )
        .expect("bootstrap should succeed");
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("tokio runtime");
        Self {
            harness,
            reporter,
            database: None,
            conn_params: ConnParams::default(),
            last_address: None,
            start_result: None,
            stop_result: None,
            _runtime_dir: runtime_dir,
            runtime,
        }
    }

    /// Points the next start at a listening database.
    pub fn use_reachable_database(&mut self) {
        let database = FakeDatabase::bind().expect("bind fake database");
        self.conn_params = database.conn_params().expect("database params");
        self.database = Some(database);
    }

    /// Points the next start at a closed port.
    pub fn use_unreachable_database(&mut self) {
        self.database = None;
        self.conn_params = unreachable_conn_params().expect("unreachable params");
    }

    /// Runs one start and records its outcome.
    pub fn start(&mut self) {
        let params = self.conn_params.clone();
        let harness = &mut self.harness;
        let result = self.runtime.block_on(async move {
            harness
                .start(params, Vec::new())
                .await
                .map(|running| running.address().clone())
        });
        if let Ok(address) = &result {
            self.last_address = Some(address.clone());
        }
        self.start_result = Some(result);
    }

    /// Runs one stop and records its outcome.
    pub fn stop(&mut self) {
        let harness = &mut self.harness;
        self.stop_result = Some(self.runtime.block_on(harness.stop()));
    }

    /// Issues a vars request against the last published address.
    pub fn request_last_address(&self) -> Result<u16, String> {
        let address = self
            .last_address
            .as_ref()
            .ok_or_else(|| "no address was published".to_owned())?;
        self.runtime
            .block_on(get_vars(address))
            .map(|response| response.status().as_u16())
            .map_err(|error| error.to_string())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.harness.state()
    }

    /// Address currently published by the harness.
    pub fn published_address(&self) -> Option<&ServerAddress> {
        self.harness.address()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
