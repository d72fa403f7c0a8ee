//! Unit tests for the lifecycle controller.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tablet_harness_config::HarnessConfig;

use crate::lifecycle::{HarnessError, LifecycleState, TabletHarness};
use crate::server_config::ServerConfig;
use crate::service::{MockTabletService, StandaloneServiceFactory, TABLET_STATE_VAR};
use crate::target::{HARNESS_KEYSPACE, HARNESS_SHARD, TabletType};
use crate::test_support::{
    FakeDatabase, LifecycleEvent, RecordingReporter, RecordingServiceFactory, ServiceCalls,
    unreachable_conn_params,
};
use crate::{DbRole, OverrideCacheDesc, SchemaOverride};

use super::support::{get_vars, test_config};

struct Fixture {
    runtime_dir: TempDir,
    reporter: Arc<RecordingReporter>,
    factory: RecordingServiceFactory,
    database: FakeDatabase,
}

impl Fixture {
    fn harness(&self) -> TabletHarness<RecordingServiceFactory> {
        self.harness_with(|_| {})
    }

    fn harness_with(
        &self,
        adjust: impl FnOnce(&mut HarnessConfig),
    ) -> TabletHarness<RecordingServiceFactory> {
        let mut config = test_config(&self.runtime_dir);
        adjust(&mut config);
        TabletHarness::new(config, self.factory.clone(), self.reporter.clone())
            .expect("harness should build")
    }

    fn calls(&self, pick: impl Fn(&ServiceCalls) -> &AtomicUsize) -> usize {
        ServiceCalls::get(pick(self.factory.calls()))
    }
}

#[fixture]
fn fixture() -> Fixture {
    Fixture {
        runtime_dir: TempDir::new().expect("runtime dir"),
        reporter: Arc::new(RecordingReporter::default()),
        factory: RecordingServiceFactory::new(),
        database: FakeDatabase::bind().expect("fake database"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_request_after_start_succeeds(fixture: Fixture) {
    let runtime_dir = TempDir::new().expect("runtime dir");
    let mut harness = TabletHarness::new(
        test_config(&runtime_dir),
        StandaloneServiceFactory::default(),
        fixture.reporter.clone(),
    )
    .expect("harness");
    let params = fixture.database.conn_params().expect("params");

    let address = harness
        .start(params, Vec::new())
        .await
        .expect("start should succeed")
        .address()
        .clone();

    let response = get_vars(&address).await.expect("first request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("vars body");
    assert_eq!(body.get(TABLET_STATE_VAR), Some(&Value::from("SERVING")));

    let rendered = address.to_string();
    let port = address.socket_addr().port();
    assert_eq!(rendered, format!("http://127.0.0.1:{port}"));
    assert_eq!(harness.address(), Some(&address));
    assert_eq!(harness.state(), LifecycleState::Ready);

    harness.stop().await.expect("stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_database_publishes_nothing(fixture: Fixture) {
    let runtime_dir = TempDir::new().expect("runtime dir");
    let mut harness = TabletHarness::new(
        test_config(&runtime_dir),
        StandaloneServiceFactory::new(Duration::from_millis(500)),
        fixture.reporter.clone(),
    )
    .expect("harness");

    let started = Instant::now();
    let error = harness
        .start(unreachable_conn_params().expect("params"), Vec::new())
        .await
        .expect_err("closed database port should fail the start");

    assert!(matches!(error, HarnessError::ServiceStart { .. }));
    assert!(error.to_string().starts_with("could not start service"));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(harness.address().is_none());
    assert!(harness.running().is_none());
    assert_eq!(harness.state(), LifecycleState::NotStarted);
    let events = fixture.reporter.events();
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, LifecycleEvent::ListenerBound(_))),
        "no listener should open: {events:?}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_passes_the_run_configuration_to_the_service(fixture: Fixture) {
    let mut harness = fixture.harness().with_tablet_type(TabletType::Replica);
    let params = fixture.database.conn_params().expect("params");
    let overrides = vec![SchemaOverride {
        name: "vitess_view".to_owned(),
        pk_columns: vec!["key2".to_owned()],
        cache: Some(OverrideCacheDesc {
            cache_type: "RW".to_owned(),
            prefix: String::new(),
            table: "vitess_part1".to_owned(),
        }),
    }];

    let expected_socket = harness.config().cache_socket_path();

    let running = harness
        .start(params.clone(), overrides.clone())
        .await
        .expect("start");

    let requests = running.service().requests();
    let request = requests.first().expect("one start request");
    assert_eq!(request.target.keyspace, HARNESS_KEYSPACE);
    assert_eq!(request.target.shard, HARNESS_SHARD);
    assert_eq!(request.target.tablet_type, TabletType::Replica);
    assert_eq!(request.dbconfigs.app.conn_params, params);
    assert!(request.dbconfigs.dba.is_unset());
    assert_eq!(request.schema_overrides, overrides);
    assert_eq!(request.process_manager.params_for(DbRole::App), &params);

    let config = running.base_config();
    assert!(config.row_cache.enabled);
    assert_eq!(config.row_cache.socket, expected_socket);
    assert!(config.enable_auto_commit);
    assert!(config.strict_table_acl);

    harness.stop().await.expect("stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn register_is_called_once_per_service(fixture: Fixture) {
    let factory = |_config: &ServerConfig| {
        let mut service = MockTabletService::new();
        service.expect_register().times(1).return_const(());
        service.expect_start_service().times(1).returning(|_| Ok(()));
        service.expect_stop_service().times(1).return_const(());
        service
    };
    let mut harness = TabletHarness::new(
        test_config(&fixture.runtime_dir),
        factory,
        fixture.reporter.clone(),
    )
    .expect("harness");
    let params = fixture.database.conn_params().expect("params");

    harness.start(params.clone(), Vec::new()).await.expect("first start");
    harness.stop().await.expect("first stop");
    harness.start(params, Vec::new()).await.expect("second start");
    harness.stop().await.expect("second stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_releases_the_listener(fixture: Fixture) {
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");
    let address = harness
        .start(params, Vec::new())
        .await
        .expect("start")
        .address()
        .clone();

    harness.stop().await.expect("stop");

    assert_eq!(harness.state(), LifecycleState::Stopped);
    assert!(harness.address().is_none());
    assert_eq!(fixture.calls(|calls| &calls.stopped), 1);
    let error = tokio::net::TcpStream::connect(address.socket_addr())
        .await
        .expect_err("listener should be closed");
    assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
    assert_eq!(
        fixture.reporter.events().last(),
        Some(&LifecycleEvent::StopCompleted)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_a_running_harness_stops_the_service(fixture: Fixture) {
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");
    let socket = harness
        .start(params, Vec::new())
        .await
        .expect("start")
        .address()
        .socket_addr();

    drop(harness);

    assert_eq!(fixture.calls(|calls| &calls.stopped), 1);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match tokio::net::TcpStream::connect(socket).await {
            Err(error) => {
                assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
                break;
            }
            Ok(_) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Ok(_) => panic!("listener on {socket} still accepts after drop"),
        }
    }
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn slow_service_start_leaves_the_runtime_responsive(fixture: Fixture) {
    let delay = Duration::from_millis(300);
    let factory = fixture.factory.clone().with_start_delay(delay);
    let mut harness = TabletHarness::new(
        test_config(&fixture.runtime_dir),
        factory,
        fixture.reporter.clone(),
    )
    .expect("harness should build");
    let params = fixture.database.conn_params().expect("params");
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let started = Instant::now();
    harness.start(params, Vec::new()).await.expect("start");

    assert!(started.elapsed() >= delay);
    assert!(
        ticks.load(Ordering::SeqCst) >= 5,
        "runtime stalled during the blocking start"
    );
    ticker.abort();
    harness.stop().await.expect("stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_waits_for_a_delayed_accept_loop(fixture: Fixture) {
    let delay = Duration::from_millis(300);
    let mut harness = fixture.harness().with_startup_delay(delay);
    let params = fixture.database.conn_params().expect("params");

    let started = Instant::now();
    let address = harness
        .start(params, Vec::new())
        .await
        .expect("start")
        .address()
        .clone();

    assert!(
        started.elapsed() >= delay,
        "start returned after {:?}",
        started.elapsed()
    );
    let response = get_vars(&address).await.expect("request after start");
    assert!(response.status().is_success());
    harness.stop().await.expect("stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readiness_timeout_stops_the_service(fixture: Fixture) {
    let mut harness = fixture
        .harness_with(|config| {
            config.startup_timeout_ms = 200;
            config.probe_attempt_timeout_ms = 100;
        })
        .with_startup_delay(Duration::from_secs(30));
    let params = fixture.database.conn_params().expect("params");

    let error = harness
        .start(params, Vec::new())
        .await
        .expect_err("probe should time out");

    assert!(error.is_timeout(), "unexpected error: {error}");
    assert!(harness.address().is_none());
    assert_eq!(harness.state(), LifecycleState::NotStarted);
    assert_eq!(fixture.calls(|calls| &calls.started), 1);
    assert_eq!(fixture.calls(|calls| &calls.stopped), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_abandons_the_start(fixture: Fixture) {
    let mut harness = fixture.harness().with_startup_delay(Duration::from_secs(30));
    let params = fixture.database.conn_params().expect("params");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let error = harness
        .start_cancellable(params, Vec::new(), &cancel)
        .await
        .expect_err("start should be cancelled");

    assert!(error.is_cancelled(), "unexpected error: {error}");
    assert!(harness.address().is_none());
    assert_eq!(fixture.calls(|calls| &calls.stopped), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listener_failure_stops_the_started_service(fixture: Fixture) {
    let mut harness = fixture.harness_with(|config| {
        config.listen_host = "192.0.2.1".to_owned();
    });
    let params = fixture.database.conn_params().expect("params");

    let error = harness
        .start(params, Vec::new())
        .await
        .expect_err("bind should fail");

    assert!(matches!(error, HarnessError::Listener { .. }));
    assert!(error.to_string().starts_with("could not start listener"));
    assert_eq!(fixture.calls(|calls| &calls.started), 1);
    assert_eq!(fixture.calls(|calls| &calls.stopped), 1);
    assert_eq!(harness.state(), LifecycleState::NotStarted);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn service_failure_leaves_nothing_to_tear_down(fixture: Fixture) {
    fixture.factory.fail_with("schema invalid");
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");

    let error = harness
        .start(params, Vec::new())
        .await
        .expect_err("service should fail");

    assert_eq!(
        error.to_string(),
        "could not start service: schema invalid"
    );
    assert_eq!(fixture.calls(|calls| &calls.stopped), 0);
    assert!(matches!(
        fixture.reporter.events().last(),
        Some(LifecycleEvent::StartFailed(_))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_failed_start_can_be_retried(fixture: Fixture) {
    fixture.factory.fail_with("database warming up");
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");

    harness
        .start(params.clone(), Vec::new())
        .await
        .expect_err("first start fails");
    fixture.factory.succeed();
    harness
        .start(params, Vec::new())
        .await
        .expect("retry succeeds");

    assert_eq!(harness.state(), LifecycleState::Ready);
    assert_eq!(fixture.calls(|calls| &calls.constructed), 2);
    harness.stop().await.expect("stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_start_while_ready_is_rejected(fixture: Fixture) {
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");
    harness.start(params.clone(), Vec::new()).await.expect("start");

    let error = harness
        .start(params, Vec::new())
        .await
        .expect_err("second start should be rejected");

    assert!(matches!(
        error,
        HarnessError::InvalidState {
            operation: "start",
            state: LifecycleState::Ready,
        }
    ));
    assert_eq!(fixture.calls(|calls| &calls.constructed), 1);
    assert!(harness.address().is_some());
    harness.stop().await.expect("stop");
}

#[rstest]
#[tokio::test]
async fn stop_before_start_is_rejected(fixture: Fixture) {
    let mut harness = fixture.harness();

    let error = harness.stop().await.expect_err("nothing to stop");

    assert!(matches!(
        error,
        HarnessError::InvalidState {
            operation: "stop",
            state: LifecycleState::NotStarted,
        }
    ));
    assert!(fixture.reporter.events().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_builds_a_fresh_service_and_registry(fixture: Fixture) {
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");

    harness
        .start(params.clone(), Vec::new())
        .await
        .expect("first start");
    harness.stop().await.expect("first stop");
    let second = harness
        .start(params, Vec::new())
        .await
        .expect("second start")
        .address()
        .clone();

    let response = get_vars(&second).await.expect("request after restart");
    assert!(response.status().is_success());
    assert_eq!(fixture.calls(|calls| &calls.constructed), 2);
    assert_eq!(fixture.calls(|calls| &calls.registered), 2);
    let running = harness.running().expect("running server");
    assert_eq!(running.vars().names(), vec!["RecordingStarts".to_owned()]);
    harness.stop().await.expect("second stop");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_events_arrive_in_order(fixture: Fixture) {
    let mut harness = fixture.harness();
    let params = fixture.database.conn_params().expect("params");
    let address = harness
        .start(params, Vec::new())
        .await
        .expect("start")
        .address()
        .to_string();
    harness.stop().await.expect("stop");

    assert_eq!(
        fixture.reporter.events(),
        vec![
            LifecycleEvent::StartRequested,
            LifecycleEvent::ServiceStarted,
            LifecycleEvent::ListenerBound(address.clone()),
            LifecycleEvent::ServerReady(address),
            LifecycleEvent::StopRequested,
            LifecycleEvent::StopCompleted,
        ]
    );
}
