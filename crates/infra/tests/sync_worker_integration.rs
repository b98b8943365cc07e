//! Integration tests for the background sync worker
//!
//! **Infrastructure:**
//! - Real SQLCipher operation store (tempdir)
//! - WireMock submission server
//! - `SyncWorker` driving a real `SyncEngine`

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use shiftsync_common::testing::poll_until;
use shiftsync_core::{EngineConfig, NetworkMonitor, SyncEngine};
use shiftsync_domain::{OwnerContext, ShiftSyncError};
use shiftsync_infra::http::{HttpClient, HttpSubmitter};
use shiftsync_infra::sync::{ConnectivityProbe, PollingWakeTrigger, SyncWorker, SyncWorkerConfig};
use support::TestDatabase;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn worker_config() -> SyncWorkerConfig {
    SyncWorkerConfig {
        interval: Duration::from_secs(60),
        shutdown_timeout: Duration::from_secs(5),
        run_on_start: true,
    }
}

fn http_submitter(server: &MockServer) -> Arc<HttpSubmitter> {
    let client = HttpClient::builder().timeout(Duration::from_secs(2)).build().unwrap();
    Arc::new(HttpSubmitter::new(client, server.uri()))
}

async fn accepting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex("^/sync/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "confirmationId": "ok" })))
        .mount(&server)
        .await;
    server
}

fn engine(db: &TestDatabase, server: &MockServer, network: Arc<NetworkMonitor>) -> SyncEngine {
    SyncEngine::builder(db.store.clone(), http_submitter(server))
        .network(network)
        .config(EngineConfig { retry_timers: false, ..EngineConfig::default() })
        .build()
}

async fn wait_for_completed(engine: &SyncEngine, expected: usize) -> bool {
    poll_until(Duration::from_secs(3), Duration::from_millis(20), || async move {
        engine.queue_status().await.is_ok_and(|status| status.counts.completed >= expected)
    })
    .await
}

/// Validates the worker drains the queue on start.
///
/// Assertions:
/// - Confirms queued work is delivered by the startup cycle
/// - Confirms the worker stops cleanly
#[tokio::test]
async fn startup_cycle_delivers_queued_work() {
    let db = TestDatabase::new();
    let server = accepting_server().await;
    let engine = engine(&db, &server, Arc::new(NetworkMonitor::new(true)));
    engine.record_audit(json!({ "action": "fridge-opened" }), OwnerContext::default()).await.unwrap();

    let mut worker = SyncWorker::new(engine.clone(), worker_config());
    worker.start().await.unwrap();

    assert!(wait_for_completed(&engine, 1).await, "audit entry should be delivered");
    assert!(worker.is_running().await);

    worker.stop().await.unwrap();
    assert!(!worker.is_running().await);
}

/// Validates connectivity changes trigger a cycle.
///
/// Assertions:
/// - Confirms nothing is sent while offline
/// - Confirms going online delivers the backlog without a timer tick
#[tokio::test]
async fn network_online_triggers_cycle() {
    let db = TestDatabase::new();
    let server = accepting_server().await;
    let network = Arc::new(NetworkMonitor::new(false));
    let engine = engine(&db, &server, Arc::clone(&network));
    engine.record_sop_access(json!({ "sopId": "s-1" }), OwnerContext::default()).await.unwrap();

    let mut worker = SyncWorker::new(engine.clone(), worker_config());
    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.received_requests().await.unwrap().is_empty());

    network.set_online(true);

    assert!(wait_for_completed(&engine, 1).await, "backlog should drain once online");
    worker.shutdown().await.unwrap();
    assert!(engine.is_shut_down());
}

/// Validates the start/stop contract.
///
/// Assertions:
/// - Confirms a second start is rejected
/// - Confirms stop on a stopped worker is rejected
/// - Confirms the worker can be restarted
#[tokio::test]
async fn lifecycle_rejects_double_start_and_stop() {
    let db = TestDatabase::new();
    let server = accepting_server().await;
    let engine = engine(&db, &server, Arc::new(NetworkMonitor::new(true)));
    let mut worker = SyncWorker::new(engine, worker_config());

    worker.start().await.unwrap();
    assert!(matches!(worker.start().await, Err(ShiftSyncError::Config(_))));

    worker.stop().await.unwrap();
    assert!(matches!(worker.stop().await, Err(ShiftSyncError::Config(_))));

    worker.start().await.unwrap();
    worker.stop().await.unwrap();
}

/// Validates the polling wake trigger resumes delivery.
///
/// Assertions:
/// - Confirms the offline cycle arms the wake trigger
/// - Confirms a reachable health endpoint flips the monitor online and the
///   emergency report is delivered
#[tokio::test]
async fn polling_wake_trigger_resumes_sync() {
    let db = TestDatabase::new();
    let server = accepting_server().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let network = Arc::new(NetworkMonitor::new(false));
    let client = HttpClient::builder().timeout(Duration::from_secs(2)).build().unwrap();
    let probe = Arc::new(ConnectivityProbe::new(client, format!("{}/health", server.uri())));
    let wake = Arc::new(PollingWakeTrigger::new(
        Arc::clone(&probe),
        Arc::clone(&network),
        Duration::from_millis(50),
    ));

    let engine = SyncEngine::builder(db.store.clone(), http_submitter(&server))
        .network(Arc::clone(&network))
        .wake_trigger(wake.clone())
        .config(EngineConfig { retry_timers: false, ..EngineConfig::default() })
        .build();
    engine
        .report_emergency(json!({ "kind": "fire", "location": "kitchen" }), OwnerContext::default())
        .await
        .unwrap();

    let mut worker = SyncWorker::new(engine.clone(), worker_config()).with_probe(probe);
    worker.start().await.unwrap();

    assert!(wait_for_completed(&engine, 1).await, "wake should deliver the emergency report");
    assert!(network.is_online());

    worker.stop().await.unwrap();
}

/// Validates the probe publishes reachability.
///
/// Assertions:
/// - Confirms an unreachable URL marks the monitor offline
#[tokio::test]
async fn probe_marks_unreachable_host_offline() {
    let network = Arc::new(NetworkMonitor::new(true));
    let client = HttpClient::builder().timeout(Duration::from_millis(500)).build().unwrap();
    let probe = ConnectivityProbe::new(client, "http://127.0.0.1:9/health");

    assert!(!probe.refresh(&network).await);
    assert!(!network.is_online());
}
