//! Rollout polling and definition fetch against mock control-plane services.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sidecar_control_plane::rollout::{
    LatestRolloutIdSource, RolloutController, ServiceControlRolloutIdSource, ServiceDefinitionFetcher,
};
use sidecar_control_plane::ControlPlaneError;

mod common;

const SERVICE: &str = "bookstore.endpoints.my-project.cloud.goog";

#[tokio::test]
async fn test_report_returns_rollout_id() {
    let addr: SocketAddr = "127.0.0.1:29311".parse().unwrap();
    common::start_programmable_backend(addr, |req| async move {
        let expected = format!("/v1/services/{}:report", SERVICE);
        if req.method != "POST" || req.path() != expected {
            return (404, String::new());
        }
        if req.header("authorization") != Some("Bearer test-token") {
            return (403, String::new());
        }
        (200, r#"{"serviceRolloutId": "2024-05-01r0", "serviceConfigId": "2024-05-01r0"}"#.into())
    })
    .await;

    let source = ServiceControlRolloutIdSource::new(
        &format!("http://{}", addr),
        SERVICE,
        Arc::new(common::StaticToken("test-token")),
        Duration::from_secs(2),
    )
    .unwrap();

    assert_eq!(source.latest_rollout_id().await.unwrap(), "2024-05-01r0");
}

#[tokio::test]
async fn test_report_error_status() {
    let addr: SocketAddr = "127.0.0.1:29312".parse().unwrap();
    common::start_programmable_backend(addr, |_| async { (503, String::new()) }).await;

    let source = ServiceControlRolloutIdSource::new(
        &format!("http://{}", addr),
        SERVICE,
        Arc::new(common::StaticToken("test-token")),
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(matches!(
        source.latest_rollout_id().await,
        Err(ControlPlaneError::TransientNetwork(_))
    ));
}

#[tokio::test]
async fn test_poll_loop_detects_change() {
    let addr: SocketAddr = "127.0.0.1:29314".parse().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    common::start_programmable_backend(addr, move |_| {
        let counter = counter.clone();
        async move {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let id = if call >= 3 { "rollout-2" } else { "rollout-1" };
            (200, format!(r#"{{"serviceRolloutId": "{}"}}"#, id))
        }
    })
    .await;

    let source = ServiceControlRolloutIdSource::new(
        &format!("http://{}", addr),
        SERVICE,
        Arc::new(common::StaticToken("test-token")),
        Duration::from_secs(2),
    )
    .unwrap();
    let controller = RolloutController::new(Arc::new(source)).with_current_rollout_id("rollout-1");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = controller.start(Duration::from_millis(50), move |id| {
        sink.lock().unwrap().push(id);
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.abort();

    assert_eq!(*seen.lock().unwrap(), vec!["rollout-2".to_string()]);
    assert_eq!(controller.current_rollout_id(), "rollout-2");
    assert!(calls.load(Ordering::SeqCst) >= 3);
}

async fn start_service_management(addr: SocketAddr, percentages: &'static str, config_fetches: Arc<AtomicU32>) {
    common::start_programmable_backend(addr, move |req| {
        let config_fetches = config_fetches.clone();
        async move {
            let rollouts = format!("/v1/services/{}/rollouts/", SERVICE);
            let configs = format!("/v1/services/{}/configs/", SERVICE);
            let path = req.path().to_string();

            if let Some(rollout_id) = path.strip_prefix(&rollouts) {
                let body = format!(
                    r#"{{"rolloutId": "{}", "serviceName": "{}", "trafficPercentStrategy": {{"percentages": {}}}}}"#,
                    rollout_id, SERVICE, percentages
                );
                return (200, body);
            }
            if let Some(config_id) = path.strip_prefix(&configs) {
                if !req.target.ends_with("?view=FULL") {
                    return (404, String::new());
                }
                config_fetches.fetch_add(1, Ordering::SeqCst);
                let body = format!(
                    r#"{{"name": "{}", "id": "{}", "control": {{"environment": "servicecontrol.googleapis.com"}}}}"#,
                    SERVICE, config_id
                );
                return (200, body);
            }
            (404, String::new())
        }
    })
    .await;
}

#[tokio::test]
async fn test_fetch_for_rollout_selects_highest_traffic() {
    let addr: SocketAddr = "127.0.0.1:29315".parse().unwrap();
    let config_fetches = Arc::new(AtomicU32::new(0));
    start_service_management(addr, r#"{"config-a": 20.0, "config-b": 80.0}"#, config_fetches.clone()).await;

    let mut fetcher = ServiceDefinitionFetcher::new(
        &format!("http://{}", addr),
        SERVICE,
        Arc::new(common::StaticToken("test-token")),
        Duration::from_secs(2),
    )
    .unwrap();

    let definition = fetcher.fetch_for_rollout("rollout-1").await.unwrap().unwrap();
    assert_eq!(definition.id, "config-b");
    assert_eq!(definition.control.environment, "servicecontrol.googleapis.com");
    assert_eq!(fetcher.current_config_id(), "config-b");

    // Same selection again is a no-op
    assert!(fetcher.fetch_for_rollout("rollout-2").await.unwrap().is_none());
    assert_eq!(config_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fetch_for_rollout_tie_is_stable() {
    let addr: SocketAddr = "127.0.0.1:29316".parse().unwrap();
    start_service_management(addr, r#"{"config-z": 50.0, "config-a": 50.0}"#, Arc::new(AtomicU32::new(0))).await;

    let mut fetcher = ServiceDefinitionFetcher::new(
        &format!("http://{}", addr),
        SERVICE,
        Arc::new(common::StaticToken("test-token")),
        Duration::from_secs(2),
    )
    .unwrap();

    let definition = fetcher.fetch_for_rollout("rollout-1").await.unwrap().unwrap();
    assert_eq!(definition.id, "config-z");
}

#[tokio::test]
async fn test_empty_rollout_is_rejected() {
    let addr: SocketAddr = "127.0.0.1:29317".parse().unwrap();
    start_service_management(addr, "{}", Arc::new(AtomicU32::new(0))).await;

    let mut fetcher = ServiceDefinitionFetcher::new(
        &format!("http://{}", addr),
        SERVICE,
        Arc::new(common::StaticToken("test-token")),
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(matches!(
        fetcher.fetch_for_rollout("rollout-1").await,
        Err(ControlPlaneError::Structural(_))
    ));
    assert_eq!(fetcher.current_config_id(), "");
}
