//! Cluster generation end to end, checked on the serialized JSON.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use sidecar_control_plane::clusters::factory::{local_backend_generators, service_control_generators};
use sidecar_control_plane::clusters::{generate_clusters, HttpOpenIdDiscovery};
use sidecar_control_plane::{ControlPlaneError, DeploymentOptions, ServiceDefinition};

mod common;

fn definition(value: Value) -> ServiceDefinition {
    serde_json::from_value(value).unwrap()
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}

#[test]
fn test_grpc_local_backend() {
    let def = definition(json!({"name": "bookstore.endpoints.project.cloud.goog"}));
    let opts = DeploymentOptions {
        backend_address: "grpc://127.0.0.1:80".into(),
        ..Default::default()
    };

    let gens = local_backend_generators(&def, &opts).unwrap();
    assert_eq!(gens.len(), 1);
    let cluster = to_json(&gens[0].generate().unwrap());

    assert_eq!(cluster["name"], "backend-cluster-bookstore.endpoints.project.cloud.goog_local");
    assert_eq!(cluster["type"], "LOGICAL_DNS");
    assert!(cluster["typed_extension_protocol_options"]["envoy.extensions.upstreams.http.v3.HttpProtocolOptions"]
        .is_object());
    assert!(cluster.get("transport_socket").is_none());
    assert_eq!(
        cluster["load_assignment"]["endpoints"][0]["lb_endpoints"][0]["endpoint"]["address"]["socket_address"],
        json!({"address": "127.0.0.1", "port_value": 80})
    );
}

#[test]
fn test_service_control_cluster() {
    let def = definition(json!({"name": "bookstore.endpoints.project.cloud.goog"}));
    let opts = DeploymentOptions {
        service_control_url: "https://servicecontrol.googleapis.com".into(),
        ..Default::default()
    };

    let gens = service_control_generators(&def, &opts).unwrap();
    assert_eq!(gens.len(), 1);
    let cluster = to_json(&gens[0].generate().unwrap());

    assert_eq!(cluster["name"], "service-control-cluster");
    assert_eq!(cluster["connect_timeout"], "5s");
    assert_eq!(cluster["dns_lookup_family"], "V4_ONLY");
    assert_eq!(cluster["transport_socket"]["name"], "envoy.transport_sockets.tls");
    assert_eq!(cluster["transport_socket"]["typed_config"]["sni"], "servicecontrol.googleapis.com");
}

#[tokio::test]
async fn test_full_cycle_with_oidc_discovery() {
    let oidc_addr: SocketAddr = "127.0.0.1:29331".parse().unwrap();
    common::start_programmable_backend(oidc_addr, |req| async move {
        if req.path() == "/.well-known/openid-configuration" {
            (200, r#"{"issuer": "http://127.0.0.1:29331", "jwks_uri": "https://keys.example.com/certs"}"#.into())
        } else {
            (404, String::new())
        }
    })
    .await;

    let def = definition(json!({
        "name": "bookstore.endpoints.project.cloud.goog",
        "control": {"environment": "https://servicecontrol.googleapis.com"},
        "authentication": {"providers": [
            {"id": "discovered", "issuer": format!("http://{}", oidc_addr)},
            {"id": "google", "issuer": "https://accounts.google.com", "jwksUri": "https://www.googleapis.com/oauth2/v3/certs"},
            {"id": "google-again", "issuer": "https://accounts.google.com", "jwksUri": "https://www.googleapis.com/oauth2/v1/certs"}
        ]},
        "backend": {"rules": [
            {"selector": "bookstore.ListShelves", "address": "https://shelves.example.com/v1"},
            {"selector": "bookstore.GetShelf", "address": "https://shelves.example.com/v2"},
            {"selector": "google.discovery.GetDiscoveryRest", "address": "https://discovery.example.com"}
        ]}
    }));
    let opts = DeploymentOptions {
        backend_address: "http://127.0.0.1:8082".into(),
        ..Default::default()
    };
    let discovery = HttpOpenIdDiscovery::new(Duration::from_secs(2)).unwrap();

    let clusters = generate_clusters(&def, &opts, &discovery).await.unwrap();
    let names: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "metadata-cluster",
            "service-control-cluster",
            "jwt-provider-cluster-keys.example.com:443",
            "jwt-provider-cluster-www.googleapis.com:443",
            "backend-cluster-bookstore.endpoints.project.cloud.goog_local",
            "backend-cluster-shelves.example.com:443",
        ]
    );
}

#[tokio::test]
async fn test_invalid_lookup_family_aborts_cycle() {
    let def = definition(json!({"name": "bookstore.endpoints.project.cloud.goog"}));
    let opts = DeploymentOptions {
        backend_dns_lookup_family: "v5only".into(),
        ..Default::default()
    };
    let discovery = HttpOpenIdDiscovery::new(Duration::from_secs(2)).unwrap();

    assert!(matches!(
        generate_clusters(&def, &opts, &discovery).await,
        Err(ControlPlaneError::Policy(_))
    ));
}
