//! Upstream cluster descriptors in the proxy's JSON shape.
//!
//! Field names and enum spellings match what the proxy accepts in a
//! bootstrap or CDS response, so a descriptor can be dropped straight into
//! `static_resources.clusters` after `serde_json::to_value`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::ControlPlaneError;

pub const TLS_TRANSPORT_SOCKET_NAME: &str = "envoy.transport_sockets.tls";
pub const UPSTREAM_TLS_CONTEXT_TYPE: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext";
pub const HTTP_PROTOCOL_OPTIONS_NAME: &str = "envoy.extensions.upstreams.http.v3.HttpProtocolOptions";
pub const HTTP_PROTOCOL_OPTIONS_TYPE: &str =
    "type.googleapis.com/envoy.extensions.upstreams.http.v3.HttpProtocolOptions";

/// A named upstream-connection specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub discovery_type: DiscoveryType,

    pub lb_policy: LbPolicy,

    #[serde(serialize_with = "serialize_duration")]
    pub connect_timeout: Duration,

    pub load_assignment: LoadAssignment,

    pub dns_lookup_family: DnsLookupFamily,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_socket: Option<TransportSocket>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_resolvers: Vec<Address>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breakers: Option<CircuitBreakers>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<HealthCheck>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub typed_extension_protocol_options: Option<Value>,
}

impl ClusterDescriptor {
    /// A round-robin cluster with a single endpoint and no optional parts.
    pub fn new(
        name: impl Into<String>,
        discovery_type: DiscoveryType,
        connect_timeout: Duration,
        host: &str,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            discovery_type,
            lb_policy: LbPolicy::RoundRobin,
            connect_timeout,
            load_assignment: LoadAssignment::single(host, port),
            dns_lookup_family: DnsLookupFamily::Auto,
            transport_socket: None,
            dns_resolvers: Vec::new(),
            circuit_breakers: None,
            health_checks: Vec::new(),
            typed_extension_protocol_options: None,
        }
    }

    /// Attach HTTP/2 upstream codec options.
    pub fn enable_http2(&mut self) {
        self.typed_extension_protocol_options = Some(json!({
            HTTP_PROTOCOL_OPTIONS_NAME: {
                "@type": HTTP_PROTOCOL_OPTIONS_TYPE,
                "explicit_http_config": {
                    "http2_protocol_options": {}
                }
            }
        }));
    }

    pub fn is_http2(&self) -> bool {
        self.typed_extension_protocol_options.is_some()
    }

    /// The single endpoint this cluster points at.
    pub fn endpoint(&self) -> Option<&SocketAddress> {
        self.load_assignment
            .endpoints
            .first()
            .and_then(|e| e.lb_endpoints.first())
            .map(|lb| &lb.endpoint.address.socket_address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryType {
    Static,
    StrictDns,
    LogicalDns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbPolicy {
    RoundRobin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsLookupFamily {
    Auto,
    V4Only,
    V6Only,
    V4Preferred,
    All,
}

impl FromStr for DnsLookupFamily {
    type Err = ControlPlaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "v4only" => Ok(Self::V4Only),
            "v6only" => Ok(Self::V6Only),
            "v4preferred" => Ok(Self::V4Preferred),
            "all" => Ok(Self::All),
            other => Err(ControlPlaneError::policy(format!(
                "invalid DnsLookupFamily: {}; Only auto, v4only, v6only, v4preferred, and all are valid",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadAssignment {
    pub cluster_name: String,
    pub endpoints: Vec<LocalityEndpoints>,
}

impl LoadAssignment {
    pub fn single(host: &str, port: u16) -> Self {
        Self {
            cluster_name: host.to_string(),
            endpoints: vec![LocalityEndpoints {
                lb_endpoints: vec![LbEndpoint {
                    endpoint: Endpoint { address: Address::new(host, port) },
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityEndpoints {
    pub lb_endpoints: Vec<LbEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LbEndpoint {
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub socket_address: SocketAddress,
}

impl Address {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            socket_address: SocketAddress { address: host.to_string(), port_value: port },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    pub port_value: u16,
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportSocket {
    pub name: String,
    pub typed_config: UpstreamTlsContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamTlsContext {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub sni: String,
    pub common_tls_context: CommonTlsContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommonTlsContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_params: Option<TlsParams>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tls_certificates: Vec<TlsCertificate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_context: Option<ValidationContext>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn_protocols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsParams {
    pub cipher_suites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsCertificate {
    pub certificate_chain: DataSource,
    pub private_key: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationContext {
    pub trusted_ca: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSource {
    pub filename: String,
}

impl DataSource {
    pub fn file(path: impl Into<String>) -> Self {
        Self { filename: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakers {
    pub thresholds: Vec<Thresholds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    pub priority: RoutingPriority,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingPriority {
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    #[serde(serialize_with = "serialize_duration")]
    pub timeout: Duration,

    #[serde(serialize_with = "serialize_duration")]
    pub interval: Duration,

    #[serde(serialize_with = "serialize_duration")]
    pub no_traffic_interval: Duration,

    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
    pub grpc_health_check: GrpcHealthCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrpcHealthCheck {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_name: String,
}

/// Render a duration the way protobuf JSON does ("5s", "0.250s").
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        format!("{}s", secs)
    } else if nanos % 1_000_000 == 0 {
        format!("{}.{:03}s", secs, nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{}.{:06}s", secs, nanos / 1_000)
    } else {
        format!("{}.{:09}s", secs, nanos)
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_use_protobuf_json_form() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(250)), "0.250s");
        assert_eq!(format_duration(Duration::from_micros(1_500_001)), "1.500001s");
    }

    #[test]
    fn serializes_proxy_field_names() {
        let mut cluster = ClusterDescriptor::new(
            "backend-cluster-api_local",
            DiscoveryType::LogicalDns,
            Duration::from_secs(20),
            "127.0.0.1",
            8080,
        );
        cluster.dns_lookup_family = DnsLookupFamily::V4Preferred;
        cluster.enable_http2();

        let value = serde_json::to_value(&cluster).unwrap();
        assert_eq!(value["type"], "LOGICAL_DNS");
        assert_eq!(value["lb_policy"], "ROUND_ROBIN");
        assert_eq!(value["connect_timeout"], "20s");
        assert_eq!(value["dns_lookup_family"], "V4_PREFERRED");
        assert_eq!(
            value["load_assignment"]["endpoints"][0]["lb_endpoints"][0]["endpoint"]["address"]["socket_address"]["port_value"],
            8080
        );
        assert_eq!(
            value["typed_extension_protocol_options"][HTTP_PROTOCOL_OPTIONS_NAME]["@type"],
            HTTP_PROTOCOL_OPTIONS_TYPE
        );
        assert!(value.get("transport_socket").is_none());
        assert!(value.get("health_checks").is_none());
    }

    #[test]
    fn unknown_lookup_family_is_policy_error() {
        assert_eq!("v4only".parse::<DnsLookupFamily>().unwrap(), DnsLookupFamily::V4Only);
        let err = "ipv4".parse::<DnsLookupFamily>().unwrap_err();
        assert!(matches!(err, ControlPlaneError::Policy(_)));
    }
}
