//! Deployment option definitions.
//!
//! `DeploymentOptions` is the flat snapshot every cluster generator and the
//! rollout controller read from. All fields derive Serde traits so a
//! snapshot can be loaded from a TOML file; any field left out takes the
//! default documented on `Default`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default CA bundle used to verify upstream TLS peers.
pub const DEFAULT_ROOT_CERTS_PATH: &str = "/etc/ssl/certs/ca-certificates.crt";

/// Options consumed by a single config-generation cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentOptions {
    /// Address of the co-located backend (e.g., "grpc://127.0.0.1:8080").
    pub backend_address: String,

    /// Route to backend rule addresses dynamically instead of building
    /// one cluster per remote address.
    pub enable_backend_address_override: bool,

    /// Keep backend rules whose selector belongs to a discovery API.
    pub allow_discovery_apis: bool,

    /// DNS lookup family for backend clusters: auto, v4only, v6only,
    /// v4preferred or all.
    pub backend_dns_lookup_family: String,

    /// Request concurrency ceiling for backend clusters (0 = unlimited).
    pub backend_cluster_max_requests: u32,

    /// Upstream connect timeout in seconds.
    pub cluster_connect_timeout_secs: u64,

    /// `;`-delimited `host[:port]` resolver list overriding system DNS.
    pub dns_resolver_addresses: String,

    /// Attach a gRPC health check to the local backend cluster.
    pub health_check_grpc_backend: bool,

    /// Service name sent in the gRPC health check request.
    pub health_check_grpc_backend_service: String,

    /// Health check interval (and timeout) in milliseconds.
    pub health_check_grpc_backend_interval_ms: u64,

    /// Health check interval used while a cluster receives no traffic, in milliseconds.
    pub health_check_grpc_backend_no_traffic_interval_ms: u64,

    /// CA bundle for control-plane side streams (service control, JWKS, IAM).
    pub ssl_sidestream_client_root_certs_path: String,

    /// CA bundle for backend clusters.
    pub ssl_backend_client_root_certs_path: String,

    /// Directory holding the backend client certificate and key.
    pub ssl_backend_client_cert_path: String,

    /// Comma-separated cipher suites offered to backends.
    pub ssl_backend_client_cipher_suites: String,

    /// Service control endpoint; empty means "use the definition's".
    pub service_control_url: String,

    /// Service management endpoint.
    pub service_management_url: String,

    /// Instance metadata server base URL.
    pub metadata_url: String,

    /// IAM credentials endpoint used for impersonation.
    pub iam_url: String,

    /// Port of the local token agent used outside GCP.
    pub token_agent_port: u16,

    /// Running outside GCP: no metadata server is available.
    pub non_gcp: bool,

    /// Path to a service account key file.
    pub service_account_key: String,

    /// Impersonated identity used to mint backend auth tokens.
    pub backend_auth_credentials: Option<ImpersonationCredentials>,

    /// Impersonated identity used to call service control.
    pub service_control_credentials: Option<ImpersonationCredentials>,

    /// Refuse to resolve JWKS URIs through OpenID Connect discovery.
    pub disable_oidc_discovery: bool,

    /// Timeout applied to every outbound control-plane HTTP call, in seconds.
    pub http_request_timeout_secs: u64,
}

impl DeploymentOptions {
    pub fn cluster_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_connect_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_grpc_backend_interval_ms)
    }

    pub fn health_check_no_traffic_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_grpc_backend_no_traffic_interval_ms)
    }

    pub fn http_request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_request_timeout_secs)
    }

    /// Whether any impersonation identity is configured.
    pub fn uses_impersonation(&self) -> bool {
        self.backend_auth_credentials.is_some() || self.service_control_credentials.is_some()
    }
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            backend_address: "http://127.0.0.1:8082".to_string(),
            enable_backend_address_override: false,
            allow_discovery_apis: false,
            backend_dns_lookup_family: "v4preferred".to_string(),
            backend_cluster_max_requests: 0,
            cluster_connect_timeout_secs: 20,
            dns_resolver_addresses: String::new(),
            health_check_grpc_backend: false,
            health_check_grpc_backend_service: String::new(),
            health_check_grpc_backend_interval_ms: 1_000,
            health_check_grpc_backend_no_traffic_interval_ms: 60_000,
            ssl_sidestream_client_root_certs_path: DEFAULT_ROOT_CERTS_PATH.to_string(),
            ssl_backend_client_root_certs_path: DEFAULT_ROOT_CERTS_PATH.to_string(),
            ssl_backend_client_cert_path: String::new(),
            ssl_backend_client_cipher_suites: String::new(),
            service_control_url: String::new(),
            service_management_url: "https://servicemanagement.googleapis.com".to_string(),
            metadata_url: "http://169.254.169.254/computeMetadata".to_string(),
            iam_url: "https://iamcredentials.googleapis.com".to_string(),
            token_agent_port: 8791,
            non_gcp: false,
            service_account_key: String::new(),
            backend_auth_credentials: None,
            service_control_credentials: None,
            disable_oidc_discovery: false,
            http_request_timeout_secs: 30,
        }
    }
}

/// An identity to impersonate through the IAM credentials API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImpersonationCredentials {
    /// Email of the service account to impersonate.
    pub service_account_email: String,

    /// Delegation chain, outermost first.
    #[serde(default)]
    pub delegates: Vec<String>,
}
