//! The fixed set of cluster generators.
//!
//! Each variant holds only what its cluster needs; the factories in
//! `factory.rs` decide which variants a cycle gets.

use std::time::Duration;

use crate::clusters::backend::BackendCluster;
use crate::clusters::descriptor::{ClusterDescriptor, DiscoveryType, DnsLookupFamily};
use crate::clusters::dns::maybe_add_resolvers;
use crate::clusters::health::GrpcHealth;
use crate::clusters::tls::ClusterTls;
use crate::clusters::uri::{parse_uri, ParsedUri};
use crate::error::{ControlPlaneError, Result};

pub const TOKEN_AGENT_CLUSTER_NAME: &str = "token-agent-cluster";
pub const IAM_CLUSTER_NAME: &str = "iam-cluster";
pub const METADATA_CLUSTER_NAME: &str = "metadata-cluster";
pub const SERVICE_CONTROL_CLUSTER_NAME: &str = "service-control-cluster";

const TOKEN_AGENT_HOST: &str = "127.0.0.1";
const SERVICE_CONTROL_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterGenerator {
    /// Local token agent serving tokens minted from a key file.
    TokenAgent {
        port: u16,
        connect_timeout: Duration,
        dns_resolvers: String,
    },
    /// IAM credentials API, used for impersonation.
    Iam {
        iam_url: String,
        connect_timeout: Duration,
        dns_resolvers: String,
        tls: ClusterTls,
    },
    /// Instance metadata server.
    Imds {
        metadata_url: String,
        connect_timeout: Duration,
        dns_resolvers: String,
        tls: ClusterTls,
    },
    /// Service control endpoint.
    ServiceControl {
        url: ParsedUri,
        dns_resolvers: String,
        tls: ClusterTls,
    },
    /// JWKS host of one or more auth providers.
    JwtProvider {
        provider_id: String,
        jwks_uri: String,
        address: String,
        connect_timeout: Duration,
        dns_resolvers: String,
        tls: ClusterTls,
    },
    /// The co-located backend.
    LocalBackend {
        backend: BackendCluster,
        health: Option<GrpcHealth>,
    },
    /// One distinct remote backend address.
    RemoteBackend { backend: BackendCluster },
}

impl ClusterGenerator {
    /// Name of the cluster this generator produces; also the dedup key.
    pub fn name(&self) -> String {
        match self {
            Self::TokenAgent { .. } => TOKEN_AGENT_CLUSTER_NAME.to_string(),
            Self::Iam { .. } => IAM_CLUSTER_NAME.to_string(),
            Self::Imds { .. } => METADATA_CLUSTER_NAME.to_string(),
            Self::ServiceControl { .. } => SERVICE_CONTROL_CLUSTER_NAME.to_string(),
            Self::JwtProvider { address, .. } => jwt_provider_cluster_name(address),
            Self::LocalBackend { backend, .. } | Self::RemoteBackend { backend } => {
                backend.cluster_name.clone()
            }
        }
    }

    pub fn generate(&self) -> Result<ClusterDescriptor> {
        match self {
            Self::TokenAgent { port, connect_timeout, dns_resolvers } => {
                let mut cluster = ClusterDescriptor::new(
                    TOKEN_AGENT_CLUSTER_NAME,
                    DiscoveryType::Static,
                    *connect_timeout,
                    TOKEN_AGENT_HOST,
                    *port,
                );
                maybe_add_resolvers(dns_resolvers, &mut cluster)?;
                Ok(cluster)
            }

            Self::Iam { iam_url, connect_timeout, dns_resolvers, tls } => {
                let uri = parse_uri(iam_url).map_err(|e| {
                    ControlPlaneError::policy(format!("fail to parse IAM cluster URI: {}", e))
                })?;
                sidestream_cluster(
                    IAM_CLUSTER_NAME,
                    DiscoveryType::StrictDns,
                    *connect_timeout,
                    &uri,
                    DnsLookupFamily::V4Only,
                    tls,
                    dns_resolvers,
                )
            }

            Self::Imds { metadata_url, connect_timeout, dns_resolvers, tls } => {
                let uri = parse_uri(metadata_url).map_err(|e| {
                    ControlPlaneError::policy(format!("fail to parse metadata cluster URI: {}", e))
                })?;
                sidestream_cluster(
                    METADATA_CLUSTER_NAME,
                    DiscoveryType::StrictDns,
                    *connect_timeout,
                    &uri,
                    DnsLookupFamily::Auto,
                    tls,
                    dns_resolvers,
                )
            }

            Self::ServiceControl { url, dns_resolvers, tls } => sidestream_cluster(
                SERVICE_CONTROL_CLUSTER_NAME,
                DiscoveryType::LogicalDns,
                SERVICE_CONTROL_CONNECT_TIMEOUT,
                url,
                DnsLookupFamily::V4Only,
                tls,
                dns_resolvers,
            ),

            Self::JwtProvider { address, jwks_uri, connect_timeout, dns_resolvers, tls, .. } => {
                let uri = parse_uri(jwks_uri).map_err(|e| {
                    ControlPlaneError::policy(format!("failed to parse JWKS URI: {}", e))
                })?;
                sidestream_cluster(
                    &jwt_provider_cluster_name(address),
                    DiscoveryType::LogicalDns,
                    *connect_timeout,
                    &uri,
                    DnsLookupFamily::V4Only,
                    tls,
                    dns_resolvers,
                )
            }

            Self::LocalBackend { backend, health } => {
                let mut cluster = backend.generate()?;
                if let Some(health) = health {
                    health.apply(&mut cluster);
                }
                Ok(cluster)
            }

            Self::RemoteBackend { backend } => backend.generate(),
        }
    }
}

pub fn jwt_provider_cluster_name(address: &str) -> String {
    format!("jwt-provider-cluster-{}", address)
}

/// A control-plane side-stream cluster: TLS only when the scheme is https.
fn sidestream_cluster(
    name: &str,
    discovery_type: DiscoveryType,
    connect_timeout: Duration,
    uri: &ParsedUri,
    dns_lookup_family: DnsLookupFamily,
    tls: &ClusterTls,
    dns_resolvers: &str,
) -> Result<ClusterDescriptor> {
    let mut cluster = ClusterDescriptor::new(name, discovery_type, connect_timeout, &uri.host, uri.port);
    cluster.dns_lookup_family = dns_lookup_family;

    if uri.is_https() {
        cluster.transport_socket = Some(tls.transport_socket(&uri.host, &[])?);
    }

    maybe_add_resolvers(dns_resolvers, &mut cluster)?;
    Ok(cluster)
}
