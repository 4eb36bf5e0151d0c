//! Backend cluster construction shared by local and remote backends.

use std::time::Duration;

use crate::clusters::descriptor::{
    CircuitBreakers, ClusterDescriptor, DiscoveryType, DnsLookupFamily, RoutingPriority, Thresholds,
};
use crate::clusters::dns::maybe_add_resolvers;
use crate::clusters::tls::ClusterTls;
use crate::clusters::uri::BackendProtocol;
use crate::error::Result;

/// Everything needed to build one backend cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCluster {
    pub cluster_name: String,
    pub hostname: String,
    pub port: u16,
    pub protocol: BackendProtocol,
    /// Set when the scheme asked for TLS.
    pub tls: Option<ClusterTls>,
    pub connect_timeout: Duration,
    pub max_requests_threshold: u32,
    pub dns_lookup_family: String,
    pub dns_resolver_addresses: String,
}

impl BackendCluster {
    pub fn generate(&self) -> Result<ClusterDescriptor> {
        let mut cluster = ClusterDescriptor::new(
            &self.cluster_name,
            DiscoveryType::LogicalDns,
            self.connect_timeout,
            &self.hostname,
            self.port,
        );

        if self.max_requests_threshold > 0 {
            cluster.circuit_breakers = Some(CircuitBreakers {
                thresholds: vec![
                    Thresholds { priority: RoutingPriority::Default, max_requests: self.max_requests_threshold },
                    Thresholds { priority: RoutingPriority::High, max_requests: self.max_requests_threshold },
                ],
            });
        }

        let http2 = self.protocol.is_http2();

        if let Some(tls) = &self.tls {
            let alpn: &[&str] = if http2 { &["h2"] } else { &[] };
            cluster.transport_socket = Some(tls.transport_socket(&self.hostname, alpn)?);
        }

        if http2 {
            cluster.enable_http2();
        }

        cluster.dns_lookup_family = self.dns_lookup_family.parse::<DnsLookupFamily>()?;
        maybe_add_resolvers(&self.dns_resolver_addresses, &mut cluster)?;

        Ok(cluster)
    }
}
