//! Generator factories and the generation entry point.
//!
//! A factory looks at the definition and options and decides which
//! generators a cycle needs; an empty list is a normal outcome.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::clusters::backend::BackendCluster;
use crate::clusters::descriptor::ClusterDescriptor;
use crate::clusters::generator::ClusterGenerator;
use crate::clusters::health::GrpcHealth;
use crate::clusters::oidc::OpenIdDiscovery;
use crate::clusters::tls::ClusterTls;
use crate::clusters::uri::{extract_address, parse_backend_protocol, parse_uri, BackendProtocol};
use crate::config::DeploymentOptions;
use crate::error::{ControlPlaneError, Result};
use crate::observability::metrics;
use crate::service::{AuthProvider, BackendRule, ServiceDefinition};

/// Token agent, needed whenever tokens come from a key file.
pub fn token_agent_generators(
    _def: &ServiceDefinition,
    opts: &DeploymentOptions,
) -> Result<Vec<ClusterGenerator>> {
    if !opts.non_gcp && opts.service_account_key.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![ClusterGenerator::TokenAgent {
        port: opts.token_agent_port,
        connect_timeout: opts.cluster_connect_timeout(),
        dns_resolvers: opts.dns_resolver_addresses.clone(),
    }])
}

/// IAM credentials API, needed only for impersonation.
pub fn iam_generators(_def: &ServiceDefinition, opts: &DeploymentOptions) -> Result<Vec<ClusterGenerator>> {
    if !opts.uses_impersonation() {
        return Ok(Vec::new());
    }
    Ok(vec![ClusterGenerator::Iam {
        iam_url: opts.iam_url.clone(),
        connect_timeout: opts.cluster_connect_timeout(),
        dns_resolvers: opts.dns_resolver_addresses.clone(),
        tls: ClusterTls::sidestream(opts),
    }])
}

/// Instance metadata server, unavailable outside GCP.
pub fn imds_generators(_def: &ServiceDefinition, opts: &DeploymentOptions) -> Result<Vec<ClusterGenerator>> {
    if opts.non_gcp {
        return Ok(Vec::new());
    }
    Ok(vec![ClusterGenerator::Imds {
        metadata_url: opts.metadata_url.clone(),
        connect_timeout: opts.cluster_connect_timeout(),
        dns_resolvers: opts.dns_resolver_addresses.clone(),
        tls: ClusterTls::sidestream(opts),
    }])
}

/// Service control URL: the option wins over the definition.
pub fn service_control_url<'a>(def: &'a ServiceDefinition, opts: &'a DeploymentOptions) -> &'a str {
    if !opts.service_control_url.is_empty() {
        return &opts.service_control_url;
    }
    def.control_environment()
}

pub fn service_control_generators(
    def: &ServiceDefinition,
    opts: &DeploymentOptions,
) -> Result<Vec<ClusterGenerator>> {
    let uri = service_control_url(def, opts);
    if uri.is_empty() {
        debug!("no service control url configured, skipping service control cluster");
        return Ok(Vec::new());
    }

    let url = parse_uri(uri)?;
    if !url.path.is_empty() {
        return Err(ControlPlaneError::policy(format!(
            "error parsing service control url {}: should not have path part: {}",
            uri, url.path
        )));
    }

    Ok(vec![ClusterGenerator::ServiceControl {
        url,
        dns_resolvers: opts.dns_resolver_addresses.clone(),
        tls: ClusterTls::sidestream(opts),
    }])
}

/// One cluster per distinct JWKS address across all auth providers.
pub async fn jwt_provider_generators(
    def: &ServiceDefinition,
    opts: &DeploymentOptions,
    discovery: &dyn OpenIdDiscovery,
) -> Result<Vec<ClusterGenerator>> {
    let mut gens = Vec::new();
    let mut seen = HashSet::new();

    for provider in def.providers() {
        let jwks_uri = resolve_jwks_uri(provider, opts, discovery).await?;
        let address = extract_address(&jwks_uri).map_err(|e| {
            ControlPlaneError::policy(format!("failed to extract address from JWKS URI: {}", e))
        })?;

        if !seen.insert(address.clone()) {
            info!(
                provider = %provider.id,
                jwks_uri = %jwks_uri,
                "Ignoring authn provider, its JWKS address already has a cluster"
            );
            continue;
        }

        gens.push(ClusterGenerator::JwtProvider {
            provider_id: provider.id.clone(),
            jwks_uri,
            address,
            connect_timeout: opts.cluster_connect_timeout(),
            dns_resolvers: opts.dns_resolver_addresses.clone(),
            tls: ClusterTls::sidestream(opts),
        });
    }

    Ok(gens)
}

async fn resolve_jwks_uri(
    provider: &AuthProvider,
    opts: &DeploymentOptions,
    discovery: &dyn OpenIdDiscovery,
) -> Result<String> {
    if !provider.jwks_uri.is_empty() {
        return Ok(provider.jwks_uri.clone());
    }

    if opts.disable_oidc_discovery {
        return Err(ControlPlaneError::policy(format!(
            "error processing authentication provider {:?}: jwks_uri is empty, but OpenID Connect \
             Discovery is disabled via startup option. Consider specifying the jwks_uri in the provider config",
            provider.id
        )));
    }

    info!(provider = %provider.id, "jwks_uri is empty, using OpenID Connect Discovery");
    discovery.jwks_uri(&provider.issuer).await.map_err(|e| {
        ControlPlaneError::network(format!(
            "error processing authentication provider {:?}: failed OpenID Connect Discovery protocol: {}",
            provider.id, e
        ))
    })
}

/// The co-located backend, optionally health checked.
pub fn local_backend_generators(
    def: &ServiceDefinition,
    opts: &DeploymentOptions,
) -> Result<Vec<ClusterGenerator>> {
    let uri = parse_uri(&opts.backend_address)?;
    let (protocol, use_tls) = parse_backend_protocol(&uri.scheme, "")?;

    let health = GrpcHealth::from_options(opts);
    if health.is_some() && protocol != BackendProtocol::Grpc {
        return Err(ControlPlaneError::policy(
            "invalid flag --health_check_grpc_backend, backend protocol must be GRPC",
        ));
    }

    let backend = BackendCluster {
        cluster_name: format!("backend-cluster-{}_local", def.name),
        hostname: uri.host,
        port: uri.port,
        protocol,
        tls: use_tls.then(|| ClusterTls::backend(opts)),
        connect_timeout: opts.cluster_connect_timeout(),
        max_requests_threshold: opts.backend_cluster_max_requests,
        dns_lookup_family: opts.backend_dns_lookup_family.clone(),
        dns_resolver_addresses: opts.dns_resolver_addresses.clone(),
    };

    Ok(vec![ClusterGenerator::LocalBackend { backend, health }])
}

/// One cluster per distinct remote backend address across all rules.
pub fn remote_backend_generators(
    def: &ServiceDefinition,
    opts: &DeploymentOptions,
) -> Result<Vec<ClusterGenerator>> {
    if opts.enable_backend_address_override {
        info!("Backend address override is enabled, skipping remote backend clusters");
        return Ok(Vec::new());
    }

    let mut gens = Vec::new();
    let mut seen = HashSet::new();

    for rule in def.backend_rules() {
        if rule.is_discovery_api() && !opts.allow_discovery_apis {
            warn!(selector = %rule.selector, "Skip backend rule because discovery API is not supported");
            continue;
        }

        let primary = backend_rule_to_cluster(rule, opts, false).map_err(|e| {
            ControlPlaneError::policy(format!(
                "fail to create remote backend cluster for selector {:?}: {}",
                rule.selector, e
            ))
        })?;

        let http = match rule.http_override() {
            Some(http_rule) => {
                info!(selector = %rule.selector, "Selector has HTTP backend rule");
                backend_rule_to_cluster(&http_rule, opts, true).map_err(|e| {
                    ControlPlaneError::policy(format!(
                        "fail to create HTTP remote backend cluster for selector {:?}: {}",
                        rule.selector, e
                    ))
                })?
            }
            None => None,
        };

        for backend in primary.into_iter().chain(http) {
            if seen.insert(backend.cluster_name.clone()) {
                gens.push(ClusterGenerator::RemoteBackend { backend });
            }
        }
    }

    Ok(gens)
}

fn backend_rule_to_cluster(
    rule: &BackendRule,
    opts: &DeploymentOptions,
    is_http_backend: bool,
) -> Result<Option<BackendCluster>> {
    if rule.address.is_empty() {
        debug!(selector = %rule.selector, "Skip backend rule without a dynamic routing address");
        return Ok(None);
    }

    let uri = parse_uri(&rule.address)?;
    let (protocol, use_tls) = parse_backend_protocol(&uri.scheme, &rule.protocol)?;
    if protocol == BackendProtocol::Grpc && is_http_backend {
        return Err(ControlPlaneError::policy("gRPC protocol conflicted with http backend"));
    }

    let address = uri.address();
    Ok(Some(BackendCluster {
        cluster_name: format!("backend-cluster-{}", address),
        hostname: uri.host,
        port: uri.port,
        protocol,
        tls: use_tls.then(|| ClusterTls::backend(opts)),
        connect_timeout: opts.cluster_connect_timeout(),
        max_requests_threshold: opts.backend_cluster_max_requests,
        dns_lookup_family: opts.backend_dns_lookup_family.clone(),
        dns_resolver_addresses: opts.dns_resolver_addresses.clone(),
    }))
}

/// Every generator a cycle needs, in fixed order.
pub async fn make_cluster_generators(
    def: &ServiceDefinition,
    opts: &DeploymentOptions,
    discovery: &dyn OpenIdDiscovery,
) -> Result<Vec<ClusterGenerator>> {
    let mut gens = Vec::new();
    gens.extend(token_agent_generators(def, opts)?);
    gens.extend(iam_generators(def, opts)?);
    gens.extend(imds_generators(def, opts)?);
    gens.extend(service_control_generators(def, opts)?);
    gens.extend(jwt_provider_generators(def, opts, discovery).await?);
    gens.extend(local_backend_generators(def, opts)?);
    gens.extend(remote_backend_generators(def, opts)?);
    Ok(gens)
}

/// Keep the first descriptor for each name, preserving order.
pub fn dedup_by_name(clusters: Vec<ClusterDescriptor>) -> Vec<ClusterDescriptor> {
    let mut seen = HashSet::new();
    clusters
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.name.clone());
            if !fresh {
                debug!(cluster = %c.name, "Dropping duplicate cluster");
            }
            fresh
        })
        .collect()
}

/// Build the full cluster list for one generation cycle.
///
/// Any generator error aborts the cycle; no partial list is returned.
pub async fn generate_clusters(
    def: &ServiceDefinition,
    opts: &DeploymentOptions,
    discovery: &dyn OpenIdDiscovery,
) -> Result<Vec<ClusterDescriptor>> {
    let gens = make_cluster_generators(def, opts, discovery).await?;

    let clusters = gens
        .iter()
        .map(|gen| {
            gen.generate().map_err(|e| {
                warn!(cluster = %gen.name(), error = %e, "Cluster generation failed");
                e
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let clusters = dedup_by_name(clusters);
    metrics::record_clusters_generated(clusters.len());
    info!(service = %def.name, clusters = clusters.len(), "Generated clusters");
    Ok(clusters)
}
