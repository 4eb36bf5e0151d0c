//! DNS resolver overrides.

use crate::clusters::descriptor::{Address, ClusterDescriptor};
use crate::error::{ControlPlaneError, Result};

pub const DNS_DEFAULT_PORT: u16 = 53;

/// Parse a `;`-delimited list of `host[:port]` resolver addresses.
pub fn parse_resolvers(addresses: &str) -> Result<Vec<Address>> {
    addresses
        .split(';')
        .map(|entry| {
            let (host, port) = parse_resolver(entry)?;
            Ok(Address::new(host, port))
        })
        .collect()
}

fn parse_resolver(entry: &str) -> Result<(&str, u16)> {
    let mut parts = entry.split(':');
    let host = parts.next().unwrap_or_default();
    let port = parts.next();

    if parts.next().is_some() {
        return Err(ControlPlaneError::structural(format!(
            "fail to parse dnsResolverAddress: address has more than one colon: {}",
            entry
        )));
    }

    let port = match port {
        None => DNS_DEFAULT_PORT,
        Some(p) => p.parse().map_err(|_| {
            ControlPlaneError::structural(format!(
                "fail to parse dnsResolverAddress: invalid port {:?} in {}",
                p, entry
            ))
        })?,
    };

    Ok((host, port))
}

/// Attach the configured resolvers to a cluster, if any are configured.
pub fn maybe_add_resolvers(addresses: &str, cluster: &mut ClusterDescriptor) -> Result<()> {
    if addresses.is_empty() {
        return Ok(());
    }
    cluster.dns_resolvers = parse_resolvers(addresses)?;
    Ok(())
}
