//! Deployment option validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject option combinations cluster generation would refuse anyway,
//!   so a bad file fails at load time instead of on the first cycle
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: DeploymentOptions → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::clusters::descriptor::DnsLookupFamily;
use crate::clusters::dns::parse_resolvers;
use crate::clusters::uri::{parse_backend_protocol, parse_uri, BackendProtocol};
use crate::config::schema::DeploymentOptions;

/// A single semantic problem in a set of deployment options.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a set of deployment options.
pub fn validate_options(opts: &DeploymentOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = opts.backend_dns_lookup_family.parse::<DnsLookupFamily>() {
        errors.push(ValidationError::new("backend_dns_lookup_family", e.to_string()));
    }

    if !opts.dns_resolver_addresses.is_empty() {
        if let Err(e) = parse_resolvers(&opts.dns_resolver_addresses) {
            errors.push(ValidationError::new("dns_resolver_addresses", e.to_string()));
        }
    }

    if opts.cluster_connect_timeout_secs == 0 {
        errors.push(ValidationError::new("cluster_connect_timeout_secs", "must be greater than 0"));
    }

    if opts.health_check_grpc_backend {
        if opts.health_check_grpc_backend_interval_ms == 0 {
            errors.push(ValidationError::new(
                "health_check_grpc_backend_interval_ms",
                "must be greater than 0",
            ));
        }

        let protocol = parse_uri(&opts.backend_address)
            .and_then(|uri| parse_backend_protocol(&uri.scheme, ""));
        match protocol {
            Ok((BackendProtocol::Grpc, _)) => {}
            Ok(_) => errors.push(ValidationError::new(
                "health_check_grpc_backend",
                "backend protocol must be GRPC",
            )),
            Err(e) => errors.push(ValidationError::new("backend_address", e.to_string())),
        }
    }

    if opts.non_gcp && opts.service_account_key.is_empty() && opts.uses_impersonation() {
        errors.push(ValidationError::new(
            "service_account_key",
            "impersonation outside GCP needs a service account key",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
