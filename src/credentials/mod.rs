//! Access tokens for control-plane calls.
//!
//! # Data Flow
//! ```text
//! service account key file ─┐
//! metadata server ──────────┼→ TokenSource → TokenCache → bearer header
//! IAM impersonation ────────┘   (wraps a base source)
//! ```
//!
//! # Design Decisions
//! - No process-wide cache: whoever needs tokens owns a `TokenCache`
//! - A cached token is reused only while it has at least 60s left

pub mod cache;
pub mod impersonate;
pub mod metadata;
pub mod service_account;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DeploymentOptions;
use crate::error::{ControlPlaneError, Result};

pub use cache::TokenCache;
pub use impersonate::ImpersonatedTokenSource;
pub use metadata::{GcpAttributes, MetadataClient};
pub use service_account::ServiceAccountTokenSource;

/// Scope requested for every minted access token.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Anything that can hand out an OAuth2 access token and its remaining lifetime.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<(String, Duration)>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn access_token(&self) -> Result<(String, Duration)> {
        (**self).access_token().await
    }
}

/// Pick the ambient token source: key file first, then the metadata server.
pub fn select_token_source(opts: &DeploymentOptions) -> Result<Arc<dyn TokenSource>> {
    if !opts.service_account_key.is_empty() {
        let source = ServiceAccountTokenSource::from_file(&opts.service_account_key, opts.http_request_timeout())?;
        return Ok(Arc::new(TokenCache::new(source)));
    }

    if opts.non_gcp {
        return Err(ControlPlaneError::policy(
            "If --non_gcp is specified, --service_account_key has to be specified",
        ));
    }

    let metadata = MetadataClient::new(&opts.metadata_url, opts.http_request_timeout())?;
    Ok(Arc::new(TokenCache::new(metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_gcp_without_key_is_rejected() {
        let opts = DeploymentOptions { non_gcp: true, ..Default::default() };
        assert!(matches!(select_token_source(&opts), Err(ControlPlaneError::Policy(_))));
    }

    #[test]
    fn defaults_to_metadata_server() {
        assert!(select_token_source(&DeploymentOptions::default()).is_ok());
    }
}
