//! OpenID Connect discovery of JWKS URIs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ControlPlaneError, Result};

const OPENID_CONFIGURATION_PATH: &str = "/.well-known/openid-configuration";

/// Resolves an issuer to the JWKS URI it advertises.
#[async_trait]
pub trait OpenIdDiscovery: Send + Sync {
    async fn jwks_uri(&self, issuer: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct OpenIdConfiguration {
    #[serde(default)]
    jwks_uri: String,
}

/// Discovery over HTTP against the issuer's well-known document.
#[derive(Debug, Clone)]
pub struct HttpOpenIdDiscovery {
    client: reqwest::Client,
}

impl HttpOpenIdDiscovery {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

pub fn openid_configuration_url(issuer: &str) -> String {
    let issuer = issuer.trim_end_matches('/');
    if issuer.contains("://") {
        format!("{}{}", issuer, OPENID_CONFIGURATION_PATH)
    } else {
        format!("https://{}{}", issuer, OPENID_CONFIGURATION_PATH)
    }
}

#[async_trait]
impl OpenIdDiscovery for HttpOpenIdDiscovery {
    async fn jwks_uri(&self, issuer: &str) -> Result<String> {
        let url = openid_configuration_url(issuer);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "http call to {} returns not 200 OK: {}",
                url,
                resp.status()
            )));
        }

        let config: OpenIdConfiguration = resp.json().await?;
        if config.jwks_uri.is_empty() {
            return Err(ControlPlaneError::structural(format!(
                "OpenID configuration at {} has no jwks_uri",
                url
            )));
        }
        Ok(config.jwks_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_url() {
        assert_eq!(
            openid_configuration_url("https://accounts.example.com/"),
            "https://accounts.example.com/.well-known/openid-configuration"
        );
        assert_eq!(
            openid_configuration_url("accounts.example.com"),
            "https://accounts.example.com/.well-known/openid-configuration"
        );
    }
}
