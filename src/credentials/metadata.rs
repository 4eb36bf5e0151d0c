//! Instance metadata server client.
//!
//! Serves two purposes: the default access token source on GCP, and the
//! project/zone/platform attributes injected into the bootstrap's service
//! control filter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::credentials::TokenSource;
use crate::error::{ControlPlaneError, Result};

pub const ACCESS_TOKEN_PATH: &str = "/v1/instance/service-accounts/default/token";
pub const PROJECT_ID_PATH: &str = "/v1/project/project-id";
pub const REGION_PATH: &str = "/v1/instance/region";
pub const ZONE_PATH: &str = "/v1/instance/zone";
pub const GAE_SERVER_SOFTWARE_PATH: &str = "/v1/instance/attributes/gae_server_software";
pub const KUBE_ENV_PATH: &str = "/v1/instance/attributes/kube-env";

pub const PLATFORM_GAE_FLEX: &str = "GAE_FLEX(ESPv2)";
pub const PLATFORM_GKE: &str = "GKE(ESPv2)";
pub const PLATFORM_GCE: &str = "GCE(ESPv2)";

/// Deployment attributes reported alongside service control calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpAttributes {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub platform: String,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    base_url: String,
    client: reqwest::Client,
}

impl MetadataClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    async fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "failed fetching metadata: {}, status code {}",
                url,
                resp.status()
            )));
        }
        Ok(resp.text().await?)
    }

    pub async fn project_id(&self) -> Result<String> {
        self.get(PROJECT_ID_PATH).await
    }

    /// Region where the platform exposes it, otherwise the zone name.
    pub async fn location(&self) -> Result<String> {
        if let Ok(region) = self.get(REGION_PATH).await {
            return Ok(region);
        }

        // Zone format: projects/PROJECT_NUMBER/zones/ZONE
        let zone_path = self.get(ZONE_PATH).await?;
        match zone_path.rsplit_once('/') {
            Some((_, zone)) if !zone.is_empty() => Ok(zone.to_string()),
            _ => {
                warn!(zone = %zone_path, "Invalid zone format fetched");
                Err(ControlPlaneError::structural(format!("invalid zone format: {}", zone_path)))
            }
        }
    }

    pub async fn platform(&self) -> &'static str {
        if self.get(GAE_SERVER_SOFTWARE_PATH).await.is_ok() {
            return PLATFORM_GAE_FLEX;
        }
        if self.get(KUBE_ENV_PATH).await.is_ok() {
            return PLATFORM_GKE;
        }
        PLATFORM_GCE
    }

    /// Fetch project, location and platform.
    ///
    /// Fails only if the server is unreachable; individual attributes are
    /// best effort.
    pub async fn gcp_attributes(&self) -> Result<GcpAttributes> {
        self.get("").await?;

        let mut attrs = GcpAttributes::default();
        if let Ok(project_id) = self.project_id().await {
            attrs.project_id = project_id;
        }
        if let Ok(zone) = self.location().await {
            attrs.zone = zone;
        }
        attrs.platform = self.platform().await.to_string();
        Ok(attrs)
    }
}

#[async_trait]
impl TokenSource for MetadataClient {
    async fn access_token(&self) -> Result<(String, Duration)> {
        let body = self.get(ACCESS_TOKEN_PATH).await?;
        let token: MetadataToken = serde_json::from_str(&body)?;
        Ok((token.access_token, Duration::from_secs(token.expires_in)))
    }
}
