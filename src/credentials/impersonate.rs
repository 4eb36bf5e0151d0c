//! Access tokens for an impersonated service account.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ImpersonationCredentials;
use crate::credentials::{TokenSource, CLOUD_PLATFORM_SCOPE};
use crate::error::{ControlPlaneError, Result};

#[derive(Serialize)]
struct GenerateAccessTokenRequest<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delegates: Vec<String>,
    scope: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: String,
}

/// Mints tokens for `credentials.service_account_email` using the base
/// source's identity.
pub struct ImpersonatedTokenSource {
    base: Arc<dyn TokenSource>,
    iam_url: String,
    credentials: ImpersonationCredentials,
    client: reqwest::Client,
}

impl ImpersonatedTokenSource {
    pub fn new(
        base: Arc<dyn TokenSource>,
        iam_url: &str,
        credentials: ImpersonationCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base,
            iam_url: iam_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/-/serviceAccounts/{}:generateAccessToken",
            self.iam_url, self.credentials.service_account_email
        )
    }
}

/// Remaining lifetime of a token expiring at an RFC 3339 timestamp.
pub fn ttl_until(expire_time: &str, now: DateTime<Utc>) -> Result<Duration> {
    let expires = DateTime::parse_from_rfc3339(expire_time).map_err(|e| {
        ControlPlaneError::structural(format!("invalid expireTime {:?}: {}", expire_time, e))
    })?;
    Ok((expires.with_timezone(&Utc) - now).to_std().unwrap_or_default())
}

#[async_trait]
impl TokenSource for ImpersonatedTokenSource {
    async fn access_token(&self) -> Result<(String, Duration)> {
        let (base_token, _) = self.base.access_token().await?;

        let body = GenerateAccessTokenRequest {
            delegates: self
                .credentials
                .delegates
                .iter()
                .map(|d| format!("projects/-/serviceAccounts/{}", d))
                .collect(),
            scope: [CLOUD_PLATFORM_SCOPE],
        };

        let url = self.endpoint();
        let resp = self.client.post(&url).bearer_auth(base_token).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "http call to {} returns not 200 OK: {}",
                url,
                resp.status()
            )));
        }

        let token: GenerateAccessTokenResponse = resp.json().await?;
        let ttl = ttl_until(&token.expire_time, Utc::now())?;
        Ok((token.access_token, ttl))
    }
}
