//! Tokens minted from a service account key file.
//!
//! The key signs a short-lived RS256 assertion which is exchanged at the
//! key's token endpoint for an OAuth2 access token.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::credentials::{TokenSource, CLOUD_PLATFORM_SCOPE};
use crate::error::{ControlPlaneError, Result};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service account key file this crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: String,
    #[serde(default)]
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| ControlPlaneError::policy(format!("invalid service account private key: {}", e)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { key, encoding_key, client })
    }

    pub fn from_file(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ControlPlaneError::policy(format!("failed to read service account key {}: {}", path.display(), e))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&content)?;
        Self::new(key, timeout)
    }

    fn token_uri(&self) -> &str {
        if self.key.token_uri.is_empty() {
            DEFAULT_TOKEN_URI
        } else {
            &self.key.token_uri
        }
    }

    /// Build the signed assertion exchanged for an access token.
    pub fn signed_assertion(&self, now: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: self.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        if !self.key.private_key_id.is_empty() {
            header.kid = Some(self.key.private_key_id.clone());
        }

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ControlPlaneError::policy(format!("failed to sign token assertion: {}", e)))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<(String, Duration)> {
        let assertion = self.signed_assertion(chrono::Utc::now().timestamp())?;
        let resp = self
            .client
            .post(self.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "token exchange at {} returned {}",
                self.token_uri(),
                resp.status()
            )));
        }

        let token: TokenResponse = resp.json().await?;
        Ok((token.access_token, Duration::from_secs(token.expires_in)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pem_key() {
        let key = ServiceAccountKey {
            client_email: "sa@project.iam.gserviceaccount.com".into(),
            private_key: "not a key".into(),
            private_key_id: String::new(),
            token_uri: String::new(),
        };
        assert!(matches!(
            ServiceAccountTokenSource::new(key, Duration::from_secs(5)),
            Err(ControlPlaneError::Policy(_))
        ));
    }

    #[test]
    fn missing_key_file_is_policy_error() {
        assert!(matches!(
            ServiceAccountTokenSource::from_file("/nonexistent/key.json", Duration::from_secs(5)),
            Err(ControlPlaneError::Policy(_))
        ));
    }
}
