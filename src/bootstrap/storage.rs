//! Object store access for the bootstrap document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::credentials::TokenSource;
use crate::error::{ControlPlaneError, Result};

pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Reads whole objects from a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>>;
}

/// Cloud Storage JSON API client, media download only.
pub struct GcsObjectStore {
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl GcsObjectStore {
    pub fn new(tokens: Arc<dyn TokenSource>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(GCS_BASE_URL, tokens, timeout)
    }

    pub fn with_base_url(base_url: &str, tokens: Arc<dyn TokenSource>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ControlPlaneError::policy(format!("invalid storage url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ControlPlaneError::policy(format!("invalid storage url {}", base_url)));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, tokens, client })
    }

    /// Download URL for an object; the object name is a single encoded segment.
    pub fn object_url(&self, bucket: &str, object: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "b", bucket, "o", object]);
        }
        url.query_pairs_mut().append_pair("alt", "media");
        url
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn read_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let (token, _) = self.tokens.access_token().await?;
        let url = self.object_url(bucket, object);

        let resp = self.client.get(url.clone()).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "reading gs://{}/{} from {} returned {}",
                bucket,
                object,
                url,
                resp.status()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
