//! Service definition retrieval from service management.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::credentials::TokenSource;
use crate::error::{ControlPlaneError, Result};
use crate::service::{Rollout, ServiceDefinition, TrafficSplit};

/// Pick the definition id carrying the most traffic.
///
/// The first entry wins a tie. An empty table or a non-numeric
/// percentage means the rollout is unusable.
pub fn select_config_id(split: &TrafficSplit) -> Result<(String, f64)> {
    let mut best: Option<(&str, f64)> = None;

    for (config_id, value) in split.entries() {
        let percent = value.as_f64().ok_or_else(|| {
            ControlPlaneError::structural(format!(
                "problematic rollout: traffic percentage of {} is {}",
                config_id, value
            ))
        })?;

        match best {
            Some((_, top)) if percent <= top => {}
            _ => best = Some((config_id, percent)),
        }
    }

    best.map(|(id, percent)| (id.to_string(), percent))
        .ok_or_else(|| ControlPlaneError::structural("problematic rollout: empty traffic percentages"))
}

pub struct ServiceDefinitionFetcher {
    service_management_url: String,
    service_name: String,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
    current_config_id: String,
}

impl ServiceDefinitionFetcher {
    pub fn new(
        service_management_url: &str,
        service_name: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            service_management_url: service_management_url.trim_end_matches('/').to_string(),
            service_name: service_name.to_string(),
            tokens,
            client,
            current_config_id: String::new(),
        })
    }

    /// Id of the definition last returned by `fetch_for_rollout`.
    pub fn current_config_id(&self) -> &str {
        &self.current_config_id
    }

    pub fn rollout_url(&self, rollout_id: &str) -> String {
        format!(
            "{}/v1/services/{}/rollouts/{}",
            self.service_management_url, self.service_name, rollout_id
        )
    }

    pub fn config_url(&self, config_id: &str) -> String {
        format!(
            "{}/v1/services/{}/configs/{}?view=FULL",
            self.service_management_url, self.service_name, config_id
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let (token, _) = self
            .tokens
            .access_token()
            .await
            .map_err(|e| ControlPlaneError::network(format!("fail to get access token: {}", e)))?;

        let resp = self.client.get(url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "http call to {} returns not 200 OK: {}",
                url,
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    pub async fn fetch_rollout(&self, rollout_id: &str) -> Result<Rollout> {
        self.get_json(&self.rollout_url(rollout_id)).await
    }

    pub async fn fetch_definition(&self, config_id: &str) -> Result<ServiceDefinition> {
        self.get_json(&self.config_url(config_id)).await
    }

    /// Fetch the definition a rollout routes most traffic to.
    ///
    /// Returns `None` when that definition is the one already applied.
    pub async fn fetch_for_rollout(&mut self, rollout_id: &str) -> Result<Option<ServiceDefinition>> {
        let rollout = self.fetch_rollout(rollout_id).await?;
        let (config_id, percent) = select_config_id(&rollout.traffic_split())?;

        if config_id == self.current_config_id {
            info!(
                service = %self.service_name,
                config_id = %config_id,
                "No new configuration to load"
            );
            return Ok(None);
        }

        if (100.0 - percent).abs() >= 1e-9 {
            warn!(
                config_id = %config_id,
                percent = percent,
                "Traffic percentage of the selected configuration is not 100%, using it for all traffic"
            );
        }

        let definition = self.fetch_definition(&config_id).await?;
        info!(
            service = %self.service_name,
            rollout_id = %rollout_id,
            config_id = %config_id,
            "Loaded new service configuration"
        );
        self.current_config_id = config_id;
        Ok(Some(definition))
    }
}
