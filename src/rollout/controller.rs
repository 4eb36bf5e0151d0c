//! Rollout id polling loop.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::credentials::TokenSource;
use crate::error::{ControlPlaneError, Result};
use crate::observability::metrics;
use crate::service::rollout::ReportResponse;

/// Something that can report the currently deployed rollout id.
#[async_trait]
pub trait LatestRolloutIdSource: Send + Sync {
    async fn latest_rollout_id(&self) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest<'a> {
    service_name: &'a str,
}

/// Reads the rollout id from an empty service control report call.
pub struct ServiceControlRolloutIdSource {
    service_control_url: String,
    service_name: String,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl ServiceControlRolloutIdSource {
    pub fn new(
        service_control_url: &str,
        service_name: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            service_control_url: service_control_url.trim_end_matches('/').to_string(),
            service_name: service_name.to_string(),
            tokens,
            client,
        })
    }

    pub fn report_url(&self) -> String {
        format!("{}/v1/services/{}:report", self.service_control_url, self.service_name)
    }
}

#[async_trait]
impl LatestRolloutIdSource for ServiceControlRolloutIdSource {
    async fn latest_rollout_id(&self) -> Result<String> {
        let (token, _) = self
            .tokens
            .access_token()
            .await
            .map_err(|e| ControlPlaneError::network(format!("fail to get access token: {}", e)))?;

        let url = self.report_url();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&ReportRequest { service_name: &self.service_name })
            .send()
            .await
            .map_err(|e| ControlPlaneError::network(format!("fail to fetch new rollout id, {}", e)))?;

        if !resp.status().is_success() {
            return Err(ControlPlaneError::network(format!(
                "http call to {} returns not 200 OK: {}",
                url,
                resp.status()
            )));
        }

        let report: ReportResponse = resp.json().await?;
        Ok(report.service_rollout_id)
    }
}

/// What one poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged,
    Changed(String),
    Failed,
}

/// Detects rollout id changes and notifies the owner.
///
/// The stored id is written only by the poll task. Readers see an
/// eventually consistent snapshot.
pub struct RolloutController {
    source: Arc<dyn LatestRolloutIdSource>,
    current: Arc<ArcSwap<String>>,
}

impl RolloutController {
    pub fn new(source: Arc<dyn LatestRolloutIdSource>) -> Self {
        Self {
            source,
            current: Arc::new(ArcSwap::from_pointee(String::new())),
        }
    }

    /// Start from a rollout id already applied by the caller. Without it
    /// the stored id is empty and the first successful poll notifies.
    pub fn with_current_rollout_id(self, rollout_id: impl Into<String>) -> Self {
        self.current.store(Arc::new(rollout_id.into()));
        self
    }

    pub fn current_rollout_id(&self) -> String {
        self.current.load().as_ref().clone()
    }

    /// Run a single poll against the source.
    pub async fn poll_once(&self) -> PollOutcome {
        poll(self.source.as_ref(), &self.current).await
    }

    /// Spawn the poll loop. The first poll happens one `interval` after
    /// the call; `callback` runs inside the loop with each new id.
    pub fn start<F>(&self, interval: Duration, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(String) + Send + 'static,
    {
        let source = self.source.clone();
        let current = self.current.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let PollOutcome::Changed(rollout_id) = poll(source.as_ref(), &current).await {
                    callback(rollout_id);
                }
            }
        })
    }
}

async fn poll(source: &dyn LatestRolloutIdSource, current: &ArcSwap<String>) -> PollOutcome {
    let latest = match source.latest_rollout_id().await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Error occurred when checking new rollout id");
            metrics::record_rollout_poll("error");
            return PollOutcome::Failed;
        }
    };

    let previous = current.load();
    if **previous == latest {
        debug!(rollout_id = %latest, "Rollout id unchanged");
        metrics::record_rollout_poll("unchanged");
        return PollOutcome::Unchanged;
    }

    info!(previous = %previous.as_str(), rollout_id = %latest, "Detected new rollout id");
    current.store(Arc::new(latest.clone()));
    metrics::record_rollout_poll("changed");
    PollOutcome::Changed(latest)
}
