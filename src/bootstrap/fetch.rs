//! Bootstrap acquisition: read, transform, write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::{timeout_at, Instant};
use tracing::info;

use crate::bootstrap::storage::ObjectStore;
use crate::bootstrap::transform::transform_bootstrap;
use crate::credentials::MetadataClient;
use crate::error::{ControlPlaneError, Result};
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, BackoffConfig};

pub const DEFAULT_WRITE_FILE_PATH: &str = "envoy.json";
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub struct FetchConfigOptions {
    pub bucket: String,
    pub object: String,
    /// Listener port to force; 0 keeps the fetched port.
    pub want_port: u16,
    pub write_file_path: PathBuf,
    /// First retry delay.
    pub initial_interval: Duration,
    /// Deadline for the whole read, retries included.
    pub timeout: Duration,
}

impl Default for FetchConfigOptions {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            object: String::new(),
            want_port: 0,
            write_file_path: PathBuf::from(DEFAULT_WRITE_FILE_PATH),
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Read the bootstrap object, retrying transient failures until the deadline.
///
/// Each attempt is bounded by the remaining time, so a read still pending
/// at the deadline ends the loop with `DeadlineExceeded` instead of being
/// retried.
pub async fn read_with_retry(store: &dyn ObjectStore, opts: &FetchConfigOptions) -> Result<Vec<u8>> {
    let deadline = Instant::now() + opts.timeout;
    let backoff = BackoffConfig::with_initial_interval(opts.initial_interval);
    let limit = opts.timeout;
    let (bucket, object) = (opts.bucket.as_str(), opts.object.as_str());

    let attempts = retry_with_backoff(&backoff, "read_bootstrap_object", move || async move {
        metrics::record_bootstrap_fetch_attempt();
        timeout_at(deadline, store.read_object(bucket, object))
            .await
            .map_err(|_| ControlPlaneError::DeadlineExceeded(limit))?
    });

    timeout_at(deadline, attempts)
        .await
        .map_err(|_| ControlPlaneError::DeadlineExceeded(limit))?
}

/// Write the bootstrap to disk. The file is closed on every return path.
pub async fn write_bootstrap(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| {
        ControlPlaneError::process(format!("failed to create file {}: {}", path.display(), e))
    })?;

    file.write_all(bytes).await.map_err(|e| {
        ControlPlaneError::process(format!("failed to write to file {}: {}", path.display(), e))
    })?;
    file.flush().await?;
    Ok(())
}

/// Fetch the bootstrap, apply the listener and platform edits, and write it
/// to `opts.write_file_path`.
pub async fn fetch_config_from_store(
    store: &dyn ObjectStore,
    metadata: &MetadataClient,
    opts: &FetchConfigOptions,
) -> Result<()> {
    let raw = read_with_retry(store, opts).await?;
    info!(
        bucket = %opts.bucket,
        object = %opts.object,
        bytes = raw.len(),
        "Fetched bootstrap config"
    );

    let attrs = metadata.gcp_attributes().await?;
    let transformed = transform_bootstrap(&raw, opts.want_port, &attrs)?;

    write_bootstrap(&opts.write_file_path, &transformed).await?;
    info!(path = %opts.write_file_path.display(), "Wrote bootstrap config");
    Ok(())
}
