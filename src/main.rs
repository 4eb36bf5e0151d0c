//! gcs-runner
//!
//! Fetches the proxy bootstrap from Cloud Storage, adapts it to the local
//! deployment and runs the proxy until it exits or the runner is signalled.
//!
//! ```text
//!   BUCKET / CONFIG_FILE_NAME
//!            │
//!            ▼
//!   ┌─────────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ object store    │──▶│ transform    │──▶│ envoy.json   │
//!   │ read + backoff  │   │ port + attrs │   │ (local file) │
//!   └─────────────────┘   └──────────────┘   └──────┬───────┘
//!                                                   ▼
//!                          SIGINT/SIGTERM ──▶ supervisor ──▶ proxy process
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sidecar_control_plane::bootstrap::{fetch_config_from_store, FetchConfigOptions, GcsObjectStore};
use sidecar_control_plane::config::{loader::load_options, DeploymentOptions, ImpersonationCredentials};
use sidecar_control_plane::credentials::{
    select_token_source, ImpersonatedTokenSource, MetadataClient, TokenCache, TokenSource,
};
use sidecar_control_plane::lifecycle::{forward_os_signals, start_envoy_and_wait, StartEnvoyOptions};
use sidecar_control_plane::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "gcs-runner")]
#[command(about = "Fetch the proxy bootstrap from Cloud Storage and supervise the proxy", long_about = None)]
struct Args {
    /// Bucket holding the bootstrap config
    #[arg(long, env = "BUCKET")]
    bucket: String,

    /// Object name of the bootstrap config
    #[arg(long, env = "CONFIG_FILE_NAME")]
    config_file_name: String,

    #[arg(long, env = "ENVOY_BIN_PATH", default_value = "bin/envoy")]
    envoy_bin_path: PathBuf,

    #[arg(long, env = "ENVOY_LOG_LEVEL", default_value = "info")]
    envoy_log_level: String,

    #[arg(long, env = "ENVOY_LOG_PATH", default_value = "")]
    envoy_log_path: String,

    #[arg(long, env = "ENVOY_COMPONENT_LOG_LEVEL", default_value = "")]
    envoy_component_log_level: String,

    /// Service account to impersonate when reading the bucket
    #[arg(long, env = "RUN_AS_SERVICE_ACCOUNT", default_value = "")]
    run_as_service_account: String,

    /// Listener port to force in the bootstrap (0 keeps the fetched port)
    #[arg(long, default_value_t = 0)]
    listener_port: u16,

    /// Deployment options file (TOML)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Prometheus scrape address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    logging::init_logging();
    let args = Args::parse();

    tracing::info!(
        bucket = %args.bucket,
        object = %args.config_file_name,
        envoy = %args.envoy_bin_path.display(),
        "gcs-runner starting"
    );

    if let Some(addr) = args.metrics_address {
        metrics::init_metrics(addr);
    }

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "gcs-runner failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let opts = match &args.options {
        Some(path) => load_options(path)?,
        None => DeploymentOptions::default(),
    };
    let timeout = opts.http_request_timeout();

    let mut tokens = select_token_source(&opts)?;
    if !args.run_as_service_account.is_empty() {
        let impersonated = ImpersonatedTokenSource::new(
            tokens,
            &opts.iam_url,
            ImpersonationCredentials {
                service_account_email: args.run_as_service_account.clone(),
                delegates: Vec::new(),
            },
            timeout,
        )?;
        tokens = Arc::new(TokenCache::new(impersonated)) as Arc<dyn TokenSource>;
    }

    let store = GcsObjectStore::new(tokens, timeout)?;
    let metadata = MetadataClient::new(&opts.metadata_url, timeout)?;
    let fetch_opts = FetchConfigOptions {
        bucket: args.bucket,
        object: args.config_file_name,
        want_port: args.listener_port,
        ..Default::default()
    };
    fetch_config_from_store(&store, &metadata, &fetch_opts).await?;

    let signals = forward_os_signals()?;
    start_envoy_and_wait(
        signals,
        StartEnvoyOptions {
            binary_path: args.envoy_bin_path,
            component_log_level: args.envoy_component_log_level,
            config_path: fetch_opts.write_file_path,
            log_level: args.envoy_log_level,
            log_path: args.envoy_log_path,
            ..Default::default()
        },
    )
    .await?;

    Ok(())
}
