//! Proxy process supervision.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::error::{ControlPlaneError, Result};
use crate::observability::metrics;

pub const DEFAULT_BINARY_PATH: &str = "bin/envoy";
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(60);
const LOG_FORMAT: &str = "%L%m%d %T.%e %t envoy] [%t][%n]%v";

#[derive(Debug, Clone)]
pub struct StartEnvoyOptions {
    pub binary_path: PathBuf,
    /// Passed as `--component-log-level` when non-empty.
    pub component_log_level: String,
    pub config_path: PathBuf,
    pub log_level: String,
    pub log_path: String,
    /// How long to wait for the proxy to exit after relaying a signal.
    pub terminate_timeout: Duration,
}

impl Default for StartEnvoyOptions {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from(DEFAULT_BINARY_PATH),
            component_log_level: String::new(),
            config_path: PathBuf::from(crate::bootstrap::fetch::DEFAULT_WRITE_FILE_PATH),
            log_level: "info".to_string(),
            log_path: String::new(),
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }
}

/// Command line handed to the proxy binary.
pub fn envoy_args(opts: &StartEnvoyOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--service-cluster".into(),
        "front-envoy".into(),
        "--service-node".into(),
        "front-envoy".into(),
        "--disable-hot-restart".into(),
        "--config-path".into(),
        opts.config_path.display().to_string(),
        "--log-level".into(),
        opts.log_level.clone(),
        "--log-path".into(),
        opts.log_path.clone(),
        "--log-format".into(),
        LOG_FORMAT.into(),
        "--log-format-escaped".into(),
        "--allow-unknown-static-fields".into(),
    ];
    if !opts.component_log_level.is_empty() {
        args.push("--component-log-level".into());
        args.push(opts.component_log_level.clone());
    }
    args
}

/// Start the proxy and block until it exits or a signal stops it.
///
/// Never returns `Ok`: every exit of the proxy is an error, status 0
/// included, whether or not a signal was relayed first.
///
/// The proxy sees only `TMPDIR=/tmp` in its environment. It is killed if
/// the supervising task is dropped before it exits.
pub async fn start_envoy_and_wait(signals: mpsc::Receiver<Signal>, opts: StartEnvoyOptions) -> Result<()> {
    let child = Command::new(&opts.binary_path)
        .args(envoy_args(&opts))
        .env_clear()
        .env("TMPDIR", "/tmp")
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| {
            ControlPlaneError::process(format!(
                "failed to start Envoy {}: {}",
                opts.binary_path.display(),
                e
            ))
        })?;

    info!(
        binary = %opts.binary_path.display(),
        config = %opts.config_path.display(),
        pid = child.id().unwrap_or_default(),
        "Started Envoy"
    );

    supervise(child, signals, opts.terminate_timeout).await
}

/// Wait on an already started proxy; see [`start_envoy_and_wait`].
pub async fn supervise(
    mut child: Child,
    mut signals: mpsc::Receiver<Signal>,
    terminate_timeout: Duration,
) -> Result<()> {
    let pid = child
        .id()
        .ok_or_else(|| ControlPlaneError::process("envoy exited before supervision started"))?;

    let (exit_tx, mut exit_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = exit_tx.send(child.wait().await);
    });

    let signal = tokio::select! {
        exit = &mut exit_rx => {
            metrics::record_proxy_exit("exited");
            return Err(unexpected_exit(flatten_exit(exit)));
        }
        Some(signal) = signals.recv() => signal,
    };

    error!(signal = %signal, "Stopping Envoy due to signal");
    let target = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    kill(target, signal).map_err(|e| {
        ControlPlaneError::process(format!("failed to signal Envoy with {}: {}", signal, e))
    })?;

    match tokio::time::timeout(terminate_timeout, exit_rx).await {
        Ok(exit) => {
            metrics::record_proxy_exit("signalled");
            Err(unexpected_exit(flatten_exit(exit)))
        }
        Err(_) => {
            metrics::record_proxy_exit("timeout");
            Err(ControlPlaneError::process(format!(
                "timed out waiting for Envoy to exit after {:?}",
                terminate_timeout
            )))
        }
    }
}

fn flatten_exit(
    exit: std::result::Result<std::io::Result<ExitStatus>, oneshot::error::RecvError>,
) -> Result<ExitStatus> {
    match exit {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(ControlPlaneError::process(format!("failed waiting for Envoy: {}", e))),
        Err(_) => Err(ControlPlaneError::process("lost track of the Envoy process")),
    }
}

fn unexpected_exit(exit: Result<ExitStatus>) -> ControlPlaneError {
    match exit {
        Ok(status) if status.success() => ControlPlaneError::process(
            "envoy exited: unexpectedly exited OK from Envoy, which should never happen",
        ),
        Ok(status) => ControlPlaneError::process(format!("envoy exited: {}", status)),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn shell(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[test]
    fn fixed_flags_and_component_level() {
        let mut opts = StartEnvoyOptions {
            config_path: PathBuf::from("/tmp/envoy.json"),
            log_level: "debug".into(),
            ..Default::default()
        };

        let args = envoy_args(&opts);
        assert_eq!(args[..5], ["--service-cluster", "front-envoy", "--service-node", "front-envoy", "--disable-hot-restart"]);
        assert!(args.windows(2).any(|w| w == ["--config-path", "/tmp/envoy.json"]));
        assert!(args.windows(2).any(|w| w == ["--log-level", "debug"]));
        assert!(!args.contains(&"--component-log-level".to_string()));

        opts.component_log_level = "upstream:debug".into();
        let args = envoy_args(&opts);
        assert_eq!(args[args.len() - 2..], ["--component-log-level", "upstream:debug"]);
    }

    #[tokio::test]
    async fn clean_exit_is_an_error() {
        let (_tx, rx) = mpsc::channel(1);
        let err = supervise(shell("exit 0"), rx, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("unexpectedly exited OK"), "{}", err);
    }

    #[tokio::test]
    async fn failed_exit_is_an_error() {
        let (_tx, rx) = mpsc::channel(1);
        let err = supervise(shell("exit 3"), rx, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Process(_)));
    }

    #[tokio::test]
    async fn closed_signal_channel_waits_for_exit() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let err = supervise(shell("sleep 0.2; exit 1"), rx, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Process(_)));
    }

    #[tokio::test]
    async fn relays_signal_and_reports_exit() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(Signal::SIGTERM).await.unwrap();
        let err = supervise(shell("exec sleep 30"), rx, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Process(_)));
        assert!(err.to_string().contains("envoy exited"), "{}", err);
    }

    #[tokio::test]
    async fn clean_exit_after_signal_is_still_an_error() {
        let (tx, rx) = mpsc::channel(1);
        let child = shell("trap 'exit 0' TERM; while :; do sleep 0.05; done");

        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(Signal::SIGTERM).await.unwrap();

        let err = supervise(child, rx, Duration::from_secs(5)).await.unwrap_err();
        assert!(err.to_string().contains("unexpectedly exited OK"), "{}", err);
    }

    #[tokio::test]
    async fn ignored_signal_times_out() {
        let (tx, rx) = mpsc::channel(1);
        let child = shell("trap '' TERM; sleep 3");

        // let the shell install its trap
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(Signal::SIGTERM).await.unwrap();

        let err = supervise(child, rx, Duration::from_millis(200)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{}", err);
    }

    fn process_gone(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => true,
            // zombies are dead but not yet reaped
            Ok(stat) => stat.rsplit(')').next().map(|rest| rest.trim_start().starts_with('Z')).unwrap_or(false),
        }
    }

    #[test]
    fn proxy_gets_clean_env_and_dies_with_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("envoy");
        let marker = dir.path().join("started");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$$|$TMPDIR|$CARGO_MANIFEST_DIR\" > {}\nexec sleep 30\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (_tx, rx) = mpsc::channel(1);
        let opts = StartEnvoyOptions { binary_path: script, ..Default::default() };
        runtime.spawn(start_envoy_and_wait(rx, opts));

        let mut line = String::new();
        for _ in 0..100 {
            line = std::fs::read_to_string(&marker).unwrap_or_default();
            if line.ends_with('\n') {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        let fields: Vec<&str> = line.trim_end().split('|').collect();
        assert_eq!(fields.len(), 3, "marker: {:?}", line);
        assert_eq!(fields[1], "/tmp");
        assert_eq!(fields[2], "", "runner environment leaked into the proxy");

        let pid = fields[0].to_string();
        assert!(!process_gone(&pid));
        drop(runtime);

        let mut gone = false;
        for _ in 0..100 {
            if process_gone(&pid) {
                gone = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(gone, "proxy {} outlived its supervisor", pid);
    }

    #[tokio::test]
    async fn missing_binary_fails_to_start() {
        let (_tx, rx) = mpsc::channel(1);
        let opts = StartEnvoyOptions {
            binary_path: PathBuf::from("/nonexistent/envoy"),
            ..Default::default()
        };
        let err = start_envoy_and_wait(rx, opts).await.unwrap_err();
        assert!(err.to_string().contains("failed to start Envoy"), "{}", err);
    }
}
