//! OS signal handling.
//!
//! SIGINT and SIGTERM are turned into messages on the supervisor's
//! channel so the same signal can be relayed to the proxy.

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{ControlPlaneError, Result};

/// Install SIGINT/SIGTERM handlers and forward each delivery.
///
/// Handlers stay installed until the receiver is dropped.
pub fn forward_os_signals() -> Result<mpsc::Receiver<Signal>> {
    let mut interrupt = signal(SignalKind::interrupt())
        .map_err(|e| ControlPlaneError::process(format!("failed to install SIGINT handler: {}", e)))?;
    let mut terminate = signal(SignalKind::terminate())
        .map_err(|e| ControlPlaneError::process(format!("failed to install SIGTERM handler: {}", e)))?;

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::SIGINT,
                Some(()) = terminate.recv() => Signal::SIGTERM,
                else => break,
            };

            info!(signal = %received, "Received signal");
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    use std::time::Duration;

    #[tokio::test]
    async fn forwards_sigterm() {
        let mut rx = forward_os_signals().unwrap();
        kill(Pid::this(), Signal::SIGTERM).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(received, Some(Signal::SIGTERM));
    }
}
