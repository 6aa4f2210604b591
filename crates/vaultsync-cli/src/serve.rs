//! Supervision of a local `bw serve` process

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use vaultsync_core::config::BitwardenSettings;
use vaultsync_core::{CancellationToken, ItemSecretStore};

const DEFAULT_BINARY: &str = "bw";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Running `bw serve` child, killed on shutdown or drop
pub struct BwServe {
    child: Child,
}

impl BwServe {
    pub fn spawn(settings: &BitwardenSettings) -> anyhow::Result<Self> {
        let binary = settings.serve_binary.as_deref().unwrap_or(DEFAULT_BINARY);
        let mut command = Command::new(binary);
        command
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(port) = settings.serve_port {
            command.arg("--port").arg(port.to_string());
        }

        let child = command
            .spawn()
            .with_context(|| format!("failed to run '{} serve'", binary))?;
        info!(pid = child.id(), "started bw serve");
        Ok(Self { child })
    }

    /// Poll `/status` until the helper answers
    pub async fn wait_ready(
        &mut self,
        store: &ItemSecretStore,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                bail!("bw serve exited early ({})", status);
            }
            match store.status().await {
                Ok(status) => {
                    info!(status = %status, "bw serve is ready");
                    return Ok(());
                }
                Err(err) => debug!(error = %err, "bw serve not ready yet"),
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("bw serve did not become ready within {:?}", timeout);
            }
            if !cancel.sleep(POLL_INTERVAL).await {
                bail!("interrupted while waiting for bw serve");
            }
        }
    }

    pub async fn shutdown(mut self) {
        if let Err(err) = self.child.kill().await {
            warn!(error = %err, "failed to stop bw serve");
        } else {
            info!("stopped bw serve");
        }
    }
}
