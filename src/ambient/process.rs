//! Ambient player process lifecycle

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use crate::{Error, Result};

/// How long the player has to expose its control socket
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a stopping player gets before it is killed
pub const STOP_GRACE: Duration = Duration::from_secs(2);

const SOCKET_POLL: Duration = Duration::from_millis(50);

/// A looping background player running out of process
#[async_trait]
pub trait PlayerProcess: Send {
    /// Launch the player at `volume` and wait until it accepts commands
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupTimeout` if the control socket never appears
    async fn start(&mut self, volume: u8) -> Result<()>;

    /// Wait for a requested exit, killing the process after the grace period
    async fn stop(&mut self);

    /// Whether the process is still alive
    fn is_running(&mut self) -> bool;

    /// Whether the looped asset is still on disk
    fn source_exists(&self) -> bool;
}

/// `mpv` looping the ambient track with an IPC socket
#[derive(Debug)]
pub struct MpvProcess {
    binary: PathBuf,
    loop_path: PathBuf,
    socket_path: PathBuf,
    child: Option<Child>,
}

impl MpvProcess {
    #[must_use]
    pub fn new(loop_path: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("mpv"),
            loop_path: loop_path.into(),
            socket_path: socket_path.into(),
            child: None,
        }
    }

    /// Use a specific player binary
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn remove_socket(&self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.socket_path.display(), error = %e, "failed to remove player socket");
        }
    }

    async fn wait_for_socket(&mut self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        loop {
            if UnixStream::connect(&self.socket_path).await.is_ok() {
                return Ok(());
            }

            if let Some(child) = self.child.as_mut()
                && let Ok(Some(status)) = child.try_wait()
            {
                self.child = None;
                return Err(Error::StartupTimeout(format!(
                    "player exited during startup ({status})"
                )));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::StartupTimeout(format!(
                    "timed out waiting for player socket {}",
                    self.socket_path.display()
                )));
            }

            tokio::time::sleep(SOCKET_POLL).await;
        }
    }
}

#[async_trait]
impl PlayerProcess for MpvProcess {
    async fn start(&mut self, volume: u8) -> Result<()> {
        self.remove_socket();

        tracing::info!(path = %self.loop_path.display(), volume, "starting ambient loop");

        let child = Command::new(&self.binary)
            .arg("--no-video")
            .arg("--really-quiet")
            .arg("--loop=inf")
            .arg(format!("--volume={volume}"))
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg(&self.loop_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::StartupTimeout(format!("failed to launch {}: {e}", self.binary.display()))
            })?;
        self.child = Some(child);

        if let Err(e) = self.wait_for_socket().await {
            if let Some(mut child) = self.child.take() {
                let _ = child.kill().await;
            }
            self.remove_socket();
            return Err(e);
        }

        tracing::debug!(socket = %self.socket_path.display(), "ambient player ready");
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(Some(status)) = child.try_wait() {
                tracing::debug!(%status, "ambient player already exited");
            } else if !self.socket_path.exists() {
                // No socket means the quit command never arrived
                tracing::warn!("ambient player has no control socket, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill ambient player");
                }
            } else {
                wait_or_kill(&mut child).await;
            }
        }
        self.remove_socket();
    }

    fn is_running(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|c| matches!(c.try_wait(), Ok(None)))
    }

    fn source_exists(&self) -> bool {
        self.loop_path.exists()
    }
}

/// Give a player that was asked to quit the grace period, then kill it
async fn wait_or_kill(child: &mut Child) {
    match tokio::time::timeout(STOP_GRACE, child.wait()).await {
        Ok(Ok(status)) => tracing::debug!(%status, "ambient player exited"),
        Ok(Err(e)) => tracing::warn!(error = %e, "failed waiting for ambient player"),
        Err(_) => {
            tracing::warn!("ambient player did not exit, killing");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill ambient player");
            }
        }
    }
}
