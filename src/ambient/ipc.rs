//! mpv JSON IPC over a Unix socket

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use crate::{Error, Result};

/// Connect and write timeout for one command
const IPC_TIMEOUT: Duration = Duration::from_secs(1);

/// Command understood by the ambient player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Set playback volume (0-100)
    SetVolume(u8),
    /// Ask the player to exit
    Quit,
}

impl PlayerCommand {
    /// Encode as one newline-terminated mpv IPC message
    #[must_use]
    pub fn to_line(self) -> String {
        let payload = match self {
            Self::SetVolume(v) => json!({ "command": ["set_property", "volume", v] }),
            Self::Quit => json!({ "command": ["quit"] }),
        };
        format!("{payload}\n")
    }
}

/// Delivers commands to a running player
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Send one command
    ///
    /// # Errors
    ///
    /// Returns `Error::Channel` if the player is unreachable
    async fn send(&self, command: PlayerCommand) -> Result<()>;
}

/// One-shot connection per command to mpv's `--input-ipc-server` socket
#[derive(Debug, Clone)]
pub struct MpvIpc {
    socket_path: PathBuf,
}

impl MpvIpc {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ControlChannel for MpvIpc {
    async fn send(&self, command: PlayerCommand) -> Result<()> {
        let line = command.to_line();
        match tokio::time::timeout(IPC_TIMEOUT, self.write_line(&line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Channel(format!(
                "{}: {e}",
                self.socket_path.display()
            ))),
            Err(_) => Err(Error::Channel(format!(
                "{}: timed out",
                self.socket_path.display()
            ))),
        }
    }
}
