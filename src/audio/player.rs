use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

use super::{AudioAppConfig, AudioSink};
use crate::error::{Error, Result};

/// Runs a playback executable and feeds raw audio to its stdin.
pub struct Player {
    config: AudioAppConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl Player {
    pub fn new(config: AudioAppConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

#[async_trait]
impl AudioSink for Player {
    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let mut child = Command::new(self.config.application.trim())
            .args(self.config.arg_list())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Error::Resource(format!("failed to start {}: {}", self.config.application, err))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Resource("player stdin was not captured".to_string()))?;
        debug!(app = %self.config.application, pid = ?child.id(), "player started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        Ok(())
    }

    /// Closes stdin and waits for the player to drain what it was given.
    async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        let status = child
            .wait()
            .await
            .map_err(|err| Error::Resource(format!("failed to reap player: {}", err)))?;
        debug!(%status, "player stopped");
        if !status.success() {
            return Err(Error::Resource(format!("player exited with {}", status)));
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Resource("player is not running".to_string()))?;
        stdin
            .write_all(data)
            .await
            .map_err(|err| Error::Resource(format!("player write failed: {}", err)))
    }
}
