use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use super::{AudioAppConfig, AudioSource};
use crate::error::{Error, Result};

/// Runs a capture executable and reads raw audio from its stdout.
pub struct Recorder {
    config: AudioAppConfig,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl Recorder {
    pub fn new(config: AudioAppConfig) -> Self {
        Self {
            config,
            child: None,
            stdout: None,
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
impl AudioSource for Recorder {
    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let mut child = Command::new(self.config.application.trim())
            .args(self.config.arg_list())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Error::Resource(format!("failed to start {}: {}", self.config.application, err))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Resource("recorder stdout was not captured".to_string()))?;
        debug!(app = %self.config.application, pid = ?child.id(), "recorder started");
        self.child = Some(child);
        self.stdout = Some(stdout);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.stdout = None;
        if let Err(err) = child.start_kill() {
            warn!("failed to signal recorder: {}", err);
        }
        child
            .wait()
            .await
            .map_err(|err| Error::Resource(format!("failed to reap recorder: {}", err)))?;
        debug!("recorder stopped");
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| Error::Resource("recorder is not running".to_string()))?;
        stdout
            .read(buf)
            .await
            .map_err(|err| Error::Resource(format!("recorder read failed: {}", err)))
    }
}
