//! Process-backed audio capture and playback.

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};

mod player;
mod recorder;

pub use player::Player;
pub use recorder::Recorder;

/// Something that produces raw audio bytes, e.g. a microphone process.
#[async_trait]
pub trait AudioSource: Send {
    /// Starts capture. Calling it while already running does nothing.
    async fn start(&mut self) -> Result<()>;

    /// Stops capture. Calling it while stopped does nothing.
    async fn stop(&mut self) -> Result<()>;

    /// Reads up to `buf.len()` bytes. `Ok(0)` means the source is exhausted.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Something that consumes raw audio bytes, e.g. a speaker process.
#[async_trait]
pub trait AudioSink: Send {
    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;

    async fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// External audio executable plus its whitespace-separated arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioAppConfig {
    pub application: String,
    pub args: String,
}

impl AudioAppConfig {
    pub fn new(application: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            args: args.into(),
        }
    }

    /// Reads `{prefix}_APP` and `{prefix}_ARGS`. Returns `None` when no
    /// application is set.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let application = env::var(format!("{}_APP", prefix)).ok()?;
        if application.trim().is_empty() {
            return None;
        }
        let args = env::var(format!("{}_ARGS", prefix)).unwrap_or_default();
        Some(Self::new(application.trim(), args))
    }

    pub fn is_configured(&self) -> bool {
        !self.application.trim().is_empty()
    }

    pub fn arg_list(&self) -> Vec<&str> {
        self.args.split_whitespace().collect()
    }

    /// Resolves the application to an existing file, searching `PATH` when
    /// it is a bare name.
    pub fn check_executable(&self) -> Result<PathBuf> {
        if !self.is_configured() {
            return Err(Error::Resource("no audio application configured".to_string()));
        }
        let app = self.application.trim();
        if app.contains(std::path::MAIN_SEPARATOR) {
            return check_file(Path::new(app));
        }
        let paths = env::var_os("PATH").unwrap_or_default();
        env::split_paths(&paths)
            .map(|dir| dir.join(app))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::Resource(format!("{} not found in PATH", app)))
    }
}

fn check_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::Resource(format!("{} does not exist", path.display())));
    }
    if path.is_dir() {
        return Err(Error::Resource(format!("{} is a directory", path.display())));
    }
    Ok(path.to_path_buf())
}
