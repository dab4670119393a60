use std::fs;
use std::path::Path;
use std::time::Duration;

use diatheke::audio::AudioAppConfig;
use diatheke::{ConnectOptions, SecurityOptions};

use crate::cli::ServerArgs;

const RECORD_PREFIX: &str = "DIATHEKE_RECORD";
const PLAYBACK_PREFIX: &str = "DIATHEKE_PLAYBACK";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub security: SecurityOptions,
    pub idle_timeout: Option<Duration>,
    pub verbose: bool,
}

impl ServerConfig {
    pub fn default_address() -> String {
        "localhost:9002".to_string()
    }

    pub fn from_args(args: &ServerArgs) -> Result<Self, String> {
        let security = SecurityOptions {
            insecure: args.insecure,
            server_cert: read_pem(args.server_cert.as_deref())?,
            client_cert: read_pem(args.client_cert.as_deref())?,
            client_key: read_pem(args.client_key.as_deref())?,
        };
        Ok(Self {
            address: args.address.clone(),
            security,
            idle_timeout: args.idle_timeout_secs.map(Duration::from_secs),
            verbose: args.verbose,
        })
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            security: self.security.clone(),
            stream_idle_timeout: self.idle_timeout,
            ..ConnectOptions::default()
        }
    }
}

fn read_pem(path: Option<&Path>) -> Result<Option<Vec<u8>>, String> {
    path.map(|path| {
        fs::read(path).map_err(|err| format!("failed to read {}: {}", path.display(), err))
    })
    .transpose()
}

/// External record and playback applications, taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    pub recording: Option<AudioAppConfig>,
    pub playback: Option<AudioAppConfig>,
}

impl AudioConfig {
    pub fn from_env() -> Self {
        Self {
            recording: AudioAppConfig::from_env(RECORD_PREFIX),
            playback: AudioAppConfig::from_env(PLAYBACK_PREFIX),
        }
    }

    pub fn require_recording(&self) -> Result<AudioAppConfig, String> {
        require(self.recording.as_ref(), RECORD_PREFIX, "recording")
    }

    pub fn require_playback(&self) -> Result<AudioAppConfig, String> {
        require(self.playback.as_ref(), PLAYBACK_PREFIX, "playback")
    }
}

fn require(app: Option<&AudioAppConfig>, prefix: &str, what: &str) -> Result<AudioAppConfig, String> {
    let app = app.ok_or_else(|| format!("missing {} application, set {}_APP", what, prefix))?;
    app.check_executable()
        .map_err(|err| format!("{} application unusable: {}", what, err))?;
    Ok(app.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ServerArgs {
        ServerArgs {
            address: ServerConfig::default_address(),
            insecure: true,
            server_cert: None,
            client_cert: None,
            client_key: None,
            idle_timeout_secs: Some(30),
            verbose: false,
        }
    }

    #[test]
    fn args_map_onto_connect_options() {
        let config = ServerConfig::from_args(&args()).unwrap();
        let options = config.connect_options();
        assert!(options.security.insecure);
        assert_eq!(options.stream_idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn unreadable_certificate_is_reported() {
        let mut args = args();
        args.server_cert = Some("/no/such/cert.pem".into());
        let err = ServerConfig::from_args(&args).unwrap_err();
        assert!(err.contains("/no/such/cert.pem"));
    }

    #[test]
    fn missing_audio_apps_are_startup_errors() {
        let config = AudioConfig::default();
        assert!(config.require_recording().unwrap_err().contains("DIATHEKE_RECORD_APP"));
        let config = AudioConfig {
            playback: Some(AudioAppConfig::new("sh", "-c cat>/dev/null")),
            ..AudioConfig::default()
        };
        assert!(config.require_playback().is_ok());
    }
}
