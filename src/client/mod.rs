use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tonic::Request;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::proto;
use crate::rpc::{CallOptions, DiathekeRpc, GrpcTransport, Security};
use crate::streams::asr::{self, AsrReceiver, AsrSender};
use crate::streams::audio_input::AudioInputStream;
use crate::streams::command::{self, CommandNotifier, CommandReceiver};
use crate::streams::event::{CommandStatus, EventStream};
use crate::streams::tts::{AudioReplyStream, TtsStream};

mod session;

pub use session::Session;

/// Raw security settings as a caller or CLI collects them. `resolve` turns
/// them into a [`Security`] mode or rejects contradictory combinations.
#[derive(Clone, Default)]
pub struct SecurityOptions {
    pub insecure: bool,
    pub server_cert: Option<Vec<u8>>,
    pub client_cert: Option<Vec<u8>>,
    pub client_key: Option<Vec<u8>>,
}

impl SecurityOptions {
    pub fn insecure() -> Self {
        Self {
            insecure: true,
            ..Self::default()
        }
    }

    pub fn with_server_cert(mut self, pem: Vec<u8>) -> Self {
        self.server_cert = Some(pem);
        self
    }

    pub fn with_client_cert(mut self, cert: Vec<u8>, key: Vec<u8>) -> Self {
        self.client_cert = Some(cert);
        self.client_key = Some(key);
        self
    }

    pub fn resolve(&self) -> Result<Security> {
        let has_cert = self.server_cert.is_some()
            || self.client_cert.is_some()
            || self.client_key.is_some();
        if self.insecure {
            if has_cert {
                return Err(Error::InvalidSecurity(
                    "insecure connections cannot use certificates".to_string(),
                ));
            }
            return Ok(Security::Insecure);
        }

        let client_identity = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
            (None, None) => None,
            (Some(_), None) => {
                return Err(Error::InvalidSecurity(
                    "client certificate given without a key".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidSecurity(
                    "client key given without a certificate".to_string(),
                ));
            }
        };
        Ok(Security::Tls {
            server_cert: self.server_cert.clone(),
            client_identity,
        })
    }
}

impl fmt::Debug for SecurityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityOptions")
            .field("insecure", &self.insecure)
            .field("server_cert", &self.server_cert.is_some())
            .field("client_cert", &self.client_cert.is_some())
            .field("client_key", &self.client_key.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub security: SecurityOptions,
    pub call_options: CallOptions,
    /// Upper bound on how long any streaming receive may wait for the next
    /// message. `None` waits forever.
    pub stream_idle_timeout: Option<Duration>,
}

struct Inner {
    rpc: Arc<dyn DiathekeRpc>,
    address: String,
    closed: AtomicBool,
    /// Ids ended through this connection. Never pruned, so it grows by one
    /// entry per session for the connection's lifetime.
    ended_sessions: Mutex<HashSet<String>>,
    call_options: Mutex<CallOptions>,
    idle_timeout: Option<Duration>,
}

/// A channel to one Diatheke server. Clones share the channel; closing any
/// clone closes all of them.
///
/// Every ended session id is remembered so later calls naming it fail
/// locally. Long-lived processes that churn through many sessions should
/// reconnect now and then to release that memory.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.inner.address)
            .field("closed", &self.is_closed())
            .field("idle_timeout", &self.inner.idle_timeout)
            .finish()
    }
}

pub async fn connect(address: &str, options: ConnectOptions) -> Result<Connection> {
    let security = options.security.resolve()?;
    let transport = GrpcTransport::connect(address, &security).await?;
    Ok(Connection::with_rpc(address, Arc::new(transport), options))
}

impl Connection {
    /// Wraps an existing transport. `options.security` is not consulted.
    pub fn with_rpc(
        address: impl Into<String>,
        rpc: Arc<dyn DiathekeRpc>,
        options: ConnectOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                rpc,
                address: address.into(),
                closed: AtomicBool::new(false),
                ended_sessions: Mutex::new(HashSet::new()),
                call_options: Mutex::new(options.call_options),
                idle_timeout: options.stream_idle_timeout,
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Replaces the options applied to every subsequent call.
    pub fn set_call_options(&self, options: CallOptions) {
        *self.lock_call_options() = options;
    }

    pub fn append_call_options(&self, options: CallOptions) {
        self.lock_call_options().extend(options);
    }

    fn lock_call_options(&self) -> std::sync::MutexGuard<'_, CallOptions> {
        self.inner
            .call_options
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn request<T>(&self, message: T) -> Request<T> {
        self.lock_call_options().apply(message)
    }

    pub(crate) fn rpc(&self) -> &Arc<dyn DiathekeRpc> {
        &self.inner.rpc
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        self.inner.idle_timeout
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    pub(crate) fn ensure_session(&self, session_id: &str) -> Result<()> {
        self.ensure_open()?;
        let ended = self
            .inner
            .ended_sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if ended.contains(session_id) {
            return Err(Error::SessionEnded(session_id.to_string()));
        }
        Ok(())
    }

    pub async fn version(&self) -> Result<String> {
        self.ensure_open()?;
        let response = self.rpc().version(self.request(proto::Empty {})).await?;
        Ok(response.server)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let response = self.rpc().models(self.request(proto::Empty {})).await?;
        Ok(response.models)
    }

    /// Creates a session running `model`. The session is not started; attach
    /// its streams first, then call [`Session::start`].
    pub async fn create_session(&self, model: &str) -> Result<Session> {
        self.ensure_open()?;
        let request = self.request(proto::NewSessionRequest {
            model: model.to_string(),
        });
        let response = self.rpc().new_session(request).await?;
        if response.session_id.is_empty() {
            return Err(Error::ProtocolViolation(
                "server returned an empty session id".to_string(),
            ));
        }
        info!(session_id = %response.session_id, model = %model, "session created");
        Ok(Session::new(response.session_id, self.clone()))
    }

    pub async fn start_session(&self, session_id: &str) -> Result<()> {
        self.ensure_session(session_id)?;
        let request = self.request(proto::SessionId {
            session_id: session_id.to_string(),
        });
        self.rpc().start_session(request).await?;
        debug!(session_id = %session_id, "session started");
        Ok(())
    }

    /// Ends the session on the server. The id is unusable afterwards even if
    /// the call fails, so callers should log the error and move on.
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        self.ensure_session(session_id)?;
        self.inner
            .ended_sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session_id.to_string());
        let request = self.request(proto::SessionId {
            session_id: session_id.to_string(),
        });
        self.rpc().end_session(request).await?;
        info!(session_id = %session_id, "session ended");
        Ok(())
    }

    pub async fn push_text(&self, session_id: &str, text: &str) -> Result<()> {
        self.ensure_session(session_id)?;
        let request = self.request(proto::PushTextRequest {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
        self.rpc().push_text(request).await?;
        Ok(())
    }

    pub async fn set_story(
        &self,
        session_id: &str,
        story_id: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<()> {
        self.ensure_session(session_id)?;
        let request = self.request(proto::SetStoryRequest {
            session_id: session_id.to_string(),
            story_id: story_id.to_string(),
            parameters,
        });
        self.rpc().set_story(request).await?;
        debug!(session_id = %session_id, story_id = %story_id, "story set");
        Ok(())
    }

    pub async fn command_finished(&self, status: CommandStatus) -> Result<()> {
        self.ensure_session(&status.session_id)?;
        let request = self.request(status.into_proto());
        self.rpc().command_finished(request).await?;
        Ok(())
    }

    pub async fn session_event_stream(&self, session_id: &str) -> Result<EventStream> {
        self.ensure_session(session_id)?;
        EventStream::open(self, session_id).await
    }

    pub async fn stream_audio_input(&self, session_id: &str) -> Result<AudioInputStream> {
        self.ensure_session(session_id)?;
        AudioInputStream::open(self, session_id).await
    }

    pub async fn stream_audio_replies(&self, session_id: &str) -> Result<AudioReplyStream> {
        self.ensure_session(session_id)?;
        AudioReplyStream::open(self, session_id).await
    }

    /// Model-scoped streaming recognition, independent of any session.
    pub async fn stream_asr(&self, model: &str) -> Result<(AsrSender, AsrReceiver)> {
        self.ensure_open()?;
        asr::open(self, model).await
    }

    pub async fn stream_tts(&self, model: &str, text: &str) -> Result<TtsStream> {
        self.ensure_open()?;
        TtsStream::open(self, model, text).await
    }

    pub async fn command_and_notify(&self) -> Result<(CommandNotifier, CommandReceiver)> {
        self.ensure_open()?;
        command::open(self).await
    }

    /// Releases the channel. Every later call fails with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            warn!(address = %self.inner.address, "connection closed twice");
            return Err(Error::Closed);
        }
        self.inner.rpc.close();
        info!(address = %self.inner.address, "connection closed");
        Ok(())
    }
}
