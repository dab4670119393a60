use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Request, Status};
use tracing::{debug, info};

use super::{DiathekeRpc, ResponseStream};
use crate::error::{Error, Result};
use crate::proto;
use crate::proto::diatheke_client::DiathekeClient;

/// Transport security for the channel. Built from `client::SecurityOptions`,
/// which rejects contradictory combinations.
#[derive(Clone, PartialEq, Eq)]
pub enum Security {
    Insecure,
    Tls {
        server_cert: Option<Vec<u8>>,
        client_identity: Option<(Vec<u8>, Vec<u8>)>,
    },
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Security::Insecure => write!(f, "Insecure"),
            Security::Tls {
                server_cert,
                client_identity,
            } => f
                .debug_struct("Tls")
                .field("server_cert", &server_cert.is_some())
                .field("mutual", &client_identity.is_some())
                .finish(),
        }
    }
}

impl Default for Security {
    fn default() -> Self {
        Security::Tls {
            server_cert: None,
            client_identity: None,
        }
    }
}

pub(crate) fn endpoint_uri(address: &str, security: &Security) -> String {
    if address.contains("://") {
        return address.to_string();
    }
    match security {
        Security::Insecure => format!("http://{}", address),
        Security::Tls { .. } => format!("https://{}", address),
    }
}

pub struct GrpcTransport {
    client: Mutex<Option<DiathekeClient>>,
}

impl GrpcTransport {
    pub async fn connect(address: &str, security: &Security) -> Result<Self> {
        let uri = endpoint_uri(address, security);
        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|err| Error::Connect(format!("invalid address {}: {}", address, err)))?;

        if let Security::Tls {
            server_cert,
            client_identity,
        } = security
        {
            let mut tls = ClientTlsConfig::new().with_native_roots();
            if let Some(pem) = server_cert {
                tls = tls.ca_certificate(Certificate::from_pem(pem));
            }
            if let Some((cert, key)) = client_identity {
                tls = tls.identity(Identity::from_pem(cert, key));
            }
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|err| Error::Connect(format!("tls config: {}", err)))?;
        }

        debug!(uri = %uri, security = ?security, "dialing diatheke server");
        let channel: Channel = endpoint
            .connect()
            .await
            .map_err(|err| Error::Connect(format!("{}: {}", address, err)))?;
        info!(address = %address, "connected to diatheke server");

        Ok(Self {
            client: Mutex::new(Some(DiathekeClient::new(channel))),
        })
    }

    fn client(&self) -> std::result::Result<DiathekeClient, Status> {
        let guard = self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .clone()
            .ok_or_else(|| Status::unavailable("channel is closed"))
    }
}

#[async_trait]
impl DiathekeRpc for GrpcTransport {
    async fn version(
        &self,
        request: Request<proto::Empty>,
    ) -> std::result::Result<proto::VersionResponse, Status> {
        Ok(self.client()?.version(request).await?.into_inner())
    }

    async fn models(
        &self,
        request: Request<proto::Empty>,
    ) -> std::result::Result<proto::ModelsResponse, Status> {
        Ok(self.client()?.models(request).await?.into_inner())
    }

    async fn new_session(
        &self,
        request: Request<proto::NewSessionRequest>,
    ) -> std::result::Result<proto::SessionId, Status> {
        Ok(self.client()?.new_session(request).await?.into_inner())
    }

    async fn start_session(
        &self,
        request: Request<proto::SessionId>,
    ) -> std::result::Result<proto::Empty, Status> {
        Ok(self.client()?.start_session(request).await?.into_inner())
    }

    async fn end_session(
        &self,
        request: Request<proto::SessionId>,
    ) -> std::result::Result<proto::Empty, Status> {
        Ok(self.client()?.end_session(request).await?.into_inner())
    }

    async fn session_event_stream(
        &self,
        request: Request<proto::SessionId>,
    ) -> std::result::Result<ResponseStream<proto::DiathekeEvent>, Status> {
        let stream = self.client()?.session_event_stream(request).await?;
        Ok(stream.into_inner().boxed())
    }

    async fn command_finished(
        &self,
        request: Request<proto::CommandStatus>,
    ) -> std::result::Result<proto::Empty, Status> {
        Ok(self.client()?.command_finished(request).await?.into_inner())
    }

    async fn stream_audio_input(
        &self,
        request: Request<ReceiverStream<proto::AudioInput>>,
    ) -> std::result::Result<proto::AsrResponse, Status> {
        Ok(self.client()?.stream_audio_input(request).await?.into_inner())
    }

    async fn stream_audio_replies(
        &self,
        request: Request<proto::SessionId>,
    ) -> std::result::Result<ResponseStream<proto::AudioReply>, Status> {
        let stream = self.client()?.stream_audio_replies(request).await?;
        Ok(stream.into_inner().boxed())
    }

    async fn push_text(
        &self,
        request: Request<proto::PushTextRequest>,
    ) -> std::result::Result<proto::Empty, Status> {
        Ok(self.client()?.push_text(request).await?.into_inner())
    }

    async fn set_story(
        &self,
        request: Request<proto::SetStoryRequest>,
    ) -> std::result::Result<proto::Empty, Status> {
        Ok(self.client()?.set_story(request).await?.into_inner())
    }

    async fn stream_asr(
        &self,
        request: Request<ReceiverStream<proto::AsrRequest>>,
    ) -> std::result::Result<ResponseStream<proto::AsrResponse>, Status> {
        let stream = self.client()?.stream_asr(request).await?;
        Ok(stream.into_inner().boxed())
    }

    async fn stream_tts(
        &self,
        request: Request<proto::TtsRequest>,
    ) -> std::result::Result<ResponseStream<proto::TtsResponse>, Status> {
        let stream = self.client()?.stream_tts(request).await?;
        Ok(stream.into_inner().boxed())
    }

    async fn command_and_notify(
        &self,
        request: Request<ReceiverStream<proto::CommandStatusUpdate>>,
    ) -> std::result::Result<ResponseStream<proto::CommandToExecute>, Status> {
        let stream = self.client()?.command_and_notify(request).await?;
        Ok(stream.into_inner().boxed())
    }

    fn close(&self) {
        let mut guard = self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            debug!("grpc channel released");
        }
    }
}
