//! Typed request/response seam between the SDK and the Diatheke service.
//!
//! Everything above this layer speaks in domain types; everything below it is
//! tonic. Tests swap the gRPC transport for the in-crate fake.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::{Request, Status};
use tracing::warn;

use crate::proto;

#[cfg(test)]
pub(crate) mod fake;
mod grpc;

pub use grpc::{GrpcTransport, Security};

pub type ResponseStream<T> = BoxStream<'static, Result<T, Status>>;

#[async_trait]
pub trait DiathekeRpc: Send + Sync {
    async fn version(&self, request: Request<proto::Empty>)
    -> Result<proto::VersionResponse, Status>;

    async fn models(&self, request: Request<proto::Empty>) -> Result<proto::ModelsResponse, Status>;

    async fn new_session(
        &self,
        request: Request<proto::NewSessionRequest>,
    ) -> Result<proto::SessionId, Status>;

    async fn start_session(&self, request: Request<proto::SessionId>)
    -> Result<proto::Empty, Status>;

    async fn end_session(&self, request: Request<proto::SessionId>) -> Result<proto::Empty, Status>;

    async fn session_event_stream(
        &self,
        request: Request<proto::SessionId>,
    ) -> Result<ResponseStream<proto::DiathekeEvent>, Status>;

    async fn command_finished(
        &self,
        request: Request<proto::CommandStatus>,
    ) -> Result<proto::Empty, Status>;

    async fn stream_audio_input(
        &self,
        request: Request<ReceiverStream<proto::AudioInput>>,
    ) -> Result<proto::AsrResponse, Status>;

    async fn stream_audio_replies(
        &self,
        request: Request<proto::SessionId>,
    ) -> Result<ResponseStream<proto::AudioReply>, Status>;

    async fn push_text(&self, request: Request<proto::PushTextRequest>)
    -> Result<proto::Empty, Status>;

    async fn set_story(&self, request: Request<proto::SetStoryRequest>)
    -> Result<proto::Empty, Status>;

    async fn stream_asr(
        &self,
        request: Request<ReceiverStream<proto::AsrRequest>>,
    ) -> Result<ResponseStream<proto::AsrResponse>, Status>;

    async fn stream_tts(
        &self,
        request: Request<proto::TtsRequest>,
    ) -> Result<ResponseStream<proto::TtsResponse>, Status>;

    async fn command_and_notify(
        &self,
        request: Request<ReceiverStream<proto::CommandStatusUpdate>>,
    ) -> Result<ResponseStream<proto::CommandToExecute>, Status>;

    /// Releases the underlying channel. Calls issued afterwards fail.
    fn close(&self) {}
}

/// Options attached to every outgoing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub metadata: Vec<(String, String)>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Merges `other` into `self`: a later timeout wins, metadata accumulates.
    pub fn extend(&mut self, other: CallOptions) {
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        self.metadata.extend(other.metadata);
    }

    pub fn apply<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }
        for (key, value) in &self.metadata {
            let parsed = AsciiMetadataKey::from_str(key)
                .ok()
                .zip(AsciiMetadataValue::from_str(value).ok());
            match parsed {
                Some((key, value)) => {
                    request.metadata_mut().append(key, value);
                }
                None => warn!(key = %key, "skipping invalid call metadata"),
            }
        }
        request
    }
}
