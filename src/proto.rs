//! Protobuf messages and the gRPC stub for `cobaltspeech.diatheke.Diatheke`.
//!
//! Written by hand. Field tags run 1..n in declaration order and have not
//! been checked against a server descriptor.

use std::collections::BTreeMap;

use prost::bytes::Bytes;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VersionResponse {
    #[prost(string, tag = "1")]
    pub server: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelsResponse {
    #[prost(string, repeated, tag = "1")]
    pub models: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NewSessionRequest {
    #[prost(string, tag = "1")]
    pub model: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionId {
    #[prost(string, tag = "1")]
    pub session_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiathekeEvent {
    #[prost(oneof = "diatheke_event::Kind", tags = "1, 2, 3")]
    pub kind: Option<diatheke_event::Kind>,
}

pub mod diatheke_event {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Recognize(super::RecognizeEvent),
        #[prost(message, tag = "2")]
        Reply(super::ReplyEvent),
        #[prost(message, tag = "3")]
        Command(super::CommandEvent),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecognizeEvent {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(bool, tag = "2")]
    pub valid_input: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReplyEvent {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandEvent {
    #[prost(string, tag = "1")]
    pub command_id: String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub parameters: BTreeMap<String, String>,
    #[prost(string, tag = "3")]
    pub command_state_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandStatus {
    #[prost(string, tag = "1")]
    pub session_id: String,
    #[prost(string, tag = "2")]
    pub command_id: String,
    #[prost(enumeration = "command_status::StatusCode", tag = "3")]
    pub return_status: i32,
    #[prost(btree_map = "string, string", tag = "4")]
    pub output_parameters: BTreeMap<String, String>,
    #[prost(string, tag = "5")]
    pub error_message_text: String,
    #[prost(string, tag = "6")]
    pub command_state_id: String,
}

pub mod command_status {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum StatusCode {
        Success = 0,
        Failure = 1,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioInput {
    #[prost(oneof = "audio_input::Request", tags = "1, 2")]
    pub request: Option<audio_input::Request>,
}

pub mod audio_input {
    use prost::bytes::Bytes;

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Request {
        #[prost(string, tag = "1")]
        SessionId(String),
        #[prost(bytes = "bytes", tag = "2")]
        Data(Bytes),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioReply {
    #[prost(oneof = "audio_reply::OutputMessage", tags = "1, 2, 3")]
    pub output_message: Option<audio_reply::OutputMessage>,
}

pub mod audio_reply {
    use prost::bytes::Bytes;

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum OutputMessage {
        #[prost(string, tag = "1")]
        Text(String),
        #[prost(bytes = "bytes", tag = "2")]
        Data(Bytes),
        #[prost(message, tag = "3")]
        End(super::Empty),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushTextRequest {
    #[prost(string, tag = "1")]
    pub session_id: String,
    #[prost(string, tag = "2")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetStoryRequest {
    #[prost(string, tag = "1")]
    pub session_id: String,
    #[prost(string, tag = "2")]
    pub story_id: String,
    #[prost(btree_map = "string, string", tag = "3")]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsrRequest {
    #[prost(oneof = "asr_request::AsrData", tags = "1, 2")]
    pub asr_data: Option<asr_request::AsrData>,
}

pub mod asr_request {
    use prost::bytes::Bytes;

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum AsrData {
        #[prost(string, tag = "1")]
        Model(String),
        #[prost(bytes = "bytes", tag = "2")]
        Audio(Bytes),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsrResponse {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(double, tag = "2")]
    pub confidence_score: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TtsRequest {
    #[prost(string, tag = "1")]
    pub model: String,
    #[prost(string, tag = "2")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TtsResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub data: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandToExecute {
    #[prost(string, tag = "1")]
    pub command_id: String,
    #[prost(string, tag = "2")]
    pub session_id: String,
    #[prost(btree_map = "string, string", tag = "3")]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandStatusUpdate {
    #[prost(string, tag = "1")]
    pub command_id: String,
    #[prost(string, tag = "2")]
    pub session_id: String,
    #[prost(enumeration = "command_status::StatusCode", tag = "3")]
    pub return_status: i32,
    #[prost(btree_map = "string, string", tag = "4")]
    pub output_parameters: BTreeMap<String, String>,
    #[prost(string, tag = "5")]
    pub error_message_text: String,
}

pub mod diatheke_client {
    use tonic::codec::{ProstCodec, Streaming};
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::transport::Channel;
    use tonic::{IntoRequest, IntoStreamingRequest, Response, Status};

    /// Typed stub over a tonic channel. Cloning is cheap and clones share the
    /// underlying connection.
    #[derive(Debug, Clone)]
    pub struct DiathekeClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl DiathekeClient {
        pub fn new(channel: Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        async fn ready(&mut self) -> Result<(), Status> {
            self.inner
                .ready()
                .await
                .map_err(|err| Status::unknown(format!("service was not ready: {}", err)))
        }

        pub async fn version(
            &mut self,
            request: impl IntoRequest<super::Empty>,
        ) -> Result<Response<super::VersionResponse>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/Version");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn models(
            &mut self,
            request: impl IntoRequest<super::Empty>,
        ) -> Result<Response<super::ModelsResponse>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/Models");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn new_session(
            &mut self,
            request: impl IntoRequest<super::NewSessionRequest>,
        ) -> Result<Response<super::SessionId>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/NewSession");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn start_session(
            &mut self,
            request: impl IntoRequest<super::SessionId>,
        ) -> Result<Response<super::Empty>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/StartSession");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn end_session(
            &mut self,
            request: impl IntoRequest<super::SessionId>,
        ) -> Result<Response<super::Empty>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/EndSession");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn session_event_stream(
            &mut self,
            request: impl IntoRequest<super::SessionId>,
        ) -> Result<Response<Streaming<super::DiathekeEvent>>, Status> {
            self.ready().await?;
            let path =
                PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/SessionEventStream");
            self.inner
                .server_streaming(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn command_finished(
            &mut self,
            request: impl IntoRequest<super::CommandStatus>,
        ) -> Result<Response<super::Empty>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/CommandFinished");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn stream_audio_input(
            &mut self,
            request: impl IntoStreamingRequest<Message = super::AudioInput>,
        ) -> Result<Response<super::AsrResponse>, Status> {
            self.ready().await?;
            let path =
                PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/StreamAudioInput");
            self.inner
                .client_streaming(request.into_streaming_request(), path, ProstCodec::default())
                .await
        }

        pub async fn stream_audio_replies(
            &mut self,
            request: impl IntoRequest<super::SessionId>,
        ) -> Result<Response<Streaming<super::AudioReply>>, Status> {
            self.ready().await?;
            let path =
                PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/StreamAudioReplies");
            self.inner
                .server_streaming(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn push_text(
            &mut self,
            request: impl IntoRequest<super::PushTextRequest>,
        ) -> Result<Response<super::Empty>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/PushText");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn set_story(
            &mut self,
            request: impl IntoRequest<super::SetStoryRequest>,
        ) -> Result<Response<super::Empty>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/SetStory");
            self.inner
                .unary(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn stream_asr(
            &mut self,
            request: impl IntoStreamingRequest<Message = super::AsrRequest>,
        ) -> Result<Response<Streaming<super::AsrResponse>>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/StreamASR");
            self.inner
                .streaming(request.into_streaming_request(), path, ProstCodec::default())
                .await
        }

        pub async fn stream_tts(
            &mut self,
            request: impl IntoRequest<super::TtsRequest>,
        ) -> Result<Response<Streaming<super::TtsResponse>>, Status> {
            self.ready().await?;
            let path = PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/StreamTTS");
            self.inner
                .server_streaming(request.into_request(), path, ProstCodec::default())
                .await
        }

        pub async fn command_and_notify(
            &mut self,
            request: impl IntoStreamingRequest<Message = super::CommandStatusUpdate>,
        ) -> Result<Response<Streaming<super::CommandToExecute>>, Status> {
            self.ready().await?;
            let path =
                PathAndQuery::from_static("/cobaltspeech.diatheke.Diatheke/CommandAndNotify");
            self.inner
                .streaming(request.into_streaming_request(), path, ProstCodec::default())
                .await
        }
    }
}
