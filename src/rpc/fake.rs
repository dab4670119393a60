//! Scripted in-process stand-in for the Diatheke server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Status};

use super::{DiathekeRpc, ResponseStream};
use crate::proto;
use crate::proto::{asr_request, audio_input};

/// Everything the fake observed from the client.
#[derive(Debug, Default)]
pub(crate) struct Recorded {
    pub models_requested: Vec<String>,
    pub started: Vec<String>,
    pub ended: Vec<String>,
    pub pushed_text: Vec<(String, String)>,
    pub stories: Vec<(String, String, BTreeMap<String, String>)>,
    pub statuses: Vec<proto::CommandStatus>,
    pub audio_session: Option<String>,
    pub audio_frames: Vec<Bytes>,
    pub asr_model: Option<String>,
    pub tts_requests: Vec<(String, String)>,
    pub status_updates: Vec<proto::CommandStatusUpdate>,
    pub metadata: Vec<(String, String)>,
    pub call_log: Vec<&'static str>,
}

#[derive(Default)]
pub(crate) struct FakeDiatheke {
    pub recorded: Arc<Mutex<Recorded>>,
    events: Vec<proto::DiathekeEvent>,
    replies: Vec<proto::AudioReply>,
    tts_chunks: Vec<Bytes>,
    commands: Vec<proto::CommandToExecute>,
    hang_events: bool,
    audio_frame_limit: Option<usize>,
    failing_ack: Option<String>,
    next_session: AtomicUsize,
}

impl FakeDiatheke {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: Vec<proto::DiathekeEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_replies(mut self, replies: Vec<proto::AudioReply>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_tts_chunks(mut self, chunks: Vec<Bytes>) -> Self {
        self.tts_chunks = chunks;
        self
    }

    pub fn with_commands(mut self, commands: Vec<proto::CommandToExecute>) -> Self {
        self.commands = commands;
        self
    }

    /// The event stream never yields and never ends.
    pub fn hanging_events(mut self) -> Self {
        self.hang_events = true;
        self
    }

    /// Stops reading audio input after `limit` data frames and replies early.
    pub fn audio_frame_limit(mut self, limit: usize) -> Self {
        self.audio_frame_limit = Some(limit);
        self
    }

    pub fn failing_ack_for(mut self, command_id: &str) -> Self {
        self.failing_ack = Some(command_id.to_string());
        self
    }

    pub fn recorded(&self) -> Arc<Mutex<Recorded>> {
        self.recorded.clone()
    }

    fn record_metadata<T>(&self, request: &Request<T>) {
        let mut recorded = self.recorded.lock().unwrap();
        for entry in request.metadata().iter() {
            if let tonic::metadata::KeyAndValueRef::Ascii(key, value) = entry {
                if let Ok(value) = value.to_str() {
                    recorded
                        .metadata
                        .push((key.as_str().to_string(), value.to_string()));
                }
            }
        }
    }
}

pub(crate) fn recognize(text: &str, valid_input: bool) -> proto::DiathekeEvent {
    proto::DiathekeEvent {
        kind: Some(proto::diatheke_event::Kind::Recognize(proto::RecognizeEvent {
            text: text.to_string(),
            valid_input,
        })),
    }
}

pub(crate) fn reply(text: &str) -> proto::DiathekeEvent {
    proto::DiathekeEvent {
        kind: Some(proto::diatheke_event::Kind::Reply(proto::ReplyEvent {
            text: text.to_string(),
        })),
    }
}

pub(crate) fn command(id: &str, state_id: &str, params: &[(&str, &str)]) -> proto::DiathekeEvent {
    proto::DiathekeEvent {
        kind: Some(proto::diatheke_event::Kind::Command(proto::CommandEvent {
            command_id: id.to_string(),
            parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            command_state_id: state_id.to_string(),
        })),
    }
}

fn iter_stream<T: Send + 'static>(items: Vec<T>) -> ResponseStream<T> {
    stream::iter(items.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl DiathekeRpc for FakeDiatheke {
    async fn version(
        &self,
        request: Request<proto::Empty>,
    ) -> Result<proto::VersionResponse, Status> {
        self.record_metadata(&request);
        Ok(proto::VersionResponse {
            server: "fake-diatheke 1.0".to_string(),
        })
    }

    async fn models(&self, _request: Request<proto::Empty>) -> Result<proto::ModelsResponse, Status> {
        Ok(proto::ModelsResponse {
            models: vec!["demo-model".to_string(), "other-model".to_string()],
        })
    }

    async fn new_session(
        &self,
        request: Request<proto::NewSessionRequest>,
    ) -> Result<proto::SessionId, Status> {
        let model = request.into_inner().model;
        if model.is_empty() {
            return Err(Status::invalid_argument("model is required"));
        }
        self.recorded.lock().unwrap().models_requested.push(model);
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        Ok(proto::SessionId {
            session_id: format!("session-{}", n + 1),
        })
    }

    async fn start_session(&self, request: Request<proto::SessionId>) -> Result<proto::Empty, Status> {
        let id = request.into_inner().session_id;
        let mut recorded = self.recorded.lock().unwrap();
        recorded.call_log.push("start_session");
        recorded.started.push(id);
        Ok(proto::Empty {})
    }

    async fn end_session(&self, request: Request<proto::SessionId>) -> Result<proto::Empty, Status> {
        let id = request.into_inner().session_id;
        let mut recorded = self.recorded.lock().unwrap();
        if recorded.ended.contains(&id) {
            return Err(Status::not_found(format!("unknown session {}", id)));
        }
        recorded.ended.push(id);
        Ok(proto::Empty {})
    }

    async fn session_event_stream(
        &self,
        _request: Request<proto::SessionId>,
    ) -> Result<ResponseStream<proto::DiathekeEvent>, Status> {
        self.recorded.lock().unwrap().call_log.push("session_event_stream");
        if self.hang_events {
            return Ok(stream::pending().boxed());
        }
        Ok(iter_stream(self.events.clone()))
    }

    async fn command_finished(
        &self,
        request: Request<proto::CommandStatus>,
    ) -> Result<proto::Empty, Status> {
        let status = request.into_inner();
        let fail = self.failing_ack.as_deref() == Some(status.command_id.as_str());
        self.recorded.lock().unwrap().statuses.push(status);
        if fail {
            return Err(Status::internal("ack rejected"));
        }
        Ok(proto::Empty {})
    }

    async fn stream_audio_input(
        &self,
        request: Request<ReceiverStream<proto::AudioInput>>,
    ) -> Result<proto::AsrResponse, Status> {
        let mut frames = request.into_inner();
        match frames.next().await.and_then(|frame| frame.request) {
            Some(audio_input::Request::SessionId(id)) => {
                self.recorded.lock().unwrap().audio_session = Some(id);
            }
            _ => return Err(Status::invalid_argument("session id must be sent first")),
        }

        let mut total = 0usize;
        let mut count = 0usize;
        while let Some(frame) = frames.next().await {
            match frame.request {
                Some(audio_input::Request::Data(data)) => {
                    total += data.len();
                    count += 1;
                    self.recorded.lock().unwrap().audio_frames.push(data);
                }
                _ => return Err(Status::invalid_argument("expected audio data")),
            }
            if self.audio_frame_limit.is_some_and(|limit| count >= limit) {
                break;
            }
        }
        Ok(proto::AsrResponse {
            text: format!("{} bytes", total),
            confidence_score: 1.0,
        })
    }

    async fn stream_audio_replies(
        &self,
        _request: Request<proto::SessionId>,
    ) -> Result<ResponseStream<proto::AudioReply>, Status> {
        self.recorded.lock().unwrap().call_log.push("stream_audio_replies");
        Ok(iter_stream(self.replies.clone()))
    }

    async fn push_text(&self, request: Request<proto::PushTextRequest>) -> Result<proto::Empty, Status> {
        let request = request.into_inner();
        self.recorded
            .lock()
            .unwrap()
            .pushed_text
            .push((request.session_id, request.text));
        Ok(proto::Empty {})
    }

    async fn set_story(&self, request: Request<proto::SetStoryRequest>) -> Result<proto::Empty, Status> {
        let request = request.into_inner();
        self.recorded
            .lock()
            .unwrap()
            .stories
            .push((request.session_id, request.story_id, request.parameters));
        Ok(proto::Empty {})
    }

    async fn stream_asr(
        &self,
        request: Request<ReceiverStream<proto::AsrRequest>>,
    ) -> Result<ResponseStream<proto::AsrResponse>, Status> {
        let mut frames = request.into_inner();
        let recorded = self.recorded.clone();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            match frames.next().await.and_then(|frame| frame.asr_data) {
                Some(asr_request::AsrData::Model(model)) => {
                    recorded.lock().unwrap().asr_model = Some(model);
                }
                _ => {
                    let _ = tx
                        .send(Err(Status::invalid_argument("model must be sent first")))
                        .await;
                    return;
                }
            }
            let mut total = 0usize;
            while let Some(frame) = frames.next().await {
                if let Some(asr_request::AsrData::Audio(audio)) = frame.asr_data {
                    total += audio.len();
                    let result = proto::AsrResponse {
                        text: format!("{} bytes", total),
                        confidence_score: 0.5,
                    };
                    if tx.send(Ok(result)).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn stream_tts(
        &self,
        request: Request<proto::TtsRequest>,
    ) -> Result<ResponseStream<proto::TtsResponse>, Status> {
        let request = request.into_inner();
        self.recorded
            .lock()
            .unwrap()
            .tts_requests
            .push((request.model, request.text));
        let chunks = self
            .tts_chunks
            .iter()
            .cloned()
            .map(|data| proto::TtsResponse { data })
            .collect();
        Ok(iter_stream(chunks))
    }

    async fn command_and_notify(
        &self,
        request: Request<ReceiverStream<proto::CommandStatusUpdate>>,
    ) -> Result<ResponseStream<proto::CommandToExecute>, Status> {
        let mut updates = request.into_inner();
        let recorded = self.recorded.clone();
        let (tx, rx) = mpsc::channel(16);
        let commands = self.commands.clone();
        tokio::spawn(async move {
            for command in commands {
                if tx.send(Ok(command)).await.is_err() {
                    return;
                }
                match updates.next().await {
                    Some(update) => recorded.lock().unwrap().status_updates.push(update),
                    None => return,
                }
            }
        });
        Ok(ReceiverStream::new(rx).boxed())
    }
}
