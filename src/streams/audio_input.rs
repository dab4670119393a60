use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;
use tracing::debug;

use crate::client::Connection;
use crate::error::{Error, Result};
use crate::proto;
use crate::proto::audio_input::Request as Frame;

const FRAME_QUEUE_DEPTH: usize = 32;

/// Final transcript returned when an audio input stream is finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsrResult {
    pub text: String,
    pub confidence: f64,
}

impl From<proto::AsrResponse> for AsrResult {
    fn from(response: proto::AsrResponse) -> Self {
        Self {
            text: response.text,
            confidence: response.confidence_score,
        }
    }
}

/// Session-scoped audio upload.
///
/// The session id frame is queued when the stream is opened, so every
/// `send_audio` follows it. `finish` consumes the stream, which makes sending
/// after completion impossible.
pub struct AudioInputStream {
    session_id: String,
    frames: mpsc::Sender<proto::AudioInput>,
    call: JoinHandle<std::result::Result<proto::AsrResponse, Status>>,
    sent_bytes: u64,
}

impl AudioInputStream {
    pub(crate) async fn open(conn: &Connection, session_id: &str) -> Result<Self> {
        let (frames, rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let control = proto::AudioInput {
            request: Some(Frame::SessionId(session_id.to_string())),
        };
        frames.send(control).await.map_err(|_| Error::StreamEnded)?;

        let request = conn.request(ReceiverStream::new(rx));
        let rpc = conn.rpc().clone();
        let call = tokio::spawn(async move { rpc.stream_audio_input(request).await });
        debug!(session_id = %session_id, "audio input stream opened");

        Ok(Self {
            session_id: session_id.to_string(),
            frames,
            call,
            sent_bytes: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    /// Queues one chunk of audio. [`Error::StreamEnded`] means the server
    /// stopped listening; call [`finish`](Self::finish) to collect its result.
    pub async fn send_audio(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len() as u64;
        let frame = proto::AudioInput {
            request: Some(Frame::Data(data)),
        };
        self.frames.send(frame).await.map_err(|_| Error::StreamEnded)?;
        self.sent_bytes += len;
        Ok(())
    }

    /// Closes the send side and waits for the server's final result.
    pub async fn finish(self) -> Result<AsrResult> {
        let Self {
            session_id,
            frames,
            call,
            sent_bytes,
        } = self;
        drop(frames);
        let response = call
            .await
            .map_err(|err| Error::task_failed("audio input", err))??;
        debug!(session_id = %session_id, sent_bytes, "audio input finished");
        Ok(response.into())
    }
}
