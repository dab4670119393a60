use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Inbound;
use super::audio_input::AsrResult;
use crate::audio::AudioSource;
use crate::client::Connection;
use crate::error::{Error, Result};
use crate::proto;
use crate::proto::asr_request::AsrData;

const FRAME_QUEUE_DEPTH: usize = 32;
const READ_BUFFER_BYTES: usize = 8192;

/// Send half of a model-scoped recognition stream. The model frame is
/// already queued, so only audio can be sent.
pub struct AsrSender {
    frames: mpsc::Sender<proto::AsrRequest>,
}

/// Receive half of a model-scoped recognition stream.
pub struct AsrReceiver {
    inbound: Inbound<proto::AsrResponse>,
}

pub(crate) async fn open(conn: &Connection, model: &str) -> Result<(AsrSender, AsrReceiver)> {
    let (frames, rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    let control = proto::AsrRequest {
        asr_data: Some(AsrData::Model(model.to_string())),
    };
    frames.send(control).await.map_err(|_| Error::StreamEnded)?;

    let request = conn.request(ReceiverStream::new(rx));
    let stream = conn.rpc().stream_asr(request).await?;
    debug!(model = %model, "asr stream opened");
    Ok((
        AsrSender { frames },
        AsrReceiver {
            inbound: Inbound::new(stream, conn.idle_timeout()),
        },
    ))
}

impl AsrSender {
    pub async fn send_audio(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        if data.is_empty() {
            return Ok(());
        }
        let frame = proto::AsrRequest {
            asr_data: Some(AsrData::Audio(data)),
        };
        self.frames.send(frame).await.map_err(|_| Error::StreamEnded)
    }

    /// Signals end of audio. Remaining transcripts keep arriving on the
    /// receiver until the server closes the stream.
    pub fn audio_finished(self) {
        debug!("asr audio finished");
    }
}

impl AsrReceiver {
    pub async fn recv(&mut self) -> Result<Option<AsrResult>> {
        Ok(self.inbound.next().await?.map(AsrResult::from))
    }
}

/// Copies `source` into `sender` until the source is exhausted, the server
/// stops listening, or `cancel` fires. The sender is finished afterwards.
/// Returns the number of bytes sent.
pub async fn stream_audio_from<S>(
    source: &mut S,
    mut sender: AsrSender,
    cancel: &CancellationToken,
) -> Result<u64>
where
    S: AudioSource + ?Sized,
{
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    let mut sent = 0u64;
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => break,
            read = source.read(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = sender.send_audio(Bytes::copy_from_slice(&buf[..n])) => outcome,
        };
        match outcome {
            Ok(()) => sent += n as u64,
            Err(Error::StreamEnded) => {
                warn!("asr stream closed by server");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    sender.audio_finished();
    Ok(sent)
}
