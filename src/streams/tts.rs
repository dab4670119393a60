use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Inbound;
use crate::audio::AudioSink;
use crate::client::Connection;
use crate::coordinator::AudioState;
use crate::error::{Error, Result};
use crate::proto;
use crate::proto::audio_reply::OutputMessage;

/// One message of a synthesized reply: the text being spoken, its audio in
/// one or more chunks, then the end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioReplyFrame {
    Announce(String),
    Data(Bytes),
    End,
}

/// Spoken replies for one session.
pub struct AudioReplyStream {
    session_id: String,
    inbound: Inbound<proto::AudioReply>,
}

impl AudioReplyStream {
    pub(crate) async fn open(conn: &Connection, session_id: &str) -> Result<Self> {
        let request = conn.request(proto::SessionId {
            session_id: session_id.to_string(),
        });
        let stream = conn.rpc().stream_audio_replies(request).await?;
        debug!(session_id = %session_id, "audio reply stream opened");
        Ok(Self {
            session_id: session_id.to_string(),
            inbound: Inbound::new(stream, conn.idle_timeout()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn recv(&mut self) -> Result<Option<AudioReplyFrame>> {
        let Some(reply) = self.inbound.next().await? else {
            return Ok(None);
        };
        match reply.output_message {
            Some(OutputMessage::Text(text)) => Ok(Some(AudioReplyFrame::Announce(text))),
            Some(OutputMessage::Data(data)) => Ok(Some(AudioReplyFrame::Data(data))),
            Some(OutputMessage::End(_)) => Ok(Some(AudioReplyFrame::End)),
            None => Err(Error::ProtocolViolation(
                "audio reply carried no payload".to_string(),
            )),
        }
    }
}

/// Model-scoped synthesis of a single text.
pub struct TtsStream {
    inbound: Inbound<proto::TtsResponse>,
}

impl TtsStream {
    pub(crate) async fn open(conn: &Connection, model: &str, text: &str) -> Result<Self> {
        let request = conn.request(proto::TtsRequest {
            model: model.to_string(),
            text: text.to_string(),
        });
        let stream = conn.rpc().stream_tts(request).await?;
        Ok(Self {
            inbound: Inbound::new(stream, conn.idle_timeout()),
        })
    }

    pub async fn recv_audio(&mut self) -> Result<Option<Bytes>> {
        Ok(self.inbound.next().await?.map(|response| response.data))
    }
}

/// Plays a whole synthesis through `sink`, returning the byte count.
pub async fn write_tts_audio<S>(stream: &mut TtsStream, sink: &mut S) -> Result<u64>
where
    S: AudioSink + ?Sized,
{
    sink.start().await?;
    let mut written = 0u64;
    let drained = async {
        while let Some(chunk) = stream.recv_audio().await? {
            sink.write(&chunk).await?;
            written += chunk.len() as u64;
        }
        Ok::<_, Error>(())
    }
    .await;
    let stopped = sink.stop().await;
    drained?;
    stopped?;
    Ok(written)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub replies: u64,
    pub bytes: u64,
}

/// Drives `sink` from a session's reply stream.
///
/// `Announce` marks playback active and starts the sink, each `Data` frame is
/// written as received, `End` stops the sink and clears the flag. Sink
/// failures are logged and the stream keeps draining.
pub async fn play_replies<S>(
    mut stream: AudioReplyStream,
    sink: &mut S,
    state: &AudioState,
    cancel: &CancellationToken,
) -> Result<PlaybackStats>
where
    S: AudioSink + ?Sized,
{
    let mut stats = PlaybackStats::default();
    let mut active = false;
    let outcome = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            next = stream.recv() => next,
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(Error::ProtocolViolation(reason)) => {
                warn!("skipping audio reply: {}", reason);
                continue;
            }
            Err(err) => break Err(err),
        };

        match frame {
            AudioReplyFrame::Announce(text) => {
                info!(session_id = %stream.session_id(), "reply: {}", text);
                state.set_playing(true).await;
                active = true;
                stats.replies += 1;
                if let Err(err) = sink.start().await {
                    warn!("failed to start playback: {}", err);
                }
            }
            AudioReplyFrame::Data(data) => match sink.write(&data).await {
                Ok(()) => stats.bytes += data.len() as u64,
                Err(err) => warn!("failed to play audio: {}", err),
            },
            AudioReplyFrame::End => {
                if let Err(err) = sink.stop().await {
                    warn!("failed to stop playback: {}", err);
                }
                state.set_playing(false).await;
                active = false;
            }
        }
    };

    if active {
        if let Err(err) = sink.stop().await {
            warn!("failed to stop playback: {}", err);
        }
        state.set_playing(false).await;
    }
    outcome.map(|()| stats)
}
