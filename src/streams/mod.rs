pub mod asr;
pub mod audio_input;
pub mod command;
pub mod event;
pub mod tts;

use std::time::Duration;

use futures_util::StreamExt;
use tonic::Code;

use crate::error::{Error, Result};
use crate::rpc::ResponseStream;

/// Receive half shared by every server-to-client stream.
///
/// `Ok(None)` is graceful termination: either the server closed the stream
/// or the call was cancelled. Any other status is an error for this stream.
pub(crate) struct Inbound<T> {
    stream: ResponseStream<T>,
    idle_timeout: Option<Duration>,
}

impl<T> Inbound<T> {
    pub(crate) fn new(stream: ResponseStream<T>, idle_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            idle_timeout,
        }
    }

    pub(crate) async fn next(&mut self) -> Result<Option<T>> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream.next())
                .await
                .map_err(|_| Error::IdleTimeout(limit))?,
            None => self.stream.next().await,
        };
        match next {
            None => Ok(None),
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(status)) if status.code() == Code::Cancelled => Ok(None),
            Some(Err(status)) => Err(Error::Transport(status)),
        }
    }
}
