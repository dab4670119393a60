use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("invalid security options: {0}")]
    InvalidSecurity(String),
    #[error("rpc failed: {0}")]
    Transport(#[from] tonic::Status),
    #[error("connection is closed")]
    Closed,
    #[error("session {0} has already ended")]
    SessionEnded(String),
    /// The server closed the stream. For audio input this means the final
    /// result is ready to be fetched with `finish`.
    #[error("stream ended")]
    StreamEnded,
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("audio resource error: {0}")]
    Resource(String),
    #[error("stream idle for {0:?}")]
    IdleTimeout(Duration),
    /// A background task panicked or was aborted. Nothing went over the wire.
    #[error("{0}")]
    TaskFailed(String),
}

impl Error {
    pub fn is_stream_ended(&self) -> bool {
        matches!(self, Error::StreamEnded)
    }

    pub(crate) fn task_failed(what: &str, err: tokio::task::JoinError) -> Self {
        Error::TaskFailed(format!("{} task failed: {}", what, err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
