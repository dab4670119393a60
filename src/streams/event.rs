use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Inbound;
use crate::client::{Connection, Session};
use crate::error::{Error, Result};
use crate::proto;
use crate::proto::command_status::StatusCode as ProtoStatusCode;
use crate::proto::diatheke_event::Kind;

/// A request from the dialog model to run an application-defined action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEvent {
    pub command_id: String,
    pub parameters: BTreeMap<String, String>,
    pub command_state_id: String,
}

impl From<proto::CommandEvent> for CommandEvent {
    fn from(event: proto::CommandEvent) -> Self {
        Self {
            command_id: event.command_id,
            parameters: event.parameters,
            command_state_id: event.command_state_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Recognize { text: String, valid_input: bool },
    Reply { text: String },
    Command(CommandEvent),
}

impl TryFrom<proto::DiathekeEvent> for Event {
    type Error = Error;

    fn try_from(event: proto::DiathekeEvent) -> Result<Self> {
        match event.kind {
            Some(Kind::Recognize(recognize)) => Ok(Event::Recognize {
                text: recognize.text,
                valid_input: recognize.valid_input,
            }),
            Some(Kind::Reply(reply)) => Ok(Event::Reply { text: reply.text }),
            Some(Kind::Command(command)) => Ok(Event::Command(command.into())),
            None => Err(Error::ProtocolViolation(
                "event carried no payload".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Success,
    Failure,
}

impl From<StatusCode> for ProtoStatusCode {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Success => ProtoStatusCode::Success,
            StatusCode::Failure => ProtoStatusCode::Failure,
        }
    }
}

/// Completion report for one [`CommandEvent`].
///
/// A status built with [`CommandStatus::for_command`] starts out as a failure
/// carrying the command's parameters as its output; handlers call
/// [`CommandStatus::set_success`] once the action actually ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandStatus {
    pub session_id: String,
    pub command_id: String,
    pub command_state_id: String,
    pub code: StatusCode,
    pub output_parameters: BTreeMap<String, String>,
    pub error_message: String,
}

impl CommandStatus {
    pub fn for_command(session_id: &str, command: &CommandEvent) -> Self {
        Self {
            session_id: session_id.to_string(),
            command_id: command.command_id.clone(),
            command_state_id: command.command_state_id.clone(),
            code: StatusCode::Failure,
            output_parameters: command.parameters.clone(),
            error_message: String::new(),
        }
    }

    pub fn set_success(&mut self) {
        self.code = StatusCode::Success;
        self.error_message.clear();
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.code = StatusCode::Failure;
        self.error_message = message.into();
    }

    pub fn set_string_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.output_parameters.insert(key.into(), value.into());
    }

    pub fn set_int_param(&mut self, key: impl Into<String>, value: i64) {
        self.output_parameters.insert(key.into(), value.to_string());
    }

    pub fn set_double_param(&mut self, key: impl Into<String>, value: f64) {
        self.output_parameters.insert(key.into(), value.to_string());
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }

    pub(crate) fn into_proto(self) -> proto::CommandStatus {
        proto::CommandStatus {
            session_id: self.session_id,
            command_id: self.command_id,
            return_status: ProtoStatusCode::from(self.code) as i32,
            output_parameters: self.output_parameters,
            error_message_text: self.error_message,
            command_state_id: self.command_state_id,
        }
    }

    pub(crate) fn into_update(self) -> proto::CommandStatusUpdate {
        proto::CommandStatusUpdate {
            command_id: self.command_id,
            session_id: self.session_id,
            return_status: ProtoStatusCode::from(self.code) as i32,
            output_parameters: self.output_parameters,
            error_message_text: self.error_message,
        }
    }
}

/// Server-to-client event stream for one session.
pub struct EventStream {
    session_id: String,
    inbound: Inbound<proto::DiathekeEvent>,
}

impl EventStream {
    pub(crate) async fn open(conn: &Connection, session_id: &str) -> Result<Self> {
        let request = conn.request(proto::SessionId {
            session_id: session_id.to_string(),
        });
        let stream = conn.rpc().session_event_stream(request).await?;
        debug!(session_id = %session_id, "event stream opened");
        Ok(Self {
            session_id: session_id.to_string(),
            inbound: Inbound::new(stream, conn.idle_timeout()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event, or `None` once the server has closed the stream.
    pub async fn recv(&mut self) -> Result<Option<Event>> {
        match self.inbound.next().await? {
            Some(event) => Event::try_from(event).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send {
    async fn on_recognize(&mut self, _text: &str, _valid_input: bool) {}

    async fn on_reply(&mut self, _text: &str) {}

    /// Runs the command and returns its completion. `status` arrives
    /// pre-filled for this command; the returned value is sent back to the
    /// server exactly once.
    async fn on_command(&mut self, command: &CommandEvent, status: CommandStatus)
    -> CommandStatus;
}

/// Drives `stream` until the server closes it, `cancel` fires, or a receive
/// fails. Every command event is acknowledged with the handler's status.
pub async fn run_event_loop<H>(
    session: &Session,
    mut stream: EventStream,
    handler: &mut H,
    cancel: &CancellationToken,
) -> Result<()>
where
    H: EventHandler + ?Sized,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session_id = %session.id(), "event loop cancelled");
                return Ok(());
            }
            next = stream.recv() => next,
        };

        let event = match next {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!(session_id = %session.id(), "event stream ended");
                return Ok(());
            }
            Err(Error::ProtocolViolation(reason)) => {
                warn!(session_id = %session.id(), "skipping event: {}", reason);
                continue;
            }
            Err(err) => {
                error!(session_id = %session.id(), "event stream failed: {}", err);
                return Err(err);
            }
        };

        match event {
            Event::Recognize { text, valid_input } => {
                handler.on_recognize(&text, valid_input).await;
            }
            Event::Reply { text } => handler.on_reply(&text).await,
            Event::Command(command) => {
                let draft = CommandStatus::for_command(session.id(), &command);
                let mut status = handler.on_command(&command, draft).await;
                // Correlation ids always come from the event.
                status.session_id = session.id().to_string();
                status.command_id = command.command_id.clone();
                status.command_state_id = command.command_state_id.clone();
                debug!(
                    command_id = %status.command_id,
                    success = status.is_success(),
                    "acknowledging command"
                );
                if let Err(err) = session.command_finished(status).await {
                    warn!(command_id = %command.command_id, "command ack failed: {}", err);
                }
            }
        }
    }
}
