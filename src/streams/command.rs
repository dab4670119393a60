use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::Inbound;
use super::event::{CommandEvent, CommandStatus};
use crate::client::Connection;
use crate::error::{Error, Result};
use crate::proto;

const UPDATE_QUEUE_DEPTH: usize = 16;

/// A command pushed by the server outside of any event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToExecute {
    pub command_id: String,
    pub session_id: String,
    pub parameters: BTreeMap<String, String>,
}

impl CommandToExecute {
    /// Failure status for this command with its parameters copied over.
    pub fn status(&self) -> CommandStatus {
        let event = CommandEvent {
            command_id: self.command_id.clone(),
            parameters: self.parameters.clone(),
            command_state_id: String::new(),
        };
        CommandStatus::for_command(&self.session_id, &event)
    }
}

impl From<proto::CommandToExecute> for CommandToExecute {
    fn from(command: proto::CommandToExecute) -> Self {
        Self {
            command_id: command.command_id,
            session_id: command.session_id,
            parameters: command.parameters,
        }
    }
}

pub struct CommandNotifier {
    updates: mpsc::Sender<proto::CommandStatusUpdate>,
}

pub struct CommandReceiver {
    inbound: Inbound<proto::CommandToExecute>,
}

pub(crate) async fn open(conn: &Connection) -> Result<(CommandNotifier, CommandReceiver)> {
    let (updates, rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
    let request = conn.request(ReceiverStream::new(rx));
    let stream = conn.rpc().command_and_notify(request).await?;
    debug!("command stream opened");
    Ok((
        CommandNotifier { updates },
        CommandReceiver {
            inbound: Inbound::new(stream, conn.idle_timeout()),
        },
    ))
}

impl CommandNotifier {
    pub async fn notify(&mut self, status: CommandStatus) -> Result<()> {
        self.updates
            .send(status.into_update())
            .await
            .map_err(|_| Error::StreamEnded)
    }
}

impl CommandReceiver {
    pub async fn recv(&mut self) -> Result<Option<CommandToExecute>> {
        Ok(self.inbound.next().await?.map(CommandToExecute::from))
    }
}
