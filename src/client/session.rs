use std::collections::BTreeMap;

use super::Connection;
use crate::error::Result;
use crate::streams::audio_input::AudioInputStream;
use crate::streams::event::{CommandStatus, EventStream};
use crate::streams::tts::AudioReplyStream;

/// A server-side dialog session bound to the connection that created it.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    conn: Connection,
}

impl Session {
    pub(crate) fn new(id: String, conn: Connection) -> Self {
        Self { id, conn }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begins running the dialog model. Events emitted before the event
    /// stream is attached are lost, so open streams before starting.
    pub async fn start(&self) -> Result<()> {
        self.conn.start_session(&self.id).await
    }

    pub async fn end(self) -> Result<()> {
        self.conn.end_session(&self.id).await
    }

    pub async fn push_text(&self, text: &str) -> Result<()> {
        self.conn.push_text(&self.id, text).await
    }

    pub async fn set_story(
        &self,
        story_id: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<()> {
        self.conn.set_story(&self.id, story_id, parameters).await
    }

    pub async fn event_stream(&self) -> Result<EventStream> {
        self.conn.session_event_stream(&self.id).await
    }

    pub async fn command_finished(&self, status: CommandStatus) -> Result<()> {
        self.conn.command_finished(status).await
    }

    pub async fn stream_audio_input(&self) -> Result<AudioInputStream> {
        self.conn.stream_audio_input(&self.id).await
    }

    pub async fn stream_audio_replies(&self) -> Result<AudioReplyStream> {
        self.conn.stream_audio_replies(&self.id).await
    }
}
