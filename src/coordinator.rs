//! Runs one voice session: the event loop, spoken reply playback, and
//! push-to-talk recording, all under one cancellation scope.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{RwLock, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{AudioSink, AudioSource};
use crate::client::Session;
use crate::error::{Error, Result};
use crate::streams::audio_input::{AsrResult, AudioInputStream};
use crate::streams::event::{EventHandler, run_event_loop};
use crate::streams::tts::play_replies;

const READ_BUFFER_BYTES: usize = 8192;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioFlags {
    pub recording: bool,
    pub playing: bool,
}

/// Recording and playback flags shared by the record loop, the reply player
/// and whoever toggles recording. While `playing` is set, captured audio is
/// read and thrown away.
#[derive(Debug)]
pub struct AudioState {
    flags: RwLock<AudioFlags>,
    changes: watch::Sender<AudioFlags>,
}

impl Default for AudioState {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioState {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(AudioFlags::default());
        Self {
            flags: RwLock::new(AudioFlags::default()),
            changes,
        }
    }

    pub async fn recording(&self) -> bool {
        self.flags.read().await.recording
    }

    pub async fn playing(&self) -> bool {
        self.flags.read().await.playing
    }

    pub async fn set_recording(&self, on: bool) {
        let mut flags = self.flags.write().await;
        flags.recording = on;
        self.changes.send_replace(*flags);
    }

    pub async fn set_playing(&self, on: bool) {
        let mut flags = self.flags.write().await;
        flags.playing = on;
        self.changes.send_replace(*flags);
    }

    pub fn subscribe(&self) -> watch::Receiver<AudioFlags> {
        self.changes.subscribe()
    }
}

/// Destination for captured audio.
#[async_trait]
pub trait AudioUplink: Send {
    async fn send_audio(&mut self, data: Bytes) -> Result<()>;
}

#[async_trait]
impl AudioUplink for AudioInputStream {
    async fn send_audio(&mut self, data: Bytes) -> Result<()> {
        AudioInputStream::send_audio(self, data).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub forwarded_bytes: u64,
    pub discarded_bytes: u64,
    pub frames: u64,
}

async fn recording_stopped(changes: &mut watch::Receiver<AudioFlags>) {
    let _ = changes.wait_for(|flags| !flags.recording).await;
}

/// Moves audio from `source` to `uplink` while recording is on.
///
/// Stops when recording is switched off, `cancel` fires, the source runs
/// dry, or the uplink reports the stream ended. Both the read and the send
/// are abandoned as soon as recording stops or `cancel` fires. Reads made
/// while `playing` is set are counted as discarded and never forwarded.
pub async fn pump_audio<S, U>(
    source: &mut S,
    uplink: &mut U,
    state: &AudioState,
    cancel: &CancellationToken,
) -> Result<PumpStats>
where
    S: AudioSource + ?Sized,
    U: AudioUplink + ?Sized,
{
    let mut changes = state.subscribe();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    let mut stats = PumpStats::default();

    while state.recording().await {
        let n = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = recording_stopped(&mut changes) => break,
            read = source.read(&mut buf) => read?,
        };
        if n == 0 {
            debug!("audio source exhausted");
            break;
        }
        if state.playing().await {
            stats.discarded_bytes += n as u64;
            continue;
        }
        // A stalled uplink must not hold off a toggle or a cancel.
        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = recording_stopped(&mut changes) => break,
            sent = uplink.send_audio(Bytes::copy_from_slice(&buf[..n])) => sent,
        };
        match sent {
            Ok(()) => {
                stats.forwarded_bytes += n as u64;
                stats.frames += 1;
            }
            Err(Error::StreamEnded) => {
                debug!("audio uplink closed by server");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(stats)
}

/// Result of one push-to-talk turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub stats: PumpStats,
    pub result: AsrResult,
}

type RecordTask = JoinHandle<(Box<dyn AudioSource>, Result<RecordOutcome>)>;

async fn record(
    mut source: Box<dyn AudioSource>,
    stream: AudioInputStream,
    state: Arc<AudioState>,
    cancel: CancellationToken,
) -> (Box<dyn AudioSource>, Result<RecordOutcome>) {
    let outcome = record_turn(source.as_mut(), stream, &state, &cancel).await;
    (source, outcome)
}

/// Runs one turn on a source that is already started, and stops it.
async fn record_turn(
    source: &mut dyn AudioSource,
    mut stream: AudioInputStream,
    state: &AudioState,
    cancel: &CancellationToken,
) -> Result<RecordOutcome> {
    let pumped = pump_audio(source, &mut stream, state, cancel).await;
    if let Err(err) = source.stop().await {
        warn!("failed to stop audio source: {}", err);
    }
    // Finish even after a failed pump so the server can release the stream.
    let finished = stream.finish().await;
    let stats = pumped?;
    let result = finished?;
    Ok(RecordOutcome { stats, result })
}

/// Owns the per-session tasks of a voice dialog.
///
/// Streams must be attached before [`SessionManager::start`] so no early
/// event or reply is lost. [`SessionManager::shutdown`] cancels everything,
/// waits for the tasks, and hands the session back so it can be ended.
pub struct SessionManager {
    session: Session,
    state: Arc<AudioState>,
    cancel: CancellationToken,
    tasks: JoinSet<Result<()>>,
    source: Option<Box<dyn AudioSource>>,
    recording: Option<RecordTask>,
}

impl SessionManager {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: Arc::new(AudioState::new()),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            source: None,
            recording: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn AudioSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> Arc<AudioState> {
        self.state.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn start_event_stream(&mut self, mut handler: Box<dyn EventHandler>) -> Result<()> {
        let stream = self.session.event_stream().await?;
        let session = self.session.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            run_event_loop(&session, stream, handler.as_mut(), &cancel).await
        });
        Ok(())
    }

    pub async fn start_reply_playback(&mut self, mut sink: Box<dyn AudioSink>) -> Result<()> {
        let stream = self.session.stream_audio_replies().await?;
        let state = self.state.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let stats = play_replies(stream, sink.as_mut(), &state, &cancel).await?;
            info!(replies = stats.replies, bytes = stats.bytes, "reply playback finished");
            Ok(())
        });
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.session.start().await
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Flips push-to-talk. Returns the finished turn when recording stops.
    pub async fn toggle_recording(&mut self) -> Result<Option<RecordOutcome>> {
        if self.is_recording() {
            self.stop_recording().await
        } else {
            self.start_recording().await.map(|()| None)
        }
    }

    pub async fn start_recording(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Ok(());
        }
        let mut source = self
            .source
            .take()
            .ok_or_else(|| Error::Resource("no audio source configured".to_string()))?;
        if let Err(err) = source.start().await {
            self.source = Some(source);
            return Err(err);
        }
        let stream = match self.session.stream_audio_input().await {
            Ok(stream) => stream,
            Err(err) => {
                if let Err(stop_err) = source.stop().await {
                    warn!("failed to stop audio source: {}", stop_err);
                }
                self.source = Some(source);
                return Err(err);
            }
        };
        self.state.set_recording(true).await;
        self.recording = Some(tokio::spawn(record(
            source,
            stream,
            self.state.clone(),
            self.cancel.child_token(),
        )));
        info!(session_id = %self.session.id(), "recording started");
        Ok(())
    }

    pub async fn stop_recording(&mut self) -> Result<Option<RecordOutcome>> {
        self.state.set_recording(false).await;
        let Some(task) = self.recording.take() else {
            return Ok(None);
        };
        let (source, outcome) = task
            .await
            .map_err(|err| Error::task_failed("recording", err))?;
        self.source = Some(source);
        info!(session_id = %self.session.id(), "recording stopped");
        outcome.map(Some)
    }

    /// Waits for the next stream task to finish. `None` when none are left.
    pub async fn next_finished(&mut self) -> Option<Result<()>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.map_err(|err| Error::task_failed("stream", err)).and_then(|r| r))
    }

    pub async fn shutdown(mut self) -> Session {
        self.cancel.cancel();
        if let Err(err) = self.stop_recording().await {
            warn!("recording ended with error: {}", err);
        }
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("stream task ended with error: {}", err),
                Err(err) => warn!("stream task failed: {}", err),
            }
        }
        debug!(session_id = %self.session.id(), "session tasks stopped");
        self.session
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::audio::testing::{RecordingSink, ScriptedSource, SinkCall};
    use crate::client::{ConnectOptions, Connection};
    use crate::rpc::fake::{self, FakeDiatheke};
    use crate::streams::event::{CommandEvent, CommandStatus};

    #[derive(Default)]
    struct VecUplink {
        frames: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl AudioUplink for VecUplink {
        async fn send_audio(&mut self, data: Bytes) -> Result<()> {
            self.frames.push(data.to_vec());
            Ok(())
        }
    }

    /// Accepts nothing, like a server that stopped reading.
    struct StalledUplink;

    #[async_trait]
    impl AudioUplink for StalledUplink {
        async fn send_audio(&mut self, _data: Bytes) -> Result<()> {
            std::future::pending().await
        }
    }

    /// Flips the playing flag as it hands out chunks, like a reply starting
    /// and ending mid-utterance.
    struct MutingSource {
        state: Arc<AudioState>,
        script: VecDeque<(Option<bool>, Vec<u8>)>,
    }

    #[async_trait]
    impl AudioSource for MutingSource {
        async fn start(&mut self) -> Result<()> {
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let Some((playing, chunk)) = self.script.pop_front() else {
                return Ok(0);
            };
            if let Some(playing) = playing {
                self.state.set_playing(playing).await;
            }
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[tokio::test]
    async fn nothing_is_forwarded_while_playing() {
        let state = AudioState::new();
        state.set_recording(true).await;
        state.set_playing(true).await;
        let mut source = ScriptedSource::new(vec![vec![0xAA; 64], vec![0xBB; 32]], true);
        source.start().await.unwrap();
        let mut uplink = VecUplink::default();

        let stats = pump_audio(&mut source, &mut uplink, &state, &CancellationToken::new())
            .await
            .unwrap();
        assert!(uplink.frames.is_empty());
        assert_eq!(stats.forwarded_bytes, 0);
        assert_eq!(stats.discarded_bytes, 96);
    }

    #[tokio::test]
    async fn playback_mutes_only_its_own_span() {
        let state = Arc::new(AudioState::new());
        state.set_recording(true).await;
        let mut source = MutingSource {
            state: state.clone(),
            script: VecDeque::from(vec![
                (None, vec![1; 4]),
                (Some(true), vec![2; 4]),
                (None, vec![3; 4]),
                (Some(false), vec![4; 4]),
            ]),
        };
        let mut uplink = VecUplink::default();

        let stats = pump_audio(&mut source, &mut uplink, &state, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(uplink.frames, vec![vec![1; 4], vec![4; 4]]);
        assert_eq!(stats.discarded_bytes, 8);
        assert_eq!(stats.frames, 2);
    }

    #[tokio::test]
    async fn pump_does_not_run_when_recording_is_off() {
        let state = AudioState::new();
        let mut source = ScriptedSource::new(vec![vec![1; 8]], true);
        let mut uplink = VecUplink::default();
        let stats = pump_audio(&mut source, &mut uplink, &state, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats, PumpStats::default());
    }

    #[tokio::test]
    async fn toggling_off_wakes_a_blocked_pump() {
        let state = Arc::new(AudioState::new());
        state.set_recording(true).await;
        let pump_state = state.clone();
        let task = tokio::spawn(async move {
            let mut source = ScriptedSource::new(Vec::new(), false);
            source.start().await.unwrap();
            let mut uplink = VecUplink::default();
            pump_audio(&mut source, &mut uplink, &pump_state, &CancellationToken::new()).await
        });
        tokio::task::yield_now().await;
        state.set_recording(false).await;
        let stats = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.frames, 0);
    }

    #[tokio::test]
    async fn cancel_interrupts_a_stalled_send() {
        let state = AudioState::new();
        state.set_recording(true).await;
        let mut source = ScriptedSource::new(vec![vec![1; 8]], false);
        source.start().await.unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let stats = tokio::time::timeout(
            Duration::from_secs(1),
            pump_audio(&mut source, &mut StalledUplink, &state, &cancel),
        )
        .await
        .expect("pump kept waiting on the send after cancel")
        .unwrap();
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.forwarded_bytes, 0);
    }

    #[tokio::test]
    async fn toggling_off_interrupts_a_stalled_send() {
        let state = Arc::new(AudioState::new());
        state.set_recording(true).await;
        let pump_state = state.clone();
        let task = tokio::spawn(async move {
            let mut source = ScriptedSource::new(vec![vec![1; 8]], false);
            source.start().await.unwrap();
            pump_audio(
                &mut source,
                &mut StalledUplink,
                &pump_state,
                &CancellationToken::new(),
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.set_recording(false).await;
        let stats = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.frames, 0);
    }

    #[tokio::test]
    async fn read_errors_end_the_pump() {
        let state = AudioState::new();
        state.set_recording(true).await;
        let mut source = ScriptedSource::new(vec![vec![1; 8]], true);
        let mut uplink = VecUplink::default();
        let result = pump_audio(&mut source, &mut uplink, &state, &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Resource(_))));
    }

    struct Collecting {
        replies: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Collecting {
        async fn on_reply(&mut self, text: &str) {
            self.replies.lock().unwrap().push(text.to_string());
        }

        async fn on_command(
            &mut self,
            _command: &CommandEvent,
            mut status: CommandStatus,
        ) -> CommandStatus {
            status.set_success();
            status
        }
    }

    async fn wait_for_frames(recorded: &Arc<Mutex<fake::Recorded>>, count: usize) {
        for _ in 0..200 {
            if recorded.lock().unwrap().audio_frames.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("audio frames never arrived");
    }

    #[tokio::test]
    async fn streams_attach_before_the_session_starts() {
        let fake = FakeDiatheke::new()
            .with_events(vec![fake::reply("welcome")])
            .with_replies(vec![proto_reply_text("welcome"), proto_reply_end()]);
        let recorded = fake.recorded();
        let conn = Connection::with_rpc("fake:0", Arc::new(fake), ConnectOptions::default());
        let session = conn.create_session("demo-model").await.unwrap();

        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink::default();
        let mut manager = SessionManager::new(session);
        manager
            .start_event_stream(Box::new(Collecting {
                replies: replies.clone(),
            }))
            .await
            .unwrap();
        manager
            .start_reply_playback(Box::new(sink.clone()))
            .await
            .unwrap();
        manager.start().await.unwrap();

        while let Some(done) = manager.next_finished().await {
            done.unwrap();
        }
        let session = manager.shutdown().await;
        session.end().await.unwrap();

        assert_eq!(
            recorded.lock().unwrap().call_log,
            vec!["session_event_stream", "stream_audio_replies", "start_session"]
        );
        assert_eq!(*replies.lock().unwrap(), vec!["welcome"]);
        assert_eq!(sink.calls(), vec![SinkCall::Start, SinkCall::Stop]);
    }

    #[tokio::test]
    async fn push_to_talk_turns_reuse_the_source() {
        let fake = FakeDiatheke::new();
        let recorded = fake.recorded();
        let conn = Connection::with_rpc("fake:0", Arc::new(fake), ConnectOptions::default());
        let session = conn.create_session("demo-model").await.unwrap();
        let source = ScriptedSource::new(vec![vec![5; 100], vec![6; 100], vec![7; 100]], false);
        let mut manager = SessionManager::new(session).with_source(Box::new(source));

        assert!(manager.toggle_recording().await.unwrap().is_none());
        assert!(manager.is_recording());
        wait_for_frames(&recorded, 3).await;
        let first = manager.toggle_recording().await.unwrap().unwrap();
        assert_eq!(first.stats.forwarded_bytes, 300);
        assert_eq!(first.result.text, "300 bytes");
        assert!(!manager.state().recording().await);

        manager.start_recording().await.unwrap();
        let second = manager.stop_recording().await.unwrap().unwrap();
        assert_eq!(second.result.text, "0 bytes");

        let session = manager.shutdown().await;
        session.end().await.unwrap();
    }

    #[tokio::test]
    async fn recording_without_a_source_is_an_error() {
        let conn = Connection::with_rpc(
            "fake:0",
            Arc::new(FakeDiatheke::new()),
            ConnectOptions::default(),
        );
        let session = conn.create_session("demo-model").await.unwrap();
        let mut manager = SessionManager::new(session);
        assert!(matches!(
            manager.start_recording().await,
            Err(Error::Resource(_))
        ));
        assert!(!manager.state().recording().await);
    }

    struct BrokenSource;

    #[async_trait]
    impl AudioSource for BrokenSource {
        async fn start(&mut self) -> Result<()> {
            Err(Error::Resource("recorder missing".to_string()))
        }

        async fn stop(&mut self) -> Result<()> {
            Ok(())
        }

        async fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Err(Error::Resource("not running".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_source_start_is_reported_by_the_toggle() {
        let fake = FakeDiatheke::new();
        let recorded = fake.recorded();
        let conn = Connection::with_rpc("fake:0", Arc::new(fake), ConnectOptions::default());
        let session = conn.create_session("demo-model").await.unwrap();
        let mut manager = SessionManager::new(session).with_source(Box::new(BrokenSource));

        assert!(matches!(
            manager.toggle_recording().await,
            Err(Error::Resource(_))
        ));
        assert!(!manager.is_recording());
        assert!(!manager.state().recording().await);
        assert!(recorded.lock().unwrap().audio_session.is_none());

        // The source is kept, so the next toggle tries again.
        assert!(matches!(
            manager.start_recording().await,
            Err(Error::Resource(_))
        ));
        let session = manager.shutdown().await;
        session.end().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_joins_the_event_loop_after_a_failed_start() {
        let conn = Connection::with_rpc(
            "fake:0",
            Arc::new(FakeDiatheke::new().hanging_events()),
            ConnectOptions::default(),
        );
        let session = conn.create_session("demo-model").await.unwrap();
        let mut manager = SessionManager::new(session);
        manager
            .start_event_stream(Box::new(Collecting {
                replies: Arc::default(),
            }))
            .await
            .unwrap();
        conn.close().unwrap();
        assert!(matches!(manager.start().await, Err(Error::Closed)));

        tokio::time::timeout(Duration::from_secs(2), manager.shutdown())
            .await
            .expect("event loop outlived the failed start");
    }

    #[tokio::test]
    async fn shutdown_stops_live_streams() {
        let conn = Connection::with_rpc(
            "fake:0",
            Arc::new(FakeDiatheke::new().hanging_events()),
            ConnectOptions::default(),
        );
        let session = conn.create_session("demo-model").await.unwrap();
        let source = ScriptedSource::new(Vec::new(), false);
        let mut manager = SessionManager::new(session).with_source(Box::new(source));
        manager
            .start_event_stream(Box::new(Collecting {
                replies: Arc::default(),
            }))
            .await
            .unwrap();
        manager.start().await.unwrap();
        manager.start_recording().await.unwrap();

        let session = tokio::time::timeout(Duration::from_secs(2), manager.shutdown())
            .await
            .unwrap();
        session.end().await.unwrap();
    }

    fn proto_reply_text(text: &str) -> crate::proto::AudioReply {
        crate::proto::AudioReply {
            output_message: Some(crate::proto::audio_reply::OutputMessage::Text(
                text.to_string(),
            )),
        }
    }

    fn proto_reply_end() -> crate::proto::AudioReply {
        crate::proto::AudioReply {
            output_message: Some(crate::proto::audio_reply::OutputMessage::End(
                crate::proto::Empty {},
            )),
        }
    }
}
