use diatheke::Connection;
use diatheke::audio::{AudioAppConfig, Player, Recorder};
use diatheke::coordinator::SessionManager;
use tracing::{debug, warn};

use super::{Console, ConsoleHandler, DemoResult, print_banner};

const IDLE_PROMPT: &str = "(Press Enter to record, Ctrl+D to exit) ";
const RECORDING_PROMPT: &str = "(Recording, Enter to stop) ";

pub async fn run(
    conn: &Connection,
    model: &str,
    recording: AudioAppConfig,
    playback: AudioAppConfig,
    verbose: bool,
) -> DemoResult {
    print_banner(conn, "Audio").await?;

    let session = conn.create_session(model).await?;
    let mut manager =
        SessionManager::new(session).with_source(Box::new(Recorder::new(recording)));
    let result = converse(&mut manager, playback, verbose).await;

    let session = manager.shutdown().await;
    if let Err(err) = session.end().await {
        warn!("failed to end session: {}", err);
    }
    result
}

async fn converse(
    manager: &mut SessionManager,
    playback: AudioAppConfig,
    verbose: bool,
) -> DemoResult {
    manager
        .start_event_stream(Box::new(ConsoleHandler::new(verbose, false)))
        .await?;
    manager
        .start_reply_playback(Box::new(Player::new(playback)))
        .await?;
    manager.start().await?;

    let mut console = Console::new();
    loop {
        let prompt = if manager.is_recording() {
            RECORDING_PROMPT
        } else {
            IDLE_PROMPT
        };
        if console.read_line(prompt).await?.is_none() {
            break;
        }
        match manager.toggle_recording().await {
            Ok(Some(outcome)) => debug!(
                forwarded = outcome.stats.forwarded_bytes,
                muted = outcome.stats.discarded_bytes,
                transcript = %outcome.result.text,
                "recording turn finished"
            ),
            Ok(None) => {}
            Err(err) => eprintln!("Error: {}", err),
        }
    }
    println!();
    Ok(())
}
