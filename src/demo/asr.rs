use diatheke::Connection;
use diatheke::audio::{AudioAppConfig, AudioSource, Recorder};
use diatheke::streams::asr::{AsrReceiver, stream_audio_from};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{Console, DemoResult, print_banner};

struct Turn {
    cancel: CancellationToken,
    recorder: JoinHandle<Recorder>,
    results: JoinHandle<()>,
}

pub async fn run(conn: &Connection, model: Option<String>, recording: AudioAppConfig) -> DemoResult {
    print_banner(conn, "ASR").await?;

    let mut console = Console::new();
    let model = match model {
        Some(model) => model,
        None => match console.prompt_required("Please enter the Cubic model ID: ").await? {
            Some(model) => model,
            None => return Ok(()),
        },
    };

    let mut recorder = Some(Recorder::new(recording));
    let mut turn: Option<Turn> = None;
    loop {
        let prompt = if turn.is_some() {
            "(Recording) "
        } else {
            "(Press Enter to record, Ctrl+D to exit) "
        };
        let line = console.read_line(prompt).await?;

        if let Some(active) = turn.take() {
            recorder = finish_turn(active).await;
        } else if line.is_some() {
            match recorder.take() {
                Some(idle) => match start_turn(conn, &model, idle).await {
                    Ok(active) => turn = Some(active),
                    Err((idle, err)) => {
                        eprintln!("Error creating ASR stream: {}", err);
                        recorder = Some(idle);
                    }
                },
                None => eprintln!("Error: the recorder was lost, restart the demo"),
            }
        }

        if line.is_none() {
            break;
        }
    }
    println!();
    Ok(())
}

async fn start_turn(
    conn: &Connection,
    model: &str,
    mut recorder: Recorder,
) -> Result<Turn, (Recorder, diatheke::Error)> {
    let (sender, receiver) = match conn.stream_asr(model).await {
        Ok(halves) => halves,
        Err(err) => return Err((recorder, err)),
    };
    println!("Recognizing using Cubic model {} ...", model);

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    let recorder = tokio::spawn(async move {
        if let Err(err) = recorder.start().await {
            eprintln!("Failed to start recording app: {}", err);
            return recorder;
        }
        if let Err(err) = stream_audio_from(&mut recorder, sender, &stop).await {
            eprintln!("Error pushing audio data: {}", err);
        }
        if let Err(err) = recorder.stop().await {
            warn!("failed to stop recorder: {}", err);
        }
        recorder
    });
    let results = tokio::spawn(print_results(receiver));
    Ok(Turn {
        cancel,
        recorder,
        results,
    })
}

async fn finish_turn(turn: Turn) -> Option<Recorder> {
    turn.cancel.cancel();
    let recorder = match turn.recorder.await {
        Ok(recorder) => Some(recorder),
        Err(err) => {
            warn!("recording task failed: {}", err);
            None
        }
    };
    if let Err(err) = turn.results.await {
        warn!("transcript task failed: {}", err);
    }
    recorder
}

async fn print_results(mut receiver: AsrReceiver) {
    loop {
        match receiver.recv().await {
            Ok(Some(result)) => {
                println!("ASR Response:");
                println!("  Transcription: {}", result.text);
                println!("  Confidence Score: {}\n", result.confidence);
            }
            Ok(None) => return,
            Err(err) => {
                eprintln!("Error receiving transcript: {}", err);
                return;
            }
        }
    }
}
