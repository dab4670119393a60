use diatheke::Connection;
use diatheke::audio::{AudioAppConfig, Player};
use diatheke::streams::tts::write_tts_audio;

use super::{Console, DemoResult, print_banner};

pub async fn run(conn: &Connection, model: Option<String>, playback: AudioAppConfig) -> DemoResult {
    print_banner(conn, "TTS").await?;

    let mut console = Console::new();
    let model = match model {
        Some(model) => model,
        None => match console
            .prompt_required("Please enter the Luna voice model ID: ")
            .await?
        {
            Some(model) => model,
            None => return Ok(()),
        },
    };

    while let Some(text) = console.read_line("Diatheke TTS> ").await? {
        if text.is_empty() {
            continue;
        }
        if let Err(err) = synthesize(conn, &model, &text, &playback).await {
            eprintln!("Streaming TTS error: {}", err);
        }
    }
    println!();
    Ok(())
}

async fn synthesize(
    conn: &Connection,
    model: &str,
    text: &str,
    playback: &AudioAppConfig,
) -> diatheke::Result<()> {
    println!("Synthesizing using voice model {} ...", model);
    let mut stream = conn.stream_tts(model, text).await?;
    let mut player = Player::new(playback.clone());
    write_tts_audio(&mut stream, &mut player).await?;
    println!("Synthesis complete.\n");
    Ok(())
}
