mod cli;
mod config;
mod demo;

use clap::Parser;
use diatheke::Connection;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::{AudioConfig, ServerConfig};
use crate::demo::DemoResult;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("diatheke=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let server = ServerConfig::from_args(&cli.server)?;
    let demo = Demo::prepare(cli.command, &AudioConfig::from_env())?;

    let conn = diatheke::connect(&server.address, server.connect_options()).await?;
    let result = demo.run(&conn, server.verbose).await;
    if let Err(err) = conn.close() {
        warn!("failed to close connection: {}", err);
    }
    result?;
    println!("Exiting...");
    Ok(())
}

/// A subcommand with its audio applications already checked, so missing
/// executables fail before any connection is made.
enum Demo {
    Version,
    Models,
    Text { model: String, json: bool },
    Voice {
        model: String,
        recording: diatheke::audio::AudioAppConfig,
        playback: diatheke::audio::AudioAppConfig,
    },
    Asr {
        model: Option<String>,
        recording: diatheke::audio::AudioAppConfig,
    },
    Tts {
        model: Option<String>,
        playback: diatheke::audio::AudioAppConfig,
    },
}

impl Demo {
    fn prepare(command: Command, audio: &AudioConfig) -> Result<Self, String> {
        Ok(match command {
            Command::Version => Demo::Version,
            Command::Models => Demo::Models,
            Command::Cli { model, json } => Demo::Text { model, json },
            Command::Audio { model } => Demo::Voice {
                model,
                recording: audio.require_recording()?,
                playback: audio.require_playback()?,
            },
            Command::Asr { model } => Demo::Asr {
                model,
                recording: audio.require_recording()?,
            },
            Command::Tts { model } => Demo::Tts {
                model,
                playback: audio.require_playback()?,
            },
        })
    }

    async fn run(self, conn: &Connection, verbose: bool) -> DemoResult {
        match self {
            Demo::Version => demo::print_version(conn).await,
            Demo::Models => demo::print_models(conn).await,
            Demo::Text { model, json } => demo::text::run(conn, &model, verbose, json).await,
            Demo::Voice {
                model,
                recording,
                playback,
            } => demo::voice::run(conn, &model, recording, playback, verbose).await,
            Demo::Asr { model, recording } => demo::asr::run(conn, model, recording).await,
            Demo::Tts { model, playback } => demo::tts::run(conn, model, playback).await,
        }
    }
}
