use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "diatheke", version, about = "Diatheke dialog server demos")]
pub struct Cli {
    #[command(flatten)]
    pub server: ServerArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(long, env = "DIATHEKE_ADDRESS", default_value_t = ServerConfig::default_address())]
    pub address: String,
    /// Plaintext connection. Use TLS in production.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub insecure: bool,
    /// PEM certificate used to verify the server.
    #[arg(long, value_name = "PEM")]
    pub server_cert: Option<PathBuf>,
    #[arg(long, value_name = "PEM", requires = "client_key")]
    pub client_cert: Option<PathBuf>,
    #[arg(long, value_name = "PEM", requires = "client_cert")]
    pub client_key: Option<PathBuf>,
    /// Fail a stream that stays silent this long.
    #[arg(long, value_name = "SECS")]
    pub idle_timeout_secs: Option<u64>,
    /// Print command ids and parameters.
    #[arg(long, short, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Print the server version")]
    Version,
    #[command(about = "List the dialog models the server offers")]
    Models,
    #[command(about = "Text chat with a dialog model")]
    Cli {
        #[arg(long, env = "DIATHEKE_MODEL")]
        model: String,
        /// Print events as JSON lines instead of text.
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },
    #[command(about = "Voice dialog: Enter toggles recording, replies are spoken")]
    Audio {
        #[arg(long, env = "DIATHEKE_MODEL")]
        model: String,
    },
    #[command(about = "Streaming speech recognition with a Cubic model")]
    Asr {
        #[arg(long)]
        model: Option<String>,
    },
    #[command(about = "Speech synthesis with a Luna voice model")]
    Tts {
        #[arg(long)]
        model: Option<String>,
    },
}
