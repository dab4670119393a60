pub mod asr;
pub mod text;
pub mod tts;
pub mod voice;

use std::io::Write;

use async_trait::async_trait;
use diatheke::{CommandEvent, CommandStatus, Connection, Event, EventHandler};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub type DemoResult = Result<(), Box<dyn std::error::Error>>;

/// Line-oriented stdin with a prompt.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Prints `prompt` and waits for a line. `None` on end of input.
    pub async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|line| line.trim().to_string()))
    }

    /// Asks until a non-empty answer is given.
    pub async fn prompt_required(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        loop {
            match self.read_line(prompt).await? {
                Some(answer) if answer.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}

pub async fn print_banner(conn: &Connection, title: &str) -> diatheke::Result<()> {
    println!("\nDiatheke {} Demo", title);
    let version = conn.version().await?;
    println!("Diatheke version: {}", version);
    println!("Connected to {}\n", conn.address());
    Ok(())
}

pub async fn print_version(conn: &Connection) -> DemoResult {
    println!("{}", conn.version().await?);
    Ok(())
}

pub async fn print_models(conn: &Connection) -> DemoResult {
    println!("Available model IDs:");
    for model in conn.list_models().await? {
        println!("  {}", model);
    }
    Ok(())
}

/// Prints dialog events and reports every command as done.
pub struct ConsoleHandler {
    verbose: bool,
    json: bool,
}

impl ConsoleHandler {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    fn print_json(&self, event: &Event) -> bool {
        if !self.json {
            return false;
        }
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(err) => eprintln!("Error: failed to encode event: {}", err),
        }
        true
    }
}

#[async_trait]
impl EventHandler for ConsoleHandler {
    async fn on_recognize(&mut self, text: &str, valid_input: bool) {
        let event = Event::Recognize {
            text: text.to_string(),
            valid_input,
        };
        if self.print_json(&event) {
            return;
        }
        if valid_input {
            println!("\nRecognized: {}", text);
        } else {
            println!("\nUnrecognized input: {}", text);
        }
    }

    async fn on_reply(&mut self, text: &str) {
        let event = Event::Reply {
            text: text.to_string(),
        };
        if !self.print_json(&event) {
            println!("Reply: {}", text);
        }
    }

    async fn on_command(
        &mut self,
        command: &CommandEvent,
        mut status: CommandStatus,
    ) -> CommandStatus {
        if !self.print_json(&Event::Command(command.clone())) && self.verbose {
            println!("    Command ID: {}", command.command_id);
            println!("    Parameters:");
            for (param, value) in &command.parameters {
                println!("      {} = {}", param, value);
            }
            println!();
        }
        status.set_success();
        status
    }
}
