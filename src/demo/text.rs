use diatheke::Connection;
use diatheke::coordinator::SessionManager;
use tracing::warn;

use super::{Console, ConsoleHandler, DemoResult, print_banner, print_models};

pub async fn run(conn: &Connection, model: &str, verbose: bool, json: bool) -> DemoResult {
    print_banner(conn, "CLI").await?;
    print_models(conn).await?;
    println!();

    let session = conn.create_session(model).await?;
    let mut manager = SessionManager::new(session);
    let result = chat(&mut manager, verbose, json).await;

    let session = manager.shutdown().await;
    if let Err(err) = session.end().await {
        warn!("failed to end session: {}", err);
    }
    result
}

async fn chat(manager: &mut SessionManager, verbose: bool, json: bool) -> DemoResult {
    manager
        .start_event_stream(Box::new(ConsoleHandler::new(verbose, json)))
        .await?;
    manager.start().await?;

    let session = manager.session();
    let mut console = Console::new();
    while let Some(line) = console.read_line("Diatheke> ").await? {
        if line.is_empty() {
            continue;
        }
        if let Err(err) = session.push_text(&line).await {
            eprintln!("Error: failed to push text to Diatheke: {}", err);
        }
    }
    Ok(())
}
