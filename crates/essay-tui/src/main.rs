use anyhow::Result;
use essay_core::{Config, ModeController};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

/// Logs go to a file under the local data directory since the terminal
/// belongs to the UI. Returns the guard that flushes the writer on drop.
fn init_logging() -> Option<WorkerGuard> {
    let log_dir = dirs::data_local_dir()?.join("essay-feedback");
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "essay-feedback.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let guard = init_logging();

    // Configuration problems are fatal and reported before the terminal is taken over
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "configuration error");
            eprintln!("Configuration error: {err}");
            drop(guard);
            std::process::exit(1);
        }
    };
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting essay-feedback");

    let controller = ModeController::from_config(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(controller, events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    drop(guard);
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
