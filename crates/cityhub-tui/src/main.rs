mod app;
mod handler;
mod tui;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cityhub_core::{backend, CompletionBackend, Config, Conversation, Overrides, Settings, SubmitRejected};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "cityhub")]
#[command(author, version, about = "Ask CityHub anything from the terminal", long_about = None)]
struct Cli {
    /// Completion backend: local, demo, groq or openai
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Endpoint URL (base URL for groq/openai)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Model id for chat-completion providers
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Config file (defaults to <config dir>/cityhub/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question without the TUI and print the answer
    Ask {
        /// Your question
        question: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider.clone(),
            endpoint_url: self.endpoint.clone(),
            model: self.model.clone(),
            request_timeout_secs: self.timeout,
        }
    }

    fn settings(&self) -> Result<Settings> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        Ok(config.resolve(&self.overrides())?)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Ask { question }) => {
            init_stderr_logging(cli.verbose);
            let settings = cli.settings()?;
            let backend = backend::from_settings(&settings)?;
            run_ask(backend, question).await
        }
        None => {
            let _guard = init_file_logging(cli.verbose)?;
            let settings = cli.settings()?;
            let backend = backend::from_settings(&settings)?;
            run_tui(backend, &settings).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// The terminal belongs to the UI, so logs go to a daily file
fn init_file_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("cityhub");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, "cityhub.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

async fn run_ask(backend: Arc<dyn CompletionBackend>, question: &str) -> Result<ExitCode> {
    let mut conversation = Conversation::new();

    let turn_id = match conversation.exchange(backend.as_ref(), question).await {
        Ok(turn_id) => turn_id,
        Err(SubmitRejected::EmptyInput) => bail!("question is empty"),
        Err(other) => bail!(other),
    };
    let Some(turn) = conversation.turn(&turn_id) else {
        bail!("answer went missing");
    };

    if turn.is_error {
        eprintln!("{}", turn.text);
        Ok(ExitCode::FAILURE)
    } else {
        println!("{}", turn.text);
        Ok(ExitCode::SUCCESS)
    }
}

async fn run_tui(backend: Arc<dyn CompletionBackend>, settings: &Settings) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(backend, settings);
    let mut events = EventHandler::new(settings.tick_interval);
    info!(provider = settings.provider.as_str(), "chat session started");

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    drop(events);
    tui::restore()?;
    info!(questions = app.conversation.question_count(), "chat session ended");
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
