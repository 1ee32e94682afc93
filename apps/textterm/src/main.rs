mod config;
mod keys;
mod markup;
mod store;
mod surface;
mod telemetry;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use serde_json::Value;
use store::FileHistoryStore;
use surface::TerminalSurface;
use telemetry::logging::{self, LogConfig, LogLevel};
use textterm_core::{Engine, EngineConfig, History, Session, SessionHooks};
use textterm_http::{HttpTransport, HttpTransportConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "textterm", about = "Line-oriented console for a remote text session")]
struct Cli {
    /// Server address (host:port or URL); overrides TEXTTERM_SERVER
    #[arg(long)]
    server: Option<String>,

    /// JSON payload sent when the session is initialized
    #[arg(long, value_name = "JSON")]
    init: Option<String>,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn, env = "TEXTTERM_LOG_LEVEL")]
    log_level: LogLevel,

    /// Log file; defaults to ~/.textterm/textterm.log
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// History store; defaults to ~/.textterm/history.json
    #[arg(long, value_name = "PATH")]
    history_file: Option<PathBuf>,

    /// Keep submitted lines in memory only
    #[arg(long)]
    no_history: bool,
}

struct ConsoleHooks;

impl SessionHooks for ConsoleHooks {
    fn on_dispose(&mut self, data: Option<&Value>) {
        info!(target = "textterm", data = ?data, "remote session disposed");
    }

    fn on_abort(&mut self) {
        info!(target = "textterm", "remote session aborted");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = match cli.server.as_deref() {
        Some(server) => Config::with_server(server),
        None => Config::from_env(),
    };
    let data_dir = config::data_dir()?;

    logging::init(&LogConfig {
        level: cli.log_level,
        file: cli
            .log_file
            .clone()
            .unwrap_or_else(|| data_dir.join("textterm.log")),
    })?;

    let payload = match cli.init.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("--init must be valid JSON")?,
        None => Value::Null,
    };
    let history = if cli.no_history {
        History::new()
    } else {
        let path = cli
            .history_file
            .clone()
            .unwrap_or_else(|| data_dir.join("history.json"));
        History::load(Box::new(FileHistoryStore::new(path)))
    };

    let server_url = config.server_url()?;
    info!(target = "textterm", server = %server_url, "starting console");
    let transport = HttpTransport::new(HttpTransportConfig::new(server_url))?;

    let surface = TerminalSurface::enter().context("failed to set up terminal")?;
    let (engine, handle) = Engine::new(
        Session::new(history),
        transport,
        surface,
        ConsoleHooks,
        EngineConfig::default(),
    );
    let engine_task = tokio::spawn(engine.run());
    handle.initialize(payload)?;
    let input = keys::spawn_input_thread(handle.clone())?;
    drop(handle);

    let session = engine_task.await.context("engine task failed")?;
    tokio::task::spawn_blocking(move || keys::join_input_thread(input)).await?;

    for pair in session.ledger().pairs() {
        print!("{}", markup::to_plain(pair.prompt()));
        if pair.shows_input() && !pair.is_masked() {
            print!("{}", pair.input());
        }
    }
    println!();
    info!(target = "textterm", terminated = session.is_terminated(), "console closed");
    Ok(())
}
