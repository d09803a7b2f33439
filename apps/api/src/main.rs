mod config;
mod cv_analyzer;
mod datasets;
mod errors;
mod llm_client;
mod markdown;
mod relay;
mod routes;
mod state;
mod summarizer;
mod tutor;

use std::io::Write;
use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, Overrides};
use crate::routes::build_router;
use crate::state::AppState;
use crate::summarizer::page::scrape;
use crate::summarizer::summarize_stream;

#[derive(Parser, Debug)]
#[command(name = "promptdeck", version, about = "LLM demo apps: tutor, CV analyzer, website summarizer, synthetic data")]
struct Cli {
    /// Model name, overrides LLM_MODEL.
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key, overrides OPENAI_API_KEY. Use `ollama` for a local model.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// HTTP port, overrides PORT.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Defaults to `serve`.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Default)]
enum Command {
    /// Run the web server hosting all apps.
    #[default]
    Serve,
    /// Summarize a website and stream the markdown to stdout.
    Summarize { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on a missing or malformed API key)
    let config = Config::from_env(Overrides {
        api_key: cli.api_key,
        model: cli.model,
        port: cli.port,
    })?;

    // Initialize structured logging; stderr keeps stdout clean for `summarize`
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let state = AppState::new(config.clone())?;
    info!(
        "LLM client initialized (model: {}, backend: {})",
        state.llm.model(),
        if config.uses_ollama() { "ollama" } else { "openai" }
    );

    match cli.command.unwrap_or_default() {
        Command::Serve => serve(state, config.port).await,
        Command::Summarize { url } => summarize_to_stdout(&state, &url).await,
    }
}

async fn serve(state: AppState, port: u16) -> Result<()> {
    info!("Starting promptdeck v{}", env!("CARGO_PKG_VERSION"));

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn summarize_to_stdout(state: &AppState, url: &str) -> Result<()> {
    let page = scrape(&state.http, url).await?;
    let mut chunks = summarize_stream(&state.llm, &page).await?;

    let mut stdout = std::io::stdout().lock();
    while let Some(chunk) = chunks.next().await {
        stdout.write_all(chunk?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
