//! lessons: HTTP server with one endpoint per local-LLM lesson
//!
//! Every lesson talks to a local Ollama runtime through `chain-kit`.

mod catalog;
mod error;
mod routes;
mod service;
mod state;
mod usage;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chain_kit::memory::ConversationMemory;
use chain_kit::workflow::StepStore;
use clap::Parser;
use llm_core::{ChatOptions, Config, OllamaChat, OllamaClient, OllamaEmbedder};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "lessons")]
#[command(about = "Serve the local LLM lessons over HTTP", version)]
struct Cli {
    /// Path to llm.toml (searched upward from the working directory otherwise)
    #[arg(short, long, env = "LESSONS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Ollama base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Chat model
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Directory for conversations.db and workflows.db
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags win over the file and the environment
    fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(url) = &self.base_url {
            config.ollama.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.ollama.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.ollama.temperature = temperature;
        }
        if let Some(dir) = &self.data_dir {
            config.server.data_dir = dir.clone();
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            config
        }
        None => Config::load()?,
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over the flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;

    let client = OllamaClient::new(
        config.ollama_url(),
        Duration::from_secs(config.ollama.timeout_secs),
    )?;
    let model = OllamaChat::new(
        client.clone(),
        &config.ollama.model,
        ChatOptions::with_temperature(config.ollama.temperature),
    );
    let embedder = OllamaEmbedder::new(client.clone(), &config.ollama.embedding_model);

    let data_dir = &config.server.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    let memory = ConversationMemory::open(data_dir.join("conversations.db"))
        .context("Failed to open conversation store")?;
    memory.seed_if_empty()?;
    let steps =
        StepStore::open(data_dir.join("workflows.db")).context("Failed to open workflow store")?;

    if !client.health_check().await.unwrap_or(false) {
        warn!(url = %client.base_url(), "Ollama is not reachable; lessons will return 503 until it is");
    }

    let state = AppState::new(Arc::new(model), Arc::new(embedder), memory, steps);
    let app = routes::router(state);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(
        bind = %config.server.bind,
        model = %config.ollama.model,
        lessons = catalog::LESSONS.len(),
        "Lesson server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}
