//! tabqa CLI
//!
//! Binary entry point. Provides three modes:
//! - `ask`: answer a single question about the files in a data directory
//! - `chat`: interactive REPL with slash commands
//! - `config`: configuration management

mod chat;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tabqa_core::provider::LlmProvider;
use tabqa_core::{AgentBuilder, AgentConfig};
use tabqa_provider_claude::ClaudeProvider;
use tabqa_provider_openai::OpenAiProvider;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "tabqa", about = "Question answering over tabular data files", version)]
struct Cli {
    /// Path to a config file (default: ~/.config/tabqa/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Directory containing the data files to bind
        #[arg(long)]
        data_dir: PathBuf,
        /// The question to answer
        question: String,
    },
    /// Interactive chat over the bound files
    Chat {
        /// Directory containing the data files to bind
        #[arg(long)]
        data_dir: PathBuf,
    },
    /// Configuration management
    Config {
        /// Print a sample config file
        #[arg(long)]
        init: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // All logging goes to stderr; stdout carries the answers.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AgentConfig::load_from(path)?,
        None => AgentConfig::load_default()?,
    };

    match cli.command {
        Commands::Ask { data_dir, question } => {
            let mut agent = build_agent(&config, &data_dir)?;
            let answer = agent.ask(&question).await?;
            println!("{}", answer.text);
            eprintln!("{}", chat::usage_line(&answer.usage));
            Ok(())
        }
        Commands::Chat { data_dir } => {
            let agent = build_agent(&config, &data_dir)?;
            chat::run_chat(agent).await
        }
        Commands::Config { init } => {
            if init {
                print!("{}", tabqa_core::config::sample_config());
            } else {
                let path = AgentConfig::default_path()?;
                println!("config path: {}", path.display());
                println!("exists: {}", path.exists());
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Agent construction
// ---------------------------------------------------------------------------

fn build_agent(config: &AgentConfig, data_dir: &Path) -> Result<tabqa_core::Agent> {
    // Fail fast on bad configuration before touching the network.
    config.validate()?;

    let provider = build_provider(config)?;
    let files = discover_files(data_dir)?;
    if files.is_empty() {
        bail!("no supported data files found in {}", data_dir.display());
    }
    info!(
        provider = provider.name(),
        model = provider.model(),
        files = files.len(),
        "starting agent"
    );

    Ok(AgentBuilder::new(config.clone())
        .with_provider(provider)
        .with_files(files)
        .build()?)
}

fn build_provider(config: &AgentConfig) -> Result<Arc<dyn LlmProvider>> {
    let name = config.provider.as_str();
    let api_key = config
        .resolve_api_key(name)
        .context("no API key configured")?;
    let model = config.model_for_provider(name);
    let base_url = config.base_url_for_provider(name);

    match name {
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            &api_key,
            &model,
            base_url.as_deref(),
        ))),
        "claude" => Ok(Arc::new(ClaudeProvider::new(
            &api_key,
            &model,
            base_url.as_deref(),
        ))),
        other => bail!("unknown provider '{other}'"),
    }
}

/// Find the data files in a directory, ordered by name.
fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    const SUPPORTED: &[&str] = &["csv", "tsv", "xlsx", "xls", "xlsm", "json"];

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read data directory '{}'", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| SUPPORTED.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
