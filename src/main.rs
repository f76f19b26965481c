use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ragloop::cli::output::{filter_report, info_report};
use ragloop::cli::session::Session;
use ragloop::cli::{Cli, Commands};
use ragloop::config::Config;
use ragloop::db::Db;
use ragloop::ollama::OllamaClient;
use ragloop::rag::RagPipeline;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // 1. Load config
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;

    let command = cli.command.unwrap_or(Commands::Chat);
    if let Commands::Config { init } = command {
        if init {
            config.save(&cli.config)?;
            eprintln!("Wrote configuration to {}", cli.config);
        }
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    // 2. Init store and model client
    let db = Db::open(&config.db_path, config.ollama.dimensions, config.distance_metric)
        .with_context(|| format!("failed to open vector store at {}", config.db_path))?;
    let client = Arc::new(OllamaClient::new(&config.ollama)?);

    let default_file = config.default_file_path.clone();
    let mut rag = RagPipeline::new(Box::new(db), client.clone(), client, config);

    // 3. Dispatch
    match command {
        Commands::Chat => {
            let stdin = io::stdin();
            Session::new(&mut rag, stdin.lock(), io::stdout(), &cli.config).run()?;
        }
        Commands::Ask { query } => {
            let answer = rag.ask(&query.join(" "))?;
            println!("{}", answer.response.trim());
            if rag.config().filter.debug {
                eprintln!("{}", filter_report(&answer.retrieval.filter));
            }
        }
        Commands::Add { source, text } => {
            let id = rag.add_context(&text.join(" "), &source)?;
            println!("Stored {id}");
        }
        Commands::Ingest { file, source } => {
            let path = file.unwrap_or_else(|| PathBuf::from(default_file));
            let source = source.unwrap_or_else(|| {
                path.file_name()
                    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
            });
            let chunks = rag.ingest_file(&path, &source)?;
            println!("Ingested {chunks} chunk(s) from {}", path.display());
        }
        Commands::Clear { yes } => {
            let count = rag.document_count()?;
            if !yes && !confirm(&format!("Delete all {count} document(s)?"))? {
                println!("Clear cancelled.");
                return Ok(());
            }
            let removed = rag.clear()?;
            println!("Cleared {removed} document(s).");
        }
        Commands::Info => println!("{}", info_report(&rag.info()?)),
        // Handled before the store is opened.
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/N): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
