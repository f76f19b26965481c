//! Command-line interface: argument parsing, the interactive session and
//! terminal rendering.
pub mod commands;
pub mod output;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(name = "ragloop")]
#[command(about = "Chat with a local model over your own notes, with distance-filtered retrieval")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive question loop (default)
    Chat,
    /// Answer a single question and exit
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Store a piece of text as context
    Add {
        /// Source label stored with the text
        #[arg(short, long, default_value = crate::rag::USER_INPUT_SOURCE)]
        source: String,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Chunk a text file and store every chunk
    Ingest {
        /// File to read (defaults to `default_file_path`)
        file: Option<PathBuf>,
        /// Source label (defaults to the file name)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Delete every stored document
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show collection and model information
    Info,
    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config path
        #[arg(long)]
        init: bool,
    },
}
