//! # ragloop: Local RAG command loop
//!
//! Stores user-supplied text as embeddings in SQLite, retrieves the passages
//! relevant to each question and hands them to a local Ollama model.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration, environment overrides, validation
//! - **[`db`]**: SQLite + sqlite-vec vector store
//! - **[`embedder`]**: Embedding trait and a deterministic mock
//! - **[`generator`]**: Generation trait and prompt templates
//! - **[`ollama`]**: HTTP client implementing both traits against Ollama
//! - **[`retrieval`]**: Oversampled neighbor fetch, distance filtering, context assembly
//! - **[`chunker`]**: Paragraph/sentence chunking for file ingestion
//! - **[`rag`]**: The query pipeline tying the pieces together
//! - **[`cli`]**: Argument parsing, interactive session, terminal output

pub mod chunker;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedder;
pub mod generator;
pub mod ollama;
pub mod rag;
pub mod retrieval;
