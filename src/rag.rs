//! Query pipeline: embed, fetch, filter, assemble context, generate.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chunker::chunk_text;
use crate::config::{Config, DistanceMetric};
use crate::db::models::{NewDocument, StoredDocument};
use crate::db::{StoreError, VectorStore};
use crate::embedder::{Embedder, EmbedderError};
use crate::generator::{GenerationError, Generator, prompt};
use crate::retrieval::context::build_context;
use crate::retrieval::{FilterConfig, FilterResult, NeighborFetcher, RetrievalError, filter};

/// Source label for text typed in by the user.
pub const USER_INPUT_SOURCE: &str = "user_input";

const RECENT_LIMIT: usize = 3;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("context text is empty")]
    EmptyText,

    #[error("{} contains no text to ingest", .0.display())]
    EmptyFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Embedding(#[from] EmbedderError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Outcome of the retrieval half of a query.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Candidates returned by the store before filtering.
    pub fetched: usize,
    pub filter: FilterResult,
    /// Assembled context, `None` when nothing relevant was found.
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    pub retrieval: Retrieval,
    pub prompt: String,
}

/// Snapshot shown by `info` and `/info`.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub collection: String,
    pub db_path: String,
    pub document_count: usize,
    pub embedding_model: String,
    pub generation_model: String,
    pub distance_metric: DistanceMetric,
    pub max_results: usize,
    pub max_context_chars: usize,
    pub filter: FilterConfig,
    pub recent: Vec<StoredDocument>,
}

pub struct RagPipeline {
    store: Box<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    config: Arc<Config>,
    generation_model: String,
    /// Suffix keeping ids unique within one timestamp tick.
    next_seq: u64,
}

impl RagPipeline {
    pub fn new(
        store: Box<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: Config,
    ) -> Self {
        Self {
            generation_model: config.ollama.generation_model.clone(),
            store,
            embedder,
            generator,
            config: Arc::new(config),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    /// Embed `query`, fetch and filter neighbors, and assemble context.
    pub fn retrieve(&self, query: &str) -> Result<Retrieval, RagError> {
        let config = Arc::clone(&self.config);
        let n = config.max_results;

        let embedding = self.embedder.embed(query)?;
        let candidates = NeighborFetcher::new(&*self.store).fetch(&embedding, n)?;
        let result = filter(&candidates, n, &config.filter);
        let context = build_context(&result.accepted, config.max_context_chars, config.filter.debug);

        debug!(
            fetched = candidates.len(),
            accepted = result.filtered_count,
            has_context = context.is_some(),
            "retrieval finished"
        );

        Ok(Retrieval {
            fetched: candidates.len(),
            filter: result,
            context,
        })
    }

    /// Answer `query` with whatever relevant context the store holds.
    pub fn ask(&self, query: &str) -> Result<Answer, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let retrieval = self.retrieve(query)?;
        let prompt = match &retrieval.context {
            Some(context) => prompt::with_context(query, context),
            None => prompt::without_context(query),
        };

        info!(model = %self.generation_model, "generating response");
        let response = self.generator.generate(&self.generation_model, &prompt)?;

        Ok(Answer {
            response,
            retrieval,
            prompt,
        })
    }

    /// Store `text` as one document and return its id.
    pub fn add_context(&mut self, text: &str, source: &str) -> Result<String, RagError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::EmptyText);
        }

        let doc_id = self.next_id(source, &timestamp());
        let embedding = self.embedder.embed(text)?;
        self.store.insert(
            &NewDocument {
                doc_id: &doc_id,
                source,
                content: text,
            },
            &embedding,
        )?;

        info!("Added document {doc_id} ({} chars)", text.chars().count());
        Ok(doc_id)
    }

    /// Chunk a text file and store every chunk; returns the chunk count.
    pub fn ingest_file(&mut self, path: &Path, source: &str) -> Result<usize, RagError> {
        let text = std::fs::read_to_string(path).map_err(|source| RagError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let chunks = chunk_text(&text, self.config.chunk_size);
        if chunks.is_empty() {
            return Err(RagError::EmptyFile(path.to_path_buf()));
        }

        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs)?;

        let stamp = timestamp();
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            let doc_id = self.next_id(source, &stamp);
            self.store.insert(
                &NewDocument {
                    doc_id: &doc_id,
                    source,
                    content: chunk,
                },
                embedding,
            )?;
        }

        info!("Ingested {} chunks from {}", chunks.len(), path.display());
        Ok(chunks.len())
    }

    /// Remove every document; returns how many were removed.
    pub fn clear(&mut self) -> Result<usize, RagError> {
        let removed = self.store.delete_all()?;
        warn!("Cleared {removed} documents from {}", self.config.collection);
        Ok(removed)
    }

    pub fn document_count(&self) -> Result<usize, RagError> {
        Ok(self.store.count()?)
    }

    pub fn info(&self) -> Result<SystemInfo, RagError> {
        let config = &self.config;
        Ok(SystemInfo {
            collection: config.collection.clone(),
            db_path: config.db_path.clone(),
            document_count: self.store.count()?,
            embedding_model: config.ollama.embedding_model.clone(),
            generation_model: self.generation_model.clone(),
            distance_metric: config.distance_metric,
            max_results: config.max_results,
            max_context_chars: config.max_context_chars,
            filter: config.filter.clone(),
            recent: self.store.list_recent(RECENT_LIMIT)?,
        })
    }

    /// Swap in a new, already validated configuration.
    ///
    /// Returns warnings for settings that only take effect after a restart.
    pub fn reload(&mut self, config: Config) -> Vec<String> {
        let old = Arc::clone(&self.config);
        let mut warnings = Vec::new();

        if config.db_path != old.db_path {
            warnings.push(format!(
                "db_path changed to {}; restart to switch stores",
                config.db_path
            ));
        }
        if config.ollama.dimensions != old.ollama.dimensions {
            warnings.push("ollama.dimensions changed; restart to apply".to_string());
        }
        if config.distance_metric != old.distance_metric {
            warnings.push("distance_metric changed; restart to apply".to_string());
        }
        if config.ollama.host != old.ollama.host
            || config.ollama.timeout_secs != old.ollama.timeout_secs
            || config.ollama.embedding_model != old.ollama.embedding_model
        {
            warnings.push("ollama connection settings changed; restart to apply".to_string());
        }
        for w in &warnings {
            warn!("{w}");
        }

        if config.ollama.generation_model != old.ollama.generation_model {
            self.generation_model = config.ollama.generation_model.clone();
        }
        self.config = Arc::new(config);
        info!("Configuration reloaded");
        warnings
    }

    pub fn set_generation_model(&mut self, name: &str) {
        info!("Switching generation model: {} -> {name}", self.generation_model);
        self.generation_model = name.to_string();
    }

    pub fn available_models(&self) -> Result<Vec<String>, RagError> {
        Ok(self.generator.list_models()?)
    }

    fn next_id(&mut self, source: &str, stamp: &str) -> String {
        let id = format!("{source}_{stamp}_{}", self.next_seq);
        self.next_seq += 1;
        id
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}
