//! Retrieval core: oversampled neighbor fetch followed by distance filtering.
pub mod context;
pub mod fetcher;
pub mod filter;

use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;

pub use fetcher::NeighborFetcher;
pub use filter::{FilterConfig, FilterResult, filter};

/// A retrieved document paired with its distance from the current query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub content: String,
    /// Non-negative dissimilarity; 0 means identical.
    pub distance: f64,
    /// Position in the fetched list, 0 = nearest.
    pub rank: usize,
}

/// Candidates sorted ascending by distance.
pub type CandidateList = Vec<Candidate>;

/// Errors surfaced by the retrieval path.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("query embedding is empty")]
    EmptyEmbedding,

    #[error("vector store query failed: {0}")]
    Store(#[from] StoreError),
}
