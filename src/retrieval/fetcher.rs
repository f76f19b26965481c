//! Oversampled nearest-neighbor fetch.
use tracing::{debug, warn};

use super::{Candidate, CandidateList, RetrievalError};
use crate::db::VectorStore;

/// Candidates requested per wanted result.
pub const OVERSAMPLE_FACTOR: usize = 3;

/// Minimum number of extra candidates beyond the wanted count.
pub const OVERSAMPLE_MARGIN: usize = 4;

/// Number of neighbors to request from the store for `n` wanted results.
#[must_use]
pub fn oversampled_k(n: usize) -> usize {
    n.saturating_mul(OVERSAMPLE_FACTOR)
        .max(n.saturating_add(OVERSAMPLE_MARGIN))
}

/// Issues one nearest-neighbor query per call and returns a sorted
/// [`CandidateList`].
pub struct NeighborFetcher<'a, S: VectorStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: VectorStore + ?Sized> NeighborFetcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fetch candidates for `n` wanted results.
    ///
    /// A sparse collection yields fewer candidates than requested; that is not
    /// an error. Store failures are never turned into an empty list.
    pub fn fetch(&self, embedding: &[f32], n: usize) -> Result<CandidateList, RetrievalError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if embedding.is_empty() {
            return Err(RetrievalError::EmptyEmbedding);
        }

        let k = oversampled_k(n);
        let mut neighbors = self.store.query_nearest(embedding, k)?;

        if !neighbors.is_sorted_by(|a, b| a.distance <= b.distance) {
            warn!("vector store returned unsorted neighbors, sorting");
            neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        }
        neighbors.truncate(k);

        debug!(requested = n, k, found = neighbors.len(), "fetched neighbors");

        Ok(neighbors
            .into_iter()
            .enumerate()
            .map(|(rank, nb)| Candidate {
                id: nb.doc_id,
                content: nb.content,
                distance: nb.distance,
                rank,
            })
            .collect())
    }
}
