/// Embedder trait and shared types for text embedding.
pub mod mock;

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding service unavailable: {message}\n  hint: {hint}")]
    Unavailable { message: String, hint: String },

    #[error("embedding service returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Reject a vector whose length differs from `expected`.
pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<(), EmbedderError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(EmbedderError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}
