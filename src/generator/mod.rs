/// Text generation trait and prompt construction.
pub mod prompt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation service unavailable: {message}\n  hint: {hint}")]
    Unavailable { message: String, hint: String },

    #[error("generation service returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// A language model that answers prompts.
pub trait Generator: Send + Sync {
    /// Generate a complete (non-streamed) response for `prompt`.
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;

    /// Names of the models the service can run.
    fn list_models(&self) -> Result<Vec<String>, GenerationError>;
}
