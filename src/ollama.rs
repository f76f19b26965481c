//! HTTP client for a local Ollama server.
//!
//! One blocking client serves both embeddings (`/api/embed`) and generation
//! (`/api/generate`, `/api/tags`).
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OllamaConfig;
use crate::embedder::{Embedder, EmbedderError, check_dimensions};
use crate::generator::{GenerationError, Generator};

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

// ── Client ───────────────────────────────────────────────────────────

pub struct OllamaClient {
    client: Client,
    host: String,
    embedding_model: String,
    dimensions: usize,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.host)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, String> {
        let url = self.url(path);
        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| format!("request to {url} failed: {e}"))?;
        ensure_success(resp)
    }
}

fn ensure_success(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(format!("Ollama API error ({status}): {}", body.trim()))
}

fn serve_hint(model: &str) -> String {
    format!("make sure `ollama serve` is running and the model is pulled (`ollama pull {model}`)")
}

impl Embedder for OllamaClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedderError::InvalidResponse("no embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let resp = self
            .post("/api/embed", &request)
            .map_err(|message| EmbedderError::Unavailable {
                message,
                hint: serve_hint(&self.embedding_model),
            })?;
        let body: EmbedResponse = resp
            .json()
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(EmbedderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        for vector in &body.embeddings {
            check_dimensions(vector, self.dimensions)?;
        }
        Ok(body.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Generator for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let resp = self
            .post("/api/generate", &request)
            .map_err(|message| GenerationError::Unavailable {
                message,
                hint: serve_hint(model),
            })?;
        let body: GenerateResponse = resp
            .json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        Ok(body.response)
    }

    fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let url = self.url("/api/tags");
        debug!("GET {url}");
        let unavailable = |message: String| GenerationError::Unavailable {
            message,
            hint: "make sure `ollama serve` is running".to_string(),
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| unavailable(format!("request to {url} failed: {e}")))?;
        let resp = ensure_success(resp).map_err(unavailable)?;
        let body: TagsResponse = resp
            .json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}
