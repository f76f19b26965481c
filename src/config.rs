//! Configuration module for ragloop.
//!
//! Loads the JSON configuration file, applies environment overrides and
//! validates everything once, before any query runs. The retrieval core only
//! ever sees the resulting immutable values.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::retrieval::filter::FilterConfig;

/// Path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "ragloop.json";

/// Invalid configuration. Fatal to the query path until corrected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("filter.dynamic_ratio must be in (0, 1], got {0}")]
    InvalidDynamicRatio(f64),

    #[error("filter.{field} must be a finite number >= 0, got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },

    #[error("filter.min_results_for_filtering must be at least 1")]
    InvalidMinResults,

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    InvalidOverride { var: &'static str, value: String },
}

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./ragloop.db".to_string()
}

fn default_collection() -> String {
    "docs".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_max_context_chars() -> usize {
    1000
}

fn default_chunk_size() -> usize {
    500
}

fn default_file_path() -> String {
    "context.txt".to_string()
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_embedding_model() -> String {
    "mxbai-embed-large".to_string()
}

fn default_generation_model() -> String {
    "llama3.2".to_string()
}

fn default_dimensions() -> usize {
    1024
}

// ── Config structs ───────────────────────────────────────────────────

/// Distance function used by the vector store.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Display name of the document collection.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Number of passages handed to the generator per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// File read by `ingest` when no path is given.
    #[serde(default = "default_file_path")]
    pub default_file_path: String,

    #[serde(default)]
    pub distance_metric: DistanceMetric,

    /// Include the full generation prompt in answers.
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OllamaConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Length of the vectors produced by `embedding_model`.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            collection: default_collection(),
            max_results: default_max_results(),
            max_context_chars: default_max_context_chars(),
            chunk_size: default_chunk_size(),
            default_file_path: default_file_path(),
            distance_metric: DistanceMetric::default(),
            debug: false,
            ollama: OllamaConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            timeout_secs: default_timeout_secs(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            dimensions: default_dimensions(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file, apply environment overrides and
    /// validate.
    ///
    /// A missing file yields the defaults (still subject to overrides).
    /// Malformed JSON and invalid values are errors.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        let mut cfg = if Path::new(path).exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {path}"))?;
            let cfg: Config = serde_json::from_str(&data)
                .with_context(|| format!("invalid JSON in config: {path}"))?;
            info!("Loaded configuration from {path}");
            cfg
        } else {
            info!("{path} not found, using defaults");
            Self::default()
        };

        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Apply overrides from an environment-like lookup.
    ///
    /// Variable names follow the ones the tool has always honoured, so an
    /// existing `.env`-style setup keeps working.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RAGLOOP_DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = lookup("COLLECTION_NAME") {
            self.collection = v;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.ollama.embedding_model = v;
        }
        if let Some(v) = lookup("GENERATION_MODEL") {
            self.ollama.generation_model = v;
        }
        if let Some(v) = lookup("OLLAMA_HOST") {
            self.ollama.host = v;
        }
        if let Some(v) = lookup("DEFAULT_FILE_PATH") {
            self.default_file_path = v;
        }
        override_parsed(&lookup, "OLLAMA_TIMEOUT", &mut self.ollama.timeout_secs)?;
        override_parsed(&lookup, "EMBEDDING_DIMENSIONS", &mut self.ollama.dimensions)?;
        override_parsed(&lookup, "MAX_RESULTS", &mut self.max_results)?;
        override_parsed(&lookup, "MAX_RETRIEVED_DATA_LENGTH", &mut self.max_context_chars)?;
        override_parsed(&lookup, "CHUNK_SIZE", &mut self.chunk_size)?;
        override_bool(&lookup, "DEBUG_MODE", &mut self.debug)?;

        let f = &mut self.filter;
        override_bool(&lookup, "ENABLE_DISTANCE_FILTERING", &mut f.enabled)?;
        override_parsed(&lookup, "BASE_DISTANCE_THRESHOLD", &mut f.base_threshold)?;
        override_parsed(&lookup, "DYNAMIC_THRESHOLD_RATIO", &mut f.dynamic_ratio)?;
        override_parsed(
            &lookup,
            "MIN_RESULTS_FOR_FILTERING",
            &mut f.min_results_for_filtering,
        )?;
        override_parsed(&lookup, "FALLBACK_DISTANCE_THRESHOLD", &mut f.fallback_threshold)?;
        override_bool(&lookup, "DISTANCE_DEBUG_MODE", &mut f.debug)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.trim().is_empty() {
            return Err(ConfigError::Empty("db_path"));
        }
        if self.max_results == 0 {
            return Err(ConfigError::NotPositive("max_results"));
        }
        if self.max_context_chars == 0 {
            return Err(ConfigError::NotPositive("max_context_chars"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::NotPositive("chunk_size"));
        }
        if self.ollama.dimensions == 0 {
            return Err(ConfigError::NotPositive("ollama.dimensions"));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(ConfigError::NotPositive("ollama.timeout_secs"));
        }
        if self.ollama.embedding_model.trim().is_empty() {
            return Err(ConfigError::Empty("ollama.embedding_model"));
        }
        if self.ollama.generation_model.trim().is_empty() {
            return Err(ConfigError::Empty("ollama.generation_model"));
        }
        self.filter.validate()
    }
}

// ── Override helpers ─────────────────────────────────────────────────

fn override_parsed<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(var) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride { var, value: raw })?;
    }
    Ok(())
}

fn override_bool<F>(lookup: &F, var: &'static str, target: &mut bool) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(var) {
        *target = match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => return Err(ConfigError::InvalidOverride { var, value: raw }),
        };
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
