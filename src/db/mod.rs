//! Vector store backed by SQLite and sqlite-vec.
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing::info;

use crate::config::DistanceMetric;

pub mod documents;
pub mod models;
pub mod search;

use models::{Neighbor, NewDocument, StoredDocument};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    added_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_source ON documents(source);
"#;

/// Errors raised by a vector store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The capabilities the pipeline needs from a vector database.
pub trait VectorStore {
    /// Up to `k` nearest documents, ascending by distance.
    fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>, StoreError>;

    /// Insert a document, replacing any previous one with the same id.
    fn insert(&mut self, doc: &NewDocument<'_>, embedding: &[f32]) -> Result<(), StoreError>;

    /// Remove every document; returns how many were removed.
    fn delete_all(&mut self) -> Result<usize, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    /// The most recently added documents, newest first.
    fn list_recent(&self, _limit: usize) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(Vec::new())
    }
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection holding documents and their embeddings.
pub struct Db {
    pub(crate) conn: Connection,
    dimensions: usize,
    metric: DistanceMetric,
}

impl Db {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening vector store: {}", path.display());
        init_sqlite_vec();
        Self::init(Connection::open(path)?, dimensions, metric)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory(dimensions: usize, metric: DistanceMetric) -> Result<Self, StoreError> {
        init_sqlite_vec();
        Self::init(Connection::open_in_memory()?, dimensions, metric)
    }

    fn init(conn: Connection, dimensions: usize, metric: DistanceMetric) -> Result<Self, StoreError> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_documents USING vec0(embedding FLOAT[{dimensions}]);"
        ))?;

        Ok(Self {
            conn,
            dimensions,
            metric,
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), StoreError> {
        if embedding.len() == self.dimensions {
            Ok(())
        } else {
            Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            })
        }
    }
}

impl VectorStore for Db {
    fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>, StoreError> {
        self.check_dimensions(embedding)?;
        Ok(self.nearest(embedding, k)?)
    }

    fn insert(&mut self, doc: &NewDocument<'_>, embedding: &[f32]) -> Result<(), StoreError> {
        self.check_dimensions(embedding)?;
        Ok(self.upsert_document(doc, embedding)?)
    }

    fn delete_all(&mut self) -> Result<usize, StoreError> {
        Ok(self.delete_all_documents()?)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.count_documents()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self.recent_documents(limit)?)
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
