use chrono::{DateTime, Utc};

/// A document about to be stored.
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub doc_id: &'a str,
    /// Where the text came from (`user_input`, a file name, ...).
    pub source: &'a str,
    pub content: &'a str,
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub doc_id: String,
    pub content: String,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub doc_id: String,
    pub source: String,
    pub content: String,
    pub added_at: DateTime<Utc>,
}
