use super::{Db, models::*, serialize_vector};
use chrono::{DateTime, Utc};
use rusqlite::{Result, params};

impl Db {
    /// Inserts or replaces a document together with its embedding
    pub(crate) fn upsert_document(&mut self, doc: &NewDocument<'_>, embedding: &[f32]) -> Result<()> {
        let tx = self.conn.transaction()?;

        let row_id: i64 = tx.query_row(
            r#"
            INSERT INTO documents (doc_id, source, content, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(doc_id) DO UPDATE SET
                source = excluded.source,
                content = excluded.content,
                added_at = excluded.added_at
            RETURNING id
            "#,
            params![doc.doc_id, doc.source, doc.content, Utc::now()],
            |row| row.get(0),
        )?;

        // vec0 rows are not covered by the upsert
        tx.execute("DELETE FROM vec_documents WHERE rowid = ?", params![row_id])?;
        tx.execute(
            "INSERT INTO vec_documents (rowid, embedding) VALUES (?, ?)",
            params![row_id, serialize_vector(embedding)],
        )?;

        tx.commit()
    }

    /// Deletes every document and embedding, returning how many documents were removed
    pub(crate) fn delete_all_documents(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM vec_documents", [])?;
        let removed = tx.execute("DELETE FROM documents", [])?;
        tx.commit()?;
        Ok(removed)
    }

    pub(crate) fn count_documents(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// The most recently added documents, newest first
    pub fn recent_documents(&self, limit: usize) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_id, source, content, added_at FROM documents ORDER BY added_at DESC, id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let added_at: DateTime<Utc> = row.get(3)?;
            Ok(StoredDocument {
                doc_id: row.get(0)?,
                source: row.get(1)?,
                content: row.get(2)?,
                added_at,
            })
        })?;

        rows.collect()
    }
}
