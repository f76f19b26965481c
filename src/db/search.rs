use super::{Db, models::Neighbor, serialize_vector};
use crate::config::DistanceMetric;
use rusqlite::{Result, params};

fn distance_fn(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "vec_distance_cosine",
        DistanceMetric::L2 => "vec_distance_l2",
    }
}

impl Db {
    /// Exact nearest-neighbor scan under the store's metric, ascending by distance
    pub fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT
                d.doc_id,
                d.content,
                {}(v.embedding, ?) AS distance
            FROM vec_documents v
            JOIN documents d ON v.rowid = d.id
            ORDER BY distance ASC, d.id ASC
            LIMIT ?
            "#,
            distance_fn(self.metric())
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(
            params![serialize_vector(query_vector), k as i64],
            |row| {
                Ok(Neighbor {
                    doc_id: row.get(0)?,
                    content: row.get(1)?,
                    distance: row.get(2)?,
                })
            },
        )?;

        rows.collect()
    }
}
