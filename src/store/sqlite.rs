use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::domain::email::{DocumentMetadata, IndexedDocument, SearchHit};
use crate::llm::Embedder;
use crate::store::repo::{DocumentIndex, IndexOutcome};

/// Persistent vector index: one row per document with its embedding as a
/// little-endian f32 blob. Queries are brute-force nearest neighbour.
pub struct SqliteVectorStore {
    conn: Connection,
    collection: String,
    embedder: Box<dyn Embedder>,
}

impl SqliteVectorStore {
    pub fn open(path: &Path, collection: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?, collection, embedder)
    }

    #[cfg(test)]
    pub fn open_in_memory(collection: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, collection, embedder)
    }

    fn with_connection(conn: Connection, collection: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        let store = Self {
            conn,
            collection: collection.to_string(),
            embedder,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                document    TEXT NOT NULL,
                metadata    TEXT NOT NULL,
                embedding   BLOB NOT NULL,
                dim         INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )?;
        Ok(())
    }

    /// Flushes and closes the database.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow!("closing vector index: {e}"))
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE collection=?1 AND id=?2",
                params![self.collection, id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection=?1",
            params![self.collection],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    fn try_add(&self, doc: &IndexedDocument) -> Result<IndexOutcome> {
        if self.contains(&doc.id)? {
            return Ok(IndexOutcome::AlreadyIndexed);
        }
        let embedding = self.embedder.embed(&doc.document)?;
        let metadata = serde_json::to_string(&doc.metadata)?;

        let changed = self.conn.execute(
            r#"
            INSERT INTO documents (collection, id, document, metadata, embedding, dim)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(collection, id) DO NOTHING
            "#,
            params![
                self.collection,
                doc.id,
                doc.document,
                metadata,
                encode_embedding(&embedding),
                embedding.len() as i64
            ],
        )?;
        Ok(if changed == 0 {
            IndexOutcome::AlreadyIndexed
        } else {
            IndexOutcome::Inserted
        })
    }

    fn try_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let q = self.embedder.embed(query)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, document, metadata, embedding
            FROM documents
            WHERE collection=?1 AND dim=?2
            "#,
        )?;
        let mut rows = stmt.query(params![self.collection, q.len() as i64])?;

        let mut hits = Vec::new();
        while let Some(r) = rows.next()? {
            let blob: Vec<u8> = r.get(3)?;
            let metadata: String = r.get(2)?;
            hits.push(SearchHit {
                id: r.get(0)?,
                document: r.get(1)?,
                metadata: serde_json::from_str::<DocumentMetadata>(&metadata)?,
                distance: squared_l2(&q, &decode_embedding(&blob)),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    #[cfg(test)]
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl DocumentIndex for SqliteVectorStore {
    fn index(&self, id: &str, body: &str, summary: &str) -> IndexOutcome {
        let doc = IndexedDocument::new(id, body, summary);
        match self.try_add(&doc) {
            Ok(outcome) => {
                log::debug!("index {id}: {outcome:?}");
                outcome
            }
            Err(e) => {
                log::warn!("could not index message {id}: {e:#}");
                IndexOutcome::Failed
            }
        }
    }

    fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        self.try_search(query, k).unwrap_or_else(|e| {
            log::warn!("vector search failed: {e:#}");
            Vec::new()
        })
    }
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
