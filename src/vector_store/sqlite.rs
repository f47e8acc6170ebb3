//! SQLite-based vector index implementation.
//!
//! Vectors are stored as little-endian `f32` blobs and cosine similarity is
//! computed in Rust over the rows of a single document. Connections come from
//! an r2d2 pool and every SQLite call runs on the blocking thread pool.
//!
//! Writers take the write gate and replace a document's rows inside one
//! transaction. Readers never take the gate. With WAL enabled each read sees
//! the last committed state, so a search neither waits for a write to another
//! document nor observes a half-written one.

use super::{build_chunks, check_dimension, rank, Chunk, IndexedDocument, SearchResult, VectorIndex};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);

    CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Applied to every pooled connection.
const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 5000;";

/// Connections kept for a file-backed index.
const POOL_SIZE: u32 = 8;

type IndexPool = Pool<SqliteConnectionManager>;

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    pool: IndexPool,
    write_gate: Arc<Mutex<()>>,
    dimensions: usize,
}

impl SqliteVectorIndex {
    /// Open (or create) an index file bound to an embedding model.
    ///
    /// Fails with a configuration error if the file was built with a different
    /// model or dimension.
    #[instrument(skip_all)]
    pub fn open(path: &Path, model: &str, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        {
            let conn = Connection::open(path)?;
            // WAL is persistent, so pooled connections pick it up
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            Self::prepare(&conn, model, dimensions)?;
        }

        let manager =
            SqliteConnectionManager::file(path).with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .build(manager)
            .map_err(pool_error)?;

        info!("Opened SQLite vector index at {:?}", path);
        Ok(Self::from_pool(pool, dimensions))
    }

    /// Create an in-memory SQLite index (useful for testing).
    ///
    /// An in-memory database lives in a single connection, so reads and
    /// writes share it.
    pub fn in_memory(model: &str, dimensions: usize) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(SqliteConnectionManager::memory())
            .map_err(pool_error)?;

        {
            let conn = pool.get().map_err(pool_error)?;
            Self::prepare(&conn, model, dimensions)?;
        }

        Ok(Self::from_pool(pool, dimensions))
    }

    fn from_pool(pool: IndexPool, dimensions: usize) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
            dimensions,
        }
    }

    fn prepare(conn: &Connection, model: &str, dimensions: usize) -> Result<()> {
        conn.execute_batch(SCHEMA)?;
        Self::bind_model(conn, model, dimensions)
    }

    /// Record the embedding model on first use and verify it afterwards.
    fn bind_model(conn: &Connection, model: &str, dimensions: usize) -> Result<()> {
        let stored_model = Self::meta(conn, "embedding_model")?;
        let stored_dimensions = Self::meta(conn, "dimensions")?;

        match (stored_model, stored_dimensions) {
            (Some(stored_model), Some(stored_dimensions)) => {
                if stored_model != model || stored_dimensions != dimensions.to_string() {
                    return Err(DocentError::Config(format!(
                        "Index was built with {} ({} dimensions) but the configured embedder is {} ({} dimensions). \
                         Re-ingest into a new index file or restore the embedding settings.",
                        stored_model, stored_dimensions, model, dimensions
                    )));
                }
            }
            _ => {
                conn.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('embedding_model', ?1)",
                    params![model],
                )?;
                conn.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )?;
            }
        }

        Ok(())
    }

    fn meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Run a read on a pooled connection without taking the write gate.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(pool_error)?;
            f(&*conn)
        })
        .await
        .map_err(|e| DocentError::VectorStore(format!("Index task failed: {}", e)))?
    }

    /// Run a write on a pooled connection while holding the write gate.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let gate = Arc::clone(&self.write_gate);
        tokio::task::spawn_blocking(move || {
            let _guard = gate
                .lock()
                .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
            let mut conn = pool.get().map_err(pool_error)?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| DocentError::VectorStore(format!("Index task failed: {}", e)))?
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn load_chunks(conn: &Connection, document_id: &str) -> Result<Vec<Chunk>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, document_id, chunk_index, text, embedding
            FROM chunks
            WHERE document_id = ?1
            ORDER BY chunk_index
            "#,
        )?;

        let rows = stmt.query_map(params![document_id], |row| {
            let chunk_index: i64 = row.get(2)?;
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok(Chunk {
                id: row.get(0)?,
                document_id: row.get(1)?,
                index: chunk_index as usize,
                text: row.get(3)?,
                vector: Self::bytes_to_embedding(&embedding_bytes),
            })
        })?;

        let chunks = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }
}

fn pool_error(e: r2d2::Error) -> DocentError {
    DocentError::VectorStore(format!("Failed to get connection: {}", e))
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    #[instrument(skip(self, chunks, vectors), fields(count = chunks.len()))]
    async fn upsert(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>> {
        let built = build_chunks(document_id, chunks, vectors, self.dimensions)?;
        let ids: Vec<String> = built.iter().map(|c| c.id.clone()).collect();
        let indexed_at = Utc::now().to_rfc3339();
        let doc = document_id.to_string();

        self.write(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![doc])?;

            {
                let mut insert = tx.prepare(
                    r#"
                    INSERT INTO chunks (id, document_id, chunk_index, text, embedding, indexed_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;
                for chunk in &built {
                    insert.execute(params![
                        chunk.id,
                        chunk.document_id,
                        chunk.index as i64,
                        chunk.text,
                        Self::embedding_to_bytes(&chunk.vector),
                        indexed_at,
                    ])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await?;

        info!("Indexed {} chunks for document {}", ids.len(), document_id);
        Ok(ids)
    }

    #[instrument(skip(self, query_vector))]
    async fn search(
        &self,
        query_vector: &[f32],
        document_id: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        check_dimension(self.dimensions, query_vector)?;

        let doc = document_id.to_string();
        let chunks = self.read(move |conn| Self::load_chunks(conn, &doc)).await?;

        let results = rank(query_vector, &chunks, top_k);
        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete(&self, document_id: &str) -> Result<()> {
        let doc = document_id.to_string();
        let deleted = self
            .write(move |conn| {
                let deleted = conn.execute("DELETE FROM chunks WHERE document_id = ?1", params![doc])?;
                Ok(deleted)
            })
            .await?;
        info!("Deleted {} chunks for document {}", deleted, document_id);
        Ok(())
    }

    async fn chunk_count(&self, document_id: &str) -> Result<usize> {
        let doc = document_id.to_string();
        self.read(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
                params![doc],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let doc = document_id.to_string();
        self.read(move |conn| Self::load_chunks(conn, &doc)).await
    }

    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT document_id, COUNT(*) AS chunk_count, MAX(indexed_at) AS indexed_at
                FROM chunks
                GROUP BY document_id
                ORDER BY indexed_at DESC
                "#,
            )?;

            let rows = stmt.query_map([], |row| {
                let chunk_count: i64 = row.get(1)?;
                let indexed_at_str: String = row.get(2)?;
                Ok(IndexedDocument {
                    document_id: row.get(0)?,
                    chunk_count: chunk_count as usize,
                    indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?;

            let documents = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(documents)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::TransactionBehavior;
    use std::time::Duration;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sqlite_vector_index() {
        let index = SqliteVectorIndex::in_memory("test-model", 3).unwrap();

        let ids = index
            .upsert(
                "doc-1",
                &texts(&["alpha", "beta"]),
                &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec!["doc-1_0", "doc-1_1"]);

        let results = index.search(&[1.0, 0.0, 0.0], "doc-1", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "alpha");
        assert!((results[0].score - 1.0).abs() < 0.001);

        let documents = index.list_documents().await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].chunk_count, 2);

        index.delete("doc-1").await.unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], "doc-1", 5).await.unwrap().is_empty());
        assert!(index.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reupsert_replaces_rows() {
        let index = SqliteVectorIndex::in_memory("test-model", 2).unwrap();
        index
            .upsert("doc", &texts(&["a", "b", "c"]), &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .await
            .unwrap();
        index.upsert("doc", &texts(&["d"]), &[vec![0.0, 1.0]]).await.unwrap();

        let chunks = index.get_chunks("doc").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "d");
        assert_eq!(chunks[0].vector, vec![0.0, 1.0]);
        assert_eq!(index.chunk_count("doc").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_upsert_keeps_previous_rows() {
        let index = SqliteVectorIndex::in_memory("test-model", 2).unwrap();
        index.upsert("doc", &texts(&["kept"]), &[vec![1.0, 0.0]]).await.unwrap();

        let err = index
            .upsert("doc", &texts(&["a", "b"]), &[vec![1.0, 0.0], vec![1.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, DocentError::DimensionMismatch { .. }));
        assert_eq!(index.get_chunks("doc").await.unwrap()[0].text, "kept");
    }

    #[tokio::test]
    async fn test_unknown_document_and_bad_query() {
        let index = SqliteVectorIndex::in_memory("test-model", 2).unwrap();
        assert!(index.search(&[1.0, 0.0], "nope", 3).await.unwrap().is_empty());
        index.delete("nope").await.unwrap();

        let err = index.search(&[1.0, 0.0, 0.0], "nope", 3).await.unwrap_err();
        assert!(matches!(err, DocentError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[tokio::test]
    async fn test_persists_and_rejects_other_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let index = SqliteVectorIndex::open(&path, "hash-4", 4).unwrap();
            index
                .upsert("doc", &texts(&["persisted"]), &[vec![0.5, 0.5, 0.5, 0.5]])
                .await
                .unwrap();
        }

        let reopened = SqliteVectorIndex::open(&path, "hash-4", 4).unwrap();
        assert_eq!(reopened.chunk_count("doc").await.unwrap(), 1);
        drop(reopened);

        let mismatch = SqliteVectorIndex::open(&path, "text-embedding-3-small", 1536);
        assert!(matches!(mismatch, Err(DocentError::Config(_))));
    }

    #[tokio::test]
    async fn test_search_reads_committed_rows_during_open_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let index = SqliteVectorIndex::open(&path, "test-model", 2).unwrap();
        index.upsert("b", &texts(&["stable"]), &[vec![1.0, 0.0]]).await.unwrap();

        // A second writer replaces "b" and fills "a" but has not committed yet
        let mut other = Connection::open(&path).unwrap();
        let tx = other.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();
        tx.execute("DELETE FROM chunks WHERE document_id = 'b'", []).unwrap();
        tx.execute(
            "INSERT INTO chunks (id, document_id, chunk_index, text, embedding, indexed_at) \
             VALUES ('a_0', 'a', 0, 'pending', x'0000803F00000000', '2024-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();

        let gate = index.write_gate.lock().unwrap();

        let results = tokio::time::timeout(Duration::from_secs(2), index.search(&[1.0, 0.0], "b", 5))
            .await
            .expect("search waited for the writer")
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "stable");

        let pending = tokio::time::timeout(Duration::from_secs(2), index.chunk_count("a"))
            .await
            .expect("count waited for the writer")
            .unwrap();
        assert_eq!(pending, 0);

        drop(gate);
        tx.commit().unwrap();

        assert_eq!(index.chunk_count("b").await.unwrap(), 0);
        assert_eq!(index.chunk_count("a").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_and_searches() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SqliteVectorIndex::open(&dir.path().join("index.db"), "test-model", 2).unwrap());

        let old: Vec<String> = (0..50).map(|i| format!("old {}", i)).collect();
        let new: Vec<String> = (0..80).map(|i| format!("new {}", i)).collect();
        let old_vectors = vec![vec![1.0, 0.0]; old.len()];
        let new_vectors = vec![vec![0.0, 1.0]; new.len()];

        index.upsert("a", &old, &old_vectors).await.unwrap();
        index
            .upsert("b", &texts(&["one", "two", "three"]), &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .await
            .unwrap();

        let writer = {
            let index = Arc::clone(&index);
            tokio::spawn(async move {
                for round in 0..40 {
                    if round % 2 == 0 {
                        index.upsert("a", &new, &new_vectors).await.unwrap();
                    } else {
                        index.upsert("a", &old, &old_vectors).await.unwrap();
                    }
                }
            })
        };

        for _ in 0..100 {
            let other = index.search(&[1.0, 0.0], "b", 5).await.unwrap();
            assert_eq!(other.len(), 3);

            let results = index.search(&[1.0, 0.0], "a", 1000).await.unwrap();
            let olds = results.iter().filter(|r| r.text.starts_with("old")).count();
            let news = results.iter().filter(|r| r.text.starts_with("new")).count();
            assert!(
                (olds == 50 && news == 0) || (olds == 0 && news == 80),
                "saw a partial mix: {} old, {} new",
                olds,
                news
            );
        }

        writer.await.unwrap();
        assert_eq!(index.chunk_count("a").await.unwrap(), 50);
    }
}
