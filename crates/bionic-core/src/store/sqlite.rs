//! SQLite-backed vector store.
//!
//! Records are persisted with JSON-encoded embeddings and metadata; similarity
//! queries scan the caller's rows and rank them by cosine distance in process.
//!
//! Database location priority:
//! 1. BIONIC_DATABASE_PATH env var
//! 2. ~/.bionic/memory.db

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use super::{rank_by_distance, Selector, VectorStore, WhereFilter};
use crate::error::{Error, Result};
use crate::types::{MemoryRecord, NewDocument, RecordMetadata};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS memory_collection (
        name TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS memory_record (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        summary TEXT NOT NULL,
        embedding_json TEXT NOT NULL,
        metadata_json TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );
    CREATE INDEX IF NOT EXISTS idx_memory_record_user
        ON memory_record (collection, user_id);
";

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All operations acquire the lock.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open the store at its default location, creating it if needed
    pub fn open() -> Result<Self> {
        Self::open_path(&Self::default_path())
    }

    /// Open the store at a specific path
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "Opened SQLite vector store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default database path
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("BIONIC_DATABASE_PATH") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bionic")
            .join("memory.db")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    fn ensure_collection(conn: &Connection, name: &str) -> Result<()> {
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM memory_collection WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        exists
            .map(|_| ())
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    fn map_record(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn decode(raw: (String, String, String, String)) -> Result<MemoryRecord> {
        let (id, summary, embedding_json, metadata_json) = raw;
        let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
        let metadata: RecordMetadata = serde_json::from_str(&metadata_json)?;
        Ok(MemoryRecord::new(id, summary, metadata).with_embedding(embedding))
    }

    fn load(&self, collection: &str, selector: &Selector) -> Result<Vec<MemoryRecord>> {
        let conn = self.lock()?;
        Self::ensure_collection(&conn, collection)?;

        let rows = match selector {
            Selector::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT id, summary, embedding_json, metadata_json FROM memory_record
                     WHERE collection = ? AND id IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let bind = std::iter::once(collection).chain(ids.iter().map(String::as_str));
                stmt.query_map(params_from_iter(bind), Self::map_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            Selector::Where(WhereFilter { user_id: Some(uid) }) => {
                let mut stmt = conn.prepare(
                    "SELECT id, summary, embedding_json, metadata_json FROM memory_record
                     WHERE collection = ?1 AND user_id = ?2 ORDER BY id",
                )?;
                stmt.query_map(params![collection, uid], Self::map_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            Selector::Where(WhereFilter { user_id: None }) | Selector::All => {
                let mut stmt = conn.prepare(
                    "SELECT id, summary, embedding_json, metadata_json FROM memory_record
                     WHERE collection = ?1 ORDER BY id",
                )?;
                stmt.query_map(params![collection], Self::map_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        rows.into_iter().map(Self::decode).collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO memory_collection (name, created_at) VALUES (?1, ?2)",
            params![name, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn add(&self, collection: &str, documents: Vec<NewDocument>) -> Result<()> {
        let mut conn = self.lock()?;
        Self::ensure_collection(&conn, collection)?;

        let tx = conn.transaction()?;
        for doc in &documents {
            tx.execute(
                "INSERT OR REPLACE INTO memory_record
                    (collection, id, user_id, summary, embedding_json, metadata_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    collection,
                    doc.id,
                    doc.metadata.user_id,
                    doc.summary,
                    serde_json::to_string(&doc.embedding)?,
                    serde_json::to_string(&doc.metadata)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<MemoryRecord>> {
        let selector = match filter {
            Some(f) if !f.is_empty() => Selector::Where(f.clone()),
            _ => Selector::All,
        };
        let candidates = self.load(collection, &selector)?;
        Ok(rank_by_distance(
            candidates.into_iter().filter(|r| r.has_embedding()),
            embedding,
            n_results,
        ))
    }

    async fn get(&self, collection: &str, selector: &Selector) -> Result<Vec<MemoryRecord>> {
        self.load(collection, selector)
    }

    async fn update(&self, collection: &str, updates: Vec<(String, RecordMetadata)>) -> Result<()> {
        let mut conn = self.lock()?;
        Self::ensure_collection(&conn, collection)?;

        let tx = conn.transaction()?;
        for (id, metadata) in &updates {
            tx.execute(
                "UPDATE memory_record SET metadata_json = ?1, user_id = ?2
                 WHERE collection = ?3 AND id = ?4",
                params![serde_json::to_string(metadata)?, metadata.user_id, collection, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, collection: &str, selector: &Selector) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .load(collection, selector)?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            let removed = tx.execute(
                "DELETE FROM memory_record WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            if removed > 0 {
                deleted.push(id);
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        Self::ensure_collection(&conn, collection)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_record WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;
    use chrono::Utc;
    use tempfile::TempDir;

    fn doc(id: &str, user: &str, embedding: Vec<f32>) -> NewDocument {
        NewDocument {
            id: id.to_string(),
            summary: format!("summary {}", id),
            embedding,
            metadata: RecordMetadata::fresh(id, SourceType::Agent, user, Utc::now()),
        }
    }

    fn open_temp() -> (TempDir, SqliteVectorStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open_path(&dir.path().join("nested/memory.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.db");
        {
            let store = SqliteVectorStore::open_path(&path).unwrap();
            store.get_or_create_collection("lt").await.unwrap();
            store.add("lt", vec![doc("a", "alice", vec![0.5, 0.5])]).await.unwrap();
        }

        let reopened = SqliteVectorStore::open_path(&path).unwrap();
        let got = reopened.get("lt", &Selector::ids(["a"])).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].summary, "summary a");
        assert_eq!(got[0].metadata.source_type, SourceType::Agent);
        assert_eq!(got[0].embedding.as_deref(), Some(&[0.5f32, 0.5][..]));
    }

    #[tokio::test]
    async fn test_query_filters_user() {
        let (_dir, store) = open_temp();
        store.get_or_create_collection("st").await.unwrap();
        store
            .add(
                "st",
                vec![
                    doc("a", "alice", vec![1.0, 0.0]),
                    doc("b", "bob", vec![1.0, 0.0]),
                    doc("c", "alice", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .query("st", &[1.0, 0.0], 5, Some(&WhereFilter::user("alice")))
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_dir, store) = open_temp();
        store.get_or_create_collection("lt").await.unwrap();
        store
            .add("lt", vec![doc("a", "alice", vec![1.0]), doc("b", "bob", vec![1.0])])
            .await
            .unwrap();

        let mut meta = store.get("lt", &Selector::ids(["a"])).await.unwrap()[0]
            .metadata
            .clone();
        meta.valid_access_count = 2.5;
        store.update("lt", vec![("a".into(), meta)]).await.unwrap();
        let got = store.get("lt", &Selector::ids(["a"])).await.unwrap();
        assert_eq!(got[0].metadata.valid_access_count, 2.5);

        let deleted = store
            .delete("lt", &Selector::Where(WhereFilter::user("bob")))
            .await
            .unwrap();
        assert_eq!(deleted, vec!["b".to_string()]);
        assert_eq!(store.count("lt").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_repeated_id_once() {
        let (_dir, store) = open_temp();
        store.get_or_create_collection("lt").await.unwrap();
        store.add("lt", vec![doc("a", "alice", vec![1.0])]).await.unwrap();

        let deleted = store.delete("lt", &Selector::ids(["a", "a"])).await.unwrap();
        assert_eq!(deleted, vec!["a".to_string()]);
        assert_eq!(store.count("lt").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let (_dir, store) = open_temp();
        assert!(store.count("missing").await.unwrap_err().is_not_found());
        assert!(store.get("missing", &Selector::ids(Vec::<String>::new())).await.is_err());
    }
}
