//! SQLite implementation of the CheckpointStore trait.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`. Each record is stored CBOR-encoded.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{CheckpointRecord, CheckpointStore};

/// SQLite-backed checkpoint store.
///
/// Thread-safe via internal Mutex.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await?
    }
}

fn encode_record(record: &CheckpointRecord) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_record(bytes: &[u8]) -> Result<CheckpointRecord> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(&self, checkpoint_index: u64, record: &CheckpointRecord) -> Result<()> {
        let encoded = encode_record(record)?;
        let hash = record.hash;

        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO checkpoints (checkpoint_index, hash, record, written_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    checkpoint_index as i64,
                    hash.as_bytes().as_slice(),
                    encoded,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, checkpoint_index: u64) -> Result<Option<CheckpointRecord>> {
        self.run(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM checkpoints WHERE checkpoint_index = ?1",
                    params![checkpoint_index as i64],
                    |row| row.get(0),
                )
                .optional()?;
            bytes.as_deref().map(decode_record).transpose()
        })
        .await
    }

    async fn floor(&self, checkpoint_index: u64) -> Result<Option<(u64, CheckpointRecord)>> {
        self.run(move |conn| {
            let row: Option<(i64, Vec<u8>)> = conn
                .query_row(
                    "SELECT checkpoint_index, record FROM checkpoints
                     WHERE checkpoint_index <= ?1
                     ORDER BY checkpoint_index DESC LIMIT 1",
                    params![checkpoint_index as i64],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match row {
                Some((k, bytes)) => Ok(Some((k as u64, decode_record(&bytes)?))),
                None => Ok(None),
            }
        })
        .await
    }

    async fn len(&self) -> Result<u64> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM checkpoints", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.run(|conn| {
            conn.execute("DELETE FROM checkpoints", [])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_chain_core::{Entry, EntryHash};
    use serde_json::json;

    fn record(i: u64) -> CheckpointRecord {
        let entry = Entry::new(i, 1000 + i as i64, json!({ "id": i }), EntryHash::from_bytes([i as u8; 32]));
        CheckpointRecord::from_entry(&entry).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteCheckpointStore::open_memory().unwrap();
        store.put(0, &record(2)).await.unwrap();

        assert_eq!(store.get(0).await.unwrap(), Some(record(2)));
        assert_eq!(store.get(1).await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = SqliteCheckpointStore::open_memory().unwrap();
        store.put(0, &record(2)).await.unwrap();
        store.put(0, &record(5)).await.unwrap();

        assert_eq!(store.get(0).await.unwrap(), Some(record(5)));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_floor_picks_nearest_at_or_before() {
        let store = SqliteCheckpointStore::open_memory().unwrap();
        store.put(0, &record(2)).await.unwrap();
        store.put(1, &record(5)).await.unwrap();
        store.put(4, &record(14)).await.unwrap();

        assert_eq!(store.floor(1).await.unwrap(), Some((1, record(5))));
        assert_eq!(store.floor(3).await.unwrap(), Some((1, record(5))));
        assert_eq!(store.floor(100).await.unwrap(), Some((4, record(14))));

        store.clear().await.unwrap();
        assert_eq!(store.floor(100).await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store.put(0, &record(2)).await.unwrap();
            store.put(1, &record(5)).await.unwrap();
        }

        let store = SqliteCheckpointStore::open(&path).unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
        let snapshot = store.get(1).await.unwrap().unwrap().to_snapshot().unwrap();
        assert_eq!(snapshot.value, json!({ "id": 5 }));
        assert!(snapshot.is_well_formed());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_serialization_error() {
        let store = SqliteCheckpointStore::open_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO checkpoints (checkpoint_index, hash, record, written_at)
                 VALUES (0, x'00', x'ff', 0)",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            store.get(0).await,
            Err(StoreError::Serialization(_))
        ));
    }
}
