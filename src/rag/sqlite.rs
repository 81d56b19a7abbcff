//! SQLite-backed vector store.
//!
//! One database file per persist directory holds any number of named
//! collections. Search is brute force over the collection's vectors using the
//! metric the collection was created with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use super::distance::{rank_ascending, DistanceMetric};
use super::document::{EmbeddingRecord, Metadata};
use super::store::{CollectionStats, QueryMatch, VectorStore};
use crate::core::errors::{RagError, Result, StoreError};

pub const DB_FILE_NAME: &str = "vectors.db";

pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
    metric: DistanceMetric,
    persist_directory: PathBuf,
    /// Writers go one at a time; readers use the pool freely.
    write_lock: Mutex<()>,
}

impl SqliteVectorStore {
    /// Opens `collection` under `persist_directory`, creating the database
    /// file and the collection as needed.
    pub async fn create_or_open(
        persist_directory: impl AsRef<Path>,
        collection: &str,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let persist_directory = persist_directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&persist_directory).map_err(StoreError::database)?;
        let db_path = persist_directory.join(DB_FILE_NAME);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            collection: collection.to_string(),
            metric,
            persist_directory,
            write_lock: Mutex::new(()),
        };
        store.init_schema().await?;
        store.ensure_collection().await?;
        Ok(store)
    }

    pub fn persist_directory(&self) -> &Path {
        &self.persist_directory
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                dimension INTEGER,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (collection, id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, seq)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ensure_collection(&self) -> Result<()> {
        let created = sqlx::query("INSERT OR IGNORE INTO collections (name, metric) VALUES (?1, ?2)")
            .bind(&self.collection)
            .bind(self.metric.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;

        let stored: String = sqlx::query_scalar("SELECT metric FROM collections WHERE name = ?1")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;

        if stored != self.metric.as_str() {
            return Err(StoreError::MetricMismatch {
                collection: self.collection.clone(),
                stored,
                requested: self.metric.as_str().to_string(),
            }
            .into());
        }

        if created {
            tracing::info!("Created new collection: {}", self.collection);
        } else {
            tracing::info!("Loaded existing collection: {}", self.collection);
        }
        Ok(())
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        let dimension: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(dimension.map(|d| d as usize))
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_match(row: &sqlx::sqlite::SqliteRow, distance: f32) -> Result<QueryMatch> {
        let id: String = row.get("id");
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Metadata>(&metadata_str).map_err(|e| {
            StoreError::Corrupt {
                id: id.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(QueryMatch {
            id,
            text: row.get("content"),
            metadata,
            distance,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let stored_dimension: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(&self.collection)
                .fetch_one(&mut *tx)
                .await?;
        let expected = stored_dimension
            .map(|d| d as usize)
            .unwrap_or(records[0].vector.len());
        if expected == 0 {
            return Err(StoreError::ColumnMismatch(format!(
                "record '{}' has an empty vector",
                records[0].id
            ))
            .into());
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut seen = HashSet::with_capacity(records.len());

        for record in &records {
            if record.vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.vector.len(),
                }
                .into());
            }
            if !seen.insert(record.id.as_str()) {
                return Err(StoreError::DuplicateId(record.id.clone()).into());
            }

            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM records WHERE collection = ?1 AND id = ?2")
                    .bind(&self.collection)
                    .bind(&record.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_some() {
                return Err(StoreError::DuplicateId(record.id.clone()).into());
            }

            let metadata_str =
                serde_json::to_string(&record.metadata).map_err(RagError::internal)?;

            sqlx::query(
                "INSERT INTO records (collection, id, content, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.text)
            .bind(&metadata_str)
            .bind(Self::serialize_embedding(&record.vector))
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        if stored_dimension.is_none() {
            sqlx::query("UPDATE collections SET dimension = ?1 WHERE name = ?2")
                .bind(expected as i64)
                .bind(&self.collection)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            "Added {} records to collection {}",
            records.len(),
            self.collection
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension().await? {
            if vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                }
                .into());
            }
        }

        let rows = sqlx::query(
            "SELECT id, content, metadata, embedding
             FROM records
             WHERE collection = ?1
             ORDER BY seq",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<Vec<f32>> = rows
            .iter()
            .map(|row| {
                let bytes: Vec<u8> = row.get("embedding");
                Self::deserialize_embedding(&bytes)
            })
            .collect();

        let mut scored = rank_ascending(self.metric, vector, &candidates)?;
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(idx, distance)| Self::row_to_match(&rows[idx], distance))
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?1")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            collection_name: self.collection.clone(),
            document_count: self.count().await?,
            distance_metric: self.metric,
            dimension: self.dimension().await?,
            persist_directory: self.persist_directory.display().to_string(),
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for id in ids {
            removed += sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
                .bind(&self.collection)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn reset(&self) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?1")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE collections SET dimension = NULL WHERE name = ?1")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!("Reset collection: {}", self.collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store(metric: DistanceMetric) -> (TempDir, SqliteVectorStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::create_or_open(tmp.path(), "docs", metric)
            .await
            .unwrap();
        (tmp, store)
    }

    fn record(id: &str, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            text: text.to_string(),
            metadata: Metadata::new().with_title(text),
        }
    }

    fn sample_records() -> Vec<EmbeddingRecord> {
        vec![
            record("a", "functions", vec![1.0, 0.0, 0.0]),
            record("b", "lists", vec![0.7, 0.7, 0.0]),
            record("c", "classes", vec![0.0, 0.0, 1.0]),
        ]
    }

    #[tokio::test]
    async fn query_returns_closest_first() {
        let (_tmp, store) = test_store(DistanceMetric::Cosine).await;
        store.add(sample_records()).await.unwrap();

        let matches = store.query(&[1.0, 0.1, 0.0], 3).await.unwrap();

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(matches[0].metadata.title.as_deref(), Some("functions"));
    }

    #[tokio::test]
    async fn query_returns_fewer_when_collection_is_small() {
        let (_tmp, store) = test_store(DistanceMetric::L2).await;
        store.add(sample_records()).await.unwrap();

        assert_eq!(store.query(&[0.0, 0.0, 1.0], 10).await.unwrap().len(), 3);
        assert!(store.query(&[0.0, 0.0, 1.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_yields_identical_results() {
        let tmp = tempfile::tempdir().unwrap();
        let query = [0.5, 0.5, 0.1];

        let first = {
            let store = SqliteVectorStore::create_or_open(tmp.path(), "docs", DistanceMetric::Cosine)
                .await
                .unwrap();
            store.add(sample_records()).await.unwrap();
            let results = store.query(&query, 3).await.unwrap();
            store.close().await;
            results
        };

        let reopened = SqliteVectorStore::create_or_open(tmp.path(), "docs", DistanceMetric::Cosine)
            .await
            .unwrap();
        let second = reopened.query(&query, 3).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(reopened.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_ids_roll_back_the_whole_call() {
        let (_tmp, store) = test_store(DistanceMetric::Cosine).await;
        store.add(sample_records()).await.unwrap();

        let err = store
            .add(vec![
                record("d", "new", vec![0.1, 0.2, 0.3]),
                record("a", "clash", vec![0.3, 0.2, 0.1]),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Store(StoreError::DuplicateId(ref id)) if id == "a"));
        assert_eq!(store.count().await.unwrap(), 3);

        let err = store
            .add(vec![
                record("e", "x", vec![0.1, 0.2, 0.3]),
                record("e", "y", vec![0.1, 0.2, 0.3]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Store(StoreError::DuplicateId(_))));
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn first_insert_pins_dimension() {
        let (_tmp, store) = test_store(DistanceMetric::Cosine).await;
        assert_eq!(store.stats().await.unwrap().dimension, None);

        store.add(sample_records()).await.unwrap();
        assert_eq!(store.stats().await.unwrap().dimension, Some(3));

        let err = store
            .add(vec![record("z", "wide", vec![1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::Store(StoreError::DimensionMismatch { expected: 3, actual: 4 })
        ));

        let err = store.query(&[1.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::Store(StoreError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn reopening_with_another_metric_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::create_or_open(tmp.path(), "docs", DistanceMetric::Cosine)
            .await
            .unwrap();
        store.close().await;

        let err = SqliteVectorStore::create_or_open(tmp.path(), "docs", DistanceMetric::L2)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Store(StoreError::MetricMismatch { .. })));
    }

    #[tokio::test]
    async fn collections_in_one_file_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let python = SqliteVectorStore::create_or_open(tmp.path(), "python", DistanceMetric::Cosine)
            .await
            .unwrap();
        let rust = SqliteVectorStore::create_or_open(tmp.path(), "rust", DistanceMetric::L2)
            .await
            .unwrap();

        python.add(sample_records()).await.unwrap();
        rust.add(vec![record("a", "ownership", vec![1.0, 1.0])]).await.unwrap();

        assert_eq!(python.count().await.unwrap(), 3);
        assert_eq!(rust.count().await.unwrap(), 1);
        assert_eq!(rust.stats().await.unwrap().dimension, Some(2));
    }

    #[tokio::test]
    async fn delete_and_reset() {
        let (_tmp, store) = test_store(DistanceMetric::Cosine).await;
        store.add(sample_records()).await.unwrap();

        let removed = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 2);

        store.reset().await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.dimension, None);
        assert_eq!(stats.distance_metric, DistanceMetric::Cosine);
    }

    #[tokio::test]
    async fn add_columns_rejects_ragged_input() {
        let (_tmp, store) = test_store(DistanceMetric::Cosine).await;

        let err = store
            .add_columns(
                vec!["a".into(), "b".into()],
                vec![vec![1.0, 0.0]],
                vec!["x".into(), "y".into()],
                vec![Metadata::new(), Metadata::new()],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Store(StoreError::ColumnMismatch(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_readers_see_the_same_results() {
        let (_tmp, store) = test_store(DistanceMetric::Cosine).await;
        store.add(sample_records()).await.unwrap();
        let query = [0.2, 0.9, 0.1];

        let (a, b, c) = tokio::join!(
            store.query(&query, 2),
            store.query(&query, 2),
            store.query(&query, 2)
        );

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
    }
}
