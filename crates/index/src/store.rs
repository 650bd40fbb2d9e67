use crate::similarity::{decode_vector, encode_vector};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use study_models::{ChunkMeta, StudyError};
use tracing::{info, instrument};

const MIGRATION_001_INDEX: &str = include_str!("../migrations/001_index.sql");

/// A chunk ready to be written: text, metadata and its embedding.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document: String,
    pub meta: ChunkMeta,
    pub embedding: Vec<f32>,
}

/// A stored chunk read back with its embedding.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub document: String,
    pub meta: ChunkMeta,
    pub embedding: Vec<f32>,
}

fn index_error(e: sqlx::Error) -> StudyError {
    StudyError::IndexError {
        reason: e.to_string(),
    }
}

/// SQLite-backed chunk store shared by every job's collection.
#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    /// Open (creating if needed) `<work_dir>/chroma/index.sqlite3`.
    pub async fn open(work_dir: &Path) -> Result<Self, StudyError> {
        let dir = work_dir.join("chroma");
        std::fs::create_dir_all(&dir)?;
        let options = SqliteConnectOptions::new()
            .filename(dir.join("index.sqlite3"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(index_error)?;
        Self::from_pool(pool).await
    }

    /// Connect to an explicit database URL; in-memory databases get a
    /// single connection so every query sees the same data.
    pub async fn connect(url: &str) -> Result<Self, StudyError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(index_error)?
            .create_if_missing(true);
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(index_error)?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StudyError> {
        sqlx::query(MIGRATION_001_INDEX)
            .execute(&pool)
            .await
            .map_err(index_error)?;
        Ok(Self { pool })
    }

    pub async fn ensure_collection(&self, name: &str) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO collections (name, metric, created_at) VALUES (?, 'cosine', ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(index_error)?;
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, StudyError> {
        let rows = sqlx::query("SELECT name FROM collections ORDER BY created_at, name")
            .fetch_all(&self.pool)
            .await
            .map_err(index_error)?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(index_error))
            .collect()
    }

    /// Insert or replace chunks by id, in one transaction.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert(&self, collection: &str, records: &[ChunkRecord]) -> Result<(), StudyError> {
        let mut tx = self.pool.begin().await.map_err(index_error)?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, collection, document, docset_id, source, chunk, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    collection = excluded.collection,
                    document = excluded.document,
                    docset_id = excluded.docset_id,
                    source = excluded.source,
                    chunk = excluded.chunk,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(collection)
            .bind(&record.document)
            .bind(&record.meta.docset_id)
            .bind(&record.meta.source)
            .bind(record.meta.chunk)
            .bind(record.embedding.len() as i64)
            .bind(encode_vector(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(index_error)?;
        }
        tx.commit().await.map_err(index_error)?;
        Ok(())
    }

    /// Chunks of one docset in insertion order, optionally capped.
    pub async fn docset_chunks(
        &self,
        collection: &str,
        docset_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredChunk>, StudyError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT document, docset_id, source, chunk, embedding FROM chunks WHERE collection = ? AND docset_id = ? ORDER BY rowid LIMIT ?",
        )
        .bind(collection)
        .bind(docset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(index_error)?;

        rows.iter()
            .map(|row| {
                let blob: Vec<u8> = row.try_get("embedding").map_err(index_error)?;
                Ok(StoredChunk {
                    document: row.try_get("document").map_err(index_error)?,
                    meta: ChunkMeta {
                        docset_id: row.try_get("docset_id").map_err(index_error)?,
                        source: row.try_get("source").map_err(index_error)?,
                        chunk: row.try_get("chunk").map_err(index_error)?,
                    },
                    embedding: decode_vector(&blob),
                })
            })
            .collect()
    }

    /// Remove a collection and its chunks. Returns whether it existed.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, name: &str) -> Result<bool, StudyError> {
        let mut tx = self.pool.begin().await.map_err(index_error)?;
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(index_error)?;
        let result = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(index_error)?;
        tx.commit().await.map_err(index_error)?;

        let existed = result.rows_affected() > 0;
        if existed {
            info!("Deleted index collection {}", name);
        }
        Ok(existed)
    }
}
