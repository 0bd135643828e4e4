//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Records live in `vector_records` (embedding stored as a little-endian
//! f32 BLOB). Index-wide state lives in `index_meta`:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `metric` | Always `cosine`; checked on open |
//! | `model` | Embedding model the index was built with; checked on open |
//! | `dims` | Dimensionality, fixed by config or by the first write |
//! | `fault_expected`, `fault_actual` | Present while the index is faulted |
//!
//! Each `write` runs in one transaction that takes the database write lock
//! before reading any state, so a batch is either fully committed or not
//! at all, and two writers cannot both fix the dimensionality. Search is
//! brute-force cosine similarity over the tenant's rows.

use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};

use ragdesk_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use ragdesk_core::index::{rank, validate_batch, Metric, VectorIndex, WriteStats};
use ragdesk_core::models::{Chunk, ScoredChunk, TenantId};
use ragdesk_core::{RagError, Result};

const KEY_METRIC: &str = "metric";
const KEY_MODEL: &str = "model";
const KEY_DIMS: &str = "dims";
const KEY_FAULT_EXPECTED: &str = "fault_expected";
const KEY_FAULT_ACTUAL: &str = "fault_actual";

/// SQLite implementation of [`VectorIndex`].
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open the index stored in `pool`, binding it to `model`.
    ///
    /// Fails if the stored metric or model differs, or if `dims` conflicts
    /// with the stored dimensionality. The schema must already exist.
    pub async fn open(pool: SqlitePool, model: &str, dims: Option<usize>) -> Result<Self> {
        let mut conn = pool.acquire().await.map_err(RagError::storage)?;

        let metric = Metric::Cosine.as_str();
        match get_meta(&mut conn, KEY_METRIC).await? {
            Some(stored) if stored != metric => {
                return Err(RagError::storage(format!(
                    "index uses metric '{}', expected '{}'",
                    stored, metric
                )))
            }
            Some(_) => {}
            None => set_meta(&mut conn, KEY_METRIC, metric).await?,
        }

        match get_meta(&mut conn, KEY_MODEL).await? {
            Some(stored) if stored != model => {
                return Err(RagError::storage(format!(
                    "index was built with embedding model '{}', configured model is '{}'",
                    stored, model
                )))
            }
            Some(_) => {}
            None => set_meta(&mut conn, KEY_MODEL, model).await?,
        }

        match (stored_dims(&mut conn).await?, dims) {
            (Some(stored), Some(configured)) if stored != configured => {
                return Err(RagError::EmbeddingDimensionMismatch {
                    expected: stored,
                    actual: configured,
                })
            }
            (None, Some(configured)) => {
                set_meta(&mut conn, KEY_DIMS, &configured.to_string()).await?
            }
            _ => {}
        }

        drop(conn);
        Ok(Self { pool })
    }

    /// The latched dimension fault, if any, as `(expected, actual)`.
    pub async fn fault(&self) -> Result<Option<(usize, usize)>> {
        let mut conn = self.pool.acquire().await.map_err(RagError::storage)?;
        read_fault(&mut conn).await
    }

    /// Total number of records across all tenants.
    pub async fn total(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_records")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(n as usize)
    }

    async fn latch_fault(&self, expected: usize, actual: usize) -> Result<()> {
        tracing::error!(expected, actual, "embedding dimension mismatch; index writes disabled until the fault is cleared");
        let mut conn = self.pool.acquire().await.map_err(RagError::storage)?;
        set_meta(&mut conn, KEY_FAULT_EXPECTED, &expected.to_string()).await?;
        set_meta(&mut conn, KEY_FAULT_ACTUAL, &actual.to_string()).await
    }

    /// Latch the fault, logging rather than returning a storage failure so
    /// the caller still sees the dimension mismatch.
    async fn latch_fault_logged(&self, expected: usize, actual: usize) {
        if let Err(e) = self.latch_fault(expected, actual).await {
            tracing::error!(error = %e, "failed to persist index fault");
        }
    }

    async fn write_in_tx(
        conn: &mut SqliteConnection,
        tenant: &TenantId,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<WriteStats> {
        // Take the write lock before reading any state.
        sqlx::query("UPDATE index_meta SET value = value WHERE key = ?")
            .bind(KEY_METRIC)
            .execute(&mut *conn)
            .await
            .map_err(RagError::storage)?;

        if let Some((expected, actual)) = read_fault(conn).await? {
            return Err(RagError::EmbeddingDimensionMismatch { expected, actual });
        }

        let stored = stored_dims(conn).await?;
        let dims = validate_batch(stored, tenant, chunks, embeddings)?;
        if chunks.is_empty() {
            return Ok(WriteStats::default());
        }

        let mut stats = WriteStats::default();
        for (chunk, vector) in chunks.iter().zip(embeddings.iter()) {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO vector_records
                    (chunk_id, tenant_id, document_id, position, char_offset, page, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(tenant.as_str())
            .bind(&chunk.document_id)
            .bind(chunk.position as i64)
            .bind(chunk.char_offset as i64)
            .bind(chunk.page.map(i64::from))
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *conn)
            .await
            .map_err(RagError::storage)?;

            if result.rows_affected() == 0 {
                stats.skipped += 1;
            } else {
                stats.inserted += 1;
            }
        }

        if stored.is_none() {
            set_meta(conn, KEY_DIMS, &dims.to_string()).await?;
        }
        Ok(stats)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn dims(&self) -> Result<Option<usize>> {
        let mut conn = self.pool.acquire().await.map_err(RagError::storage)?;
        stored_dims(&mut conn).await
    }

    async fn write(
        &self,
        tenant: &TenantId,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<WriteStats> {
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        match Self::write_in_tx(&mut *tx, tenant, chunks, embeddings).await {
            Ok(stats) => {
                tx.commit().await.map_err(RagError::storage)?;
                tracing::debug!(tenant = %tenant, inserted = stats.inserted, skipped = stats.skipped, "index write committed");
                Ok(stats)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(error = %e, "index write rollback failed");
                }
                if let RagError::EmbeddingDimensionMismatch { expected, actual } = err {
                    self.latch_fault_logged(expected, actual).await;
                }
                Err(err)
            }
        }
    }

    async fn query(
        &self,
        tenant: &TenantId,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if let Some(expected) = self.dims().await? {
            if query_vec.len() != expected {
                self.latch_fault_logged(expected, query_vec.len()).await;
                return Err(RagError::EmbeddingDimensionMismatch {
                    expected,
                    actual: query_vec.len(),
                });
            }
        }

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, document_id, position, char_offset, page, text, hash, embedding
            FROM vector_records
            WHERE tenant_id = ?
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        if rows.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let position: i64 = row.get("position");
                let char_offset: i64 = row.get("char_offset");
                let page: Option<i64> = row.get("page");
                ScoredChunk {
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                    chunk: Chunk {
                        id: row.get("chunk_id"),
                        document_id: row.get("document_id"),
                        tenant_id: tenant.clone(),
                        position: position as usize,
                        char_offset: char_offset as usize,
                        page: page.map(|p| p as u32),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                }
            })
            .collect();

        Ok(rank(candidates, k))
    }

    async fn delete_document(&self, tenant: &TenantId, document_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM vector_records WHERE tenant_id = ? AND document_id = ?")
            .bind(tenant.as_str())
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, tenant: &TenantId) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE tenant_id = ?")
            .bind(tenant.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(n as usize)
    }

    async fn clear_fault(&self) -> Result<()> {
        sqlx::query("DELETE FROM index_meta WHERE key IN (?, ?)")
            .bind(KEY_FAULT_EXPECTED)
            .bind(KEY_FAULT_ACTUAL)
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;
        tracing::info!("index fault cleared");
        Ok(())
    }
}

async fn get_meta(conn: &mut SqliteConnection, key: &str) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(RagError::storage)
}

async fn set_meta(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO index_meta (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await
    .map_err(RagError::storage)?;
    Ok(())
}

async fn get_usize(conn: &mut SqliteConnection, key: &str) -> Result<Option<usize>> {
    match get_meta(conn, key).await? {
        Some(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|_| RagError::storage(format!("index_meta.{} is not a number: '{}'", key, v))),
        None => Ok(None),
    }
}

async fn stored_dims(conn: &mut SqliteConnection) -> Result<Option<usize>> {
    get_usize(conn, KEY_DIMS).await
}

async fn read_fault(conn: &mut SqliteConnection) -> Result<Option<(usize, usize)>> {
    let expected = get_usize(conn, KEY_FAULT_EXPECTED).await?;
    let actual = get_usize(conn, KEY_FAULT_ACTUAL).await?;
    Ok(expected.zip(actual))
}
