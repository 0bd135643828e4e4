//! SQLite-backed [`DocumentStore`] and [`HistoryStore`].

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ragdesk_core::models::{ContentType, Document, HistoryEntry, TenantId};
use ragdesk_core::records::{DocumentStore, HistoryStore};
use ragdesk_core::{RagError, Result};

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn record(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, tenant_id, filename, content_type, byte_len, digest, chunk_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(document.tenant_id.as_str())
        .bind(&document.filename)
        .bind(document.content_type.as_str())
        .bind(document.byte_len as i64)
        .bind(&document.digest)
        .bind(document.chunk_count as i64)
        .bind(document.created_at)
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;
        Ok(())
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, filename, content_type, byte_len, digest, chunk_count, created_at
            FROM documents
            WHERE tenant_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        rows.iter()
            .map(|row| {
                let content_type: String = row.get("content_type");
                let byte_len: i64 = row.get("byte_len");
                let chunk_count: i64 = row.get("chunk_count");
                Ok(Document {
                    id: row.get("id"),
                    tenant_id: tenant.clone(),
                    filename: row.get("filename"),
                    content_type: ContentType::parse_stored(&content_type)?,
                    byte_len: byte_len as usize,
                    digest: row.get("digest"),
                    chunk_count: chunk_count as usize,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        let chunk_ids = serde_json::to_string(&entry.chunk_ids).map_err(RagError::storage)?;
        sqlx::query(
            "INSERT INTO history (tenant_id, question, answer, chunk_ids, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.tenant_id.as_str())
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(chunk_ids)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;
        Ok(())
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT question, answer, chunk_ids, created_at FROM history WHERE tenant_id = ? ORDER BY id ASC",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        rows.iter()
            .map(|row| {
                let chunk_ids: String = row.get("chunk_ids");
                Ok(HistoryEntry {
                    tenant_id: tenant.clone(),
                    question: row.get("question"),
                    answer: row.get("answer"),
                    chunk_ids: serde_json::from_str(&chunk_ids).map_err(RagError::storage)?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}
