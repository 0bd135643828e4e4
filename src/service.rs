//! The application service object.
//!
//! [`RagService`] owns every collaborator (vector index, embedder,
//! generator, record stores) and exposes the four tenant-scoped operations
//! the HTTP surface and CLI are built on. It is constructed explicitly,
//! either from a [`Config`] with [`RagService::open`] or from injected
//! parts with [`RagService::from_parts`], and shared behind an `Arc`.

use anyhow::Context;
use sqlx::SqlitePool;
use std::sync::Arc;

use ragdesk_core::answer::answer;
use ragdesk_core::embedding::Embedder;
use ragdesk_core::generation::Generator;
use ragdesk_core::index::VectorIndex;
use ragdesk_core::models::{Answer, Document, HistoryEntry, IngestReceipt, TenantId};
use ragdesk_core::records::{DocumentStore, HistoryStore};
use ragdesk_core::Result;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::ingest::{ingest, IngestSettings, IngestTargets, Upload};
use crate::migrate;
use crate::records::{SqliteDocumentStore, SqliteHistoryStore};
use crate::sqlite_index::SqliteIndex;

/// Collaborators a [`RagService`] is assembled from.
pub struct ServiceParts {
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub documents: Arc<dyn DocumentStore>,
    pub history: Arc<dyn HistoryStore>,
}

pub struct RagService {
    parts: ServiceParts,
    settings: IngestSettings,
    top_k: usize,
    pool: Option<SqlitePool>,
}

impl RagService {
    /// Connect to the configured database, apply migrations, and build the
    /// configured providers.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let index = SqliteIndex::open(pool.clone(), embedder.model_name(), embedder.dims())
            .await
            .context("Failed to open vector index")?;

        let parts = ServiceParts {
            index: Arc::new(index),
            embedder,
            generator,
            documents: Arc::new(SqliteDocumentStore::new(pool.clone())),
            history: Arc::new(SqliteHistoryStore::new(pool.clone())),
        };

        let mut service = Self::from_parts(parts, IngestSettings::from_config(config), config.retrieval.top_k);
        service.pool = Some(pool);
        Ok(service)
    }

    pub fn from_parts(parts: ServiceParts, settings: IngestSettings, top_k: usize) -> Self {
        Self {
            parts,
            settings,
            top_k: top_k.max(1),
            pool: None,
        }
    }

    /// Release the database pool, if this service owns one.
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }

    /// Ingest one uploaded document for `tenant`.
    pub async fn submit_document(&self, tenant: &TenantId, upload: Upload) -> Result<IngestReceipt> {
        let targets = IngestTargets {
            index: self.parts.index.as_ref(),
            embedder: self.parts.embedder.as_ref(),
            documents: self.parts.documents.as_ref(),
        };
        ingest(&targets, &self.settings, tenant, upload).await
    }

    /// Answer a question from the tenant's documents and record it in the
    /// tenant's history.
    pub async fn ask(&self, tenant: &TenantId, question: &str) -> Result<Answer> {
        let answer = answer(
            self.parts.index.as_ref(),
            self.parts.embedder.as_ref(),
            self.parts.generator.as_ref(),
            tenant,
            question,
            self.top_k,
        )
        .await?;

        self.parts
            .history
            .record(&HistoryEntry {
                tenant_id: tenant.clone(),
                question: question.trim().to_string(),
                answer: answer.text.clone(),
                chunk_ids: answer.chunk_ids.clone(),
                created_at: chrono::Utc::now().timestamp(),
            })
            .await?;

        tracing::info!(
            tenant = %tenant,
            chunks = answer.chunk_ids.len(),
            grounded = answer.grounded,
            "question answered"
        );
        Ok(answer)
    }

    pub async fn list_documents(&self, tenant: &TenantId) -> Result<Vec<Document>> {
        self.parts.documents.list(tenant).await
    }

    pub async fn list_history(&self, tenant: &TenantId) -> Result<Vec<HistoryEntry>> {
        self.parts.history.list(tenant).await
    }

    /// Number of index records held for `tenant`.
    pub async fn indexed_chunks(&self, tenant: &TenantId) -> Result<usize> {
        self.parts.index.count(tenant).await
    }

    /// Re-enable index writes after a dimension fault.
    pub async fn clear_index_fault(&self) -> Result<()> {
        self.parts.index.clear_fault().await
    }
}
