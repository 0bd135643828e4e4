//! Ingestion pipeline orchestration.
//!
//! Coordinates one upload end to end: size check → filename sanitization →
//! format detection → loading → chunking → batched embedding → one index
//! write → optional raw-byte archive → document record.
//!
//! Any failure aborts the upload and is returned to the caller. All vectors
//! of a document go to the index in a single `write`, which the SQLite
//! index commits atomically, so a failed upload never leaves part of its
//! batch behind.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use uuid::Uuid;

use ragdesk_core::chunk::split;
use ragdesk_core::embedding::Embedder;
use ragdesk_core::index::VectorIndex;
use ragdesk_core::models::{ContentType, Document, IngestReceipt, TenantId};
use ragdesk_core::records::DocumentStore;
use ragdesk_core::{RagError, Result};

use crate::config::Config;
use crate::loader;

/// Knobs for [`ingest`], usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub batch_size: usize,
    pub max_bytes: usize,
    pub archive_dir: Option<PathBuf>,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            batch_size: config.embedding.batch_size.max(1),
            max_bytes: config.uploads.max_bytes,
            archive_dir: config.uploads.dir.clone(),
        }
    }
}

/// One uploaded file as received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// MIME type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Components an ingestion writes through.
pub struct IngestTargets<'a> {
    pub index: &'a dyn VectorIndex,
    pub embedder: &'a dyn Embedder,
    pub documents: &'a dyn DocumentStore,
}

/// Ingest one upload for `tenant`.
pub async fn ingest(
    targets: &IngestTargets<'_>,
    settings: &IngestSettings,
    tenant: &TenantId,
    upload: Upload,
) -> Result<IngestReceipt> {
    let byte_len = upload.bytes.len();
    if byte_len > settings.max_bytes {
        return Err(RagError::PayloadTooLarge {
            size: byte_len,
            limit: settings.max_bytes,
        });
    }

    let filename = loader::sanitize_filename(&upload.filename)?;
    let content_type = ContentType::detect(&filename, upload.content_type.as_deref())?;

    let document_id = Uuid::new_v4().to_string();
    let digest = hex::encode(Sha256::digest(&upload.bytes));
    let archive_copy = settings.archive_dir.as_ref().map(|_| upload.bytes.clone());

    let segments = loader::load(&document_id, upload.bytes, content_type).await?;
    if segments.iter().all(|s| s.text.trim().is_empty()) {
        return Err(RagError::CorruptDocument(
            "document contains no extractable text".into(),
        ));
    }

    let chunks = split(
        tenant,
        &document_id,
        &digest,
        &segments,
        settings.chunk_size,
        settings.overlap,
    )?;

    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(settings.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = targets.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::provider(
                targets.embedder.model_name(),
                format!("returned {} embeddings for {} inputs", vectors.len(), texts.len()),
            ));
        }
        embeddings.extend(vectors);
    }

    let stats = targets.index.write(tenant, &chunks, &embeddings).await?;

    if let (Some(dir), Some(bytes)) = (&settings.archive_dir, archive_copy) {
        tokio::fs::create_dir_all(dir).await.map_err(RagError::storage)?;
        tokio::fs::write(dir.join(&document_id), bytes)
            .await
            .map_err(RagError::storage)?;
    }

    let document = Document {
        id: document_id.clone(),
        tenant_id: tenant.clone(),
        filename,
        content_type,
        byte_len,
        digest,
        chunk_count: chunks.len(),
        created_at: chrono::Utc::now().timestamp(),
    };
    targets.documents.record(&document).await?;

    tracing::info!(
        tenant = %tenant,
        document_id = %document_id,
        filename = %document.filename,
        chunks = chunks.len(),
        inserted = stats.inserted,
        skipped = stats.skipped,
        "document ingested"
    );

    Ok(IngestReceipt {
        document_id,
        chunk_count: chunks.len(),
    })
}
