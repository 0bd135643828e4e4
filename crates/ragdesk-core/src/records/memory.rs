//! In-memory [`DocumentStore`] and [`HistoryStore`].

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{Document, HistoryEntry, TenantId};

use super::{DocumentStore, HistoryStore};

fn poisoned() -> RagError {
    RagError::storage("in-memory record store lock poisoned")
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn record(&self, document: &Document) -> Result<()> {
        let mut docs = self.documents.write().map_err(|_| poisoned())?;
        if docs.iter().any(|d| d.id == document.id) {
            return Err(RagError::storage(format!(
                "document {} already recorded",
                document.id
            )));
        }
        docs.push(document.clone());
        Ok(())
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<Document>> {
        let docs = self.documents.read().map_err(|_| poisoned())?;
        Ok(docs
            .iter()
            .filter(|d| &d.tenant_id == tenant)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .push(entry.clone());
        Ok(())
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<HistoryEntry>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .filter(|e| &e.tenant_id == tenant)
            .cloned()
            .collect())
    }
}
