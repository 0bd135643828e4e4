//! Per-tenant record stores for uploaded documents and Q&A history.
//!
//! Both stores are append-only. Listing is always scoped to one tenant and
//! returns entries in insertion order.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, HistoryEntry, TenantId};

/// Metadata of every accepted upload.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn record(&self, document: &Document) -> Result<()>;
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Document>>;
}

/// Question/answer pairs, per tenant.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> Result<()>;
    async fn list(&self, tenant: &TenantId) -> Result<Vec<HistoryEntry>>;
}
