//! Credential verification seam.
//!
//! The HTTP layer never inspects tokens itself; it hands the bearer token
//! to an [`IdentityVerifier`] and works with the resulting [`TenantId`].

use async_trait::async_trait;

use crate::error::Result;
use crate::models::TenantId;

/// Resolves an opaque credential to the tenant it belongs to.
///
/// Implementations return [`RagError::Unauthorized`](crate::error::RagError::Unauthorized)
/// for missing, malformed, expired or unknown credentials.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TenantId>;
}
