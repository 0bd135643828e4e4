//! Bearer-token verification.
//!
//! - **[`JwtVerifier`]**: HS256 JWTs whose `sub` claim is the tenant id.
//!   Expiry is always enforced; issuer and audience when configured.
//! - **[`StaticTokenVerifier`]**: a fixed token → tenant table from the
//!   config file, for local and single-machine deployments.

use anyhow::{bail, Result};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use ragdesk_core::identity::IdentityVerifier;
use ragdesk_core::models::TenantId;
use ragdesk_core::RagError;

use crate::config::AuthConfig;

/// Build the verifier selected by `auth.mode`.
pub fn create_verifier(config: &AuthConfig) -> Result<Arc<dyn IdentityVerifier>> {
    match config.mode.as_str() {
        "jwt" => {
            let secret = match std::env::var(&config.jwt_secret_env) {
                Ok(s) if !s.is_empty() => s,
                _ => bail!(
                    "{} environment variable not set (required by auth.mode = \"jwt\")",
                    config.jwt_secret_env
                ),
            };
            Ok(Arc::new(JwtVerifier::new(
                secret.as_bytes(),
                config.issuer.as_deref(),
                config.audience.as_deref(),
            )))
        }
        "static" => Ok(Arc::new(StaticTokenVerifier::new(config.tokens.clone())?)),
        other => bail!("Unknown auth mode: {}", other),
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> ragdesk_core::Result<TenantId> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            RagError::Unauthorized("invalid or expired token".into())
        })?;
        TenantId::new(data.claims.sub)
    }
}

pub struct StaticTokenVerifier {
    tokens: HashMap<String, TenantId>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Result<Self> {
        let mut resolved = HashMap::with_capacity(tokens.len());
        for (token, tenant) in tokens {
            let tenant = TenantId::new(tenant)
                .map_err(|_| anyhow::anyhow!("auth.tokens contains an empty tenant id"))?;
            resolved.insert(token, tenant);
        }
        Ok(Self { tokens: resolved })
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> ragdesk_core::Result<TenantId> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| RagError::Unauthorized("unknown token".into()))
    }
}
