//! HTTP server.
//!
//! Exposes the four tenant-scoped operations of [`RagService`] as a JSON
//! API. Every `/api` route resolves the caller's tenant from the
//! `Authorization: Bearer <token>` header through the configured
//! [`IdentityVerifier`]; handlers never see an unauthenticated request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/upload` | Ingest a multipart `file` field |
//! | `POST` | `/api/ask` | Answer `{"question": ...}` from the tenant's documents |
//! | `GET`  | `/api/files` | Filenames uploaded by the tenant |
//! | `GET`  | `/api/history` | The tenant's question/answer history |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "empty_question", "message": "question must not be empty" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `empty_question` | 400 |
//! | `unauthorized` | 401 |
//! | `payload_too_large` | 413 |
//! | `unsupported_format` | 415 |
//! | `corrupt_document` | 422 |
//! | `provider_error` | 502 |
//! | `provider_timeout` | 504 |
//! | everything else | 500 |
//!
//! Provider and storage failures are logged in full and reported to the
//! client with a generic message.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequestParts, Multipart, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use ragdesk_core::identity::IdentityVerifier;
use ragdesk_core::models::TenantId;
use ragdesk_core::RagError;

use crate::config::Config;
use crate::identity::create_verifier;
use crate::ingest::Upload;
use crate::service::RagService;

/// Multipart framing allowance on top of `uploads.max_bytes`.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub max_upload_bytes: usize,
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let verifier = create_verifier(&config.auth)?;
    let service = Arc::new(RagService::open(config).await?);

    let state = AppState {
        service: service.clone(),
        verifier,
        max_upload_bytes: config.uploads.max_bytes,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "ragdesk server listening");
    println!("ragdesk listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    if let Ok(service) = Arc::try_unwrap(service) {
        service.close().await;
    }
    Ok(())
}

/// Build the router with all routes, CORS, and the upload body limit.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/upload", post(handle_upload))
        .route("/api/ask", post(handle_ask))
        .route("/api/files", get(handle_files))
        .route("/api/history", get(handle_history))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::EmptyQuestion | RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RagError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RagError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RagError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RagError::CorruptDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Provider { .. } => StatusCode::BAD_GATEWAY,
            RagError::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RagError::Storage(_)
            | RagError::EmbeddingDimensionMismatch { .. }
            | RagError::EmptyIndex
            | RagError::InvalidChunkParams { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &err {
            RagError::Provider { provider, .. } => {
                tracing::error!(error = %err, "provider failure");
                format!("{} request failed", provider)
            }
            RagError::Storage(_) => {
                tracing::error!(error = %err, "storage failure");
                "internal storage error".to_string()
            }
            _ => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "request failed");
                }
                err.to_string()
            }
        };

        AppError {
            status,
            code: err.kind().to_string(),
            message,
        }
    }
}

// ============ Authentication ============

/// The tenant resolved from the request's bearer token.
pub struct AuthContext {
    pub tenant: TenantId,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RagError::Unauthorized("missing bearer token".into()))?;

        let tenant = state.verifier.verify(token).await?;
        Ok(AuthContext { tenant })
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/upload ============

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    chunk_count: usize,
    message: String,
}

/// Reads the multipart `file` field and ingests it.
async fn handle_upload(
    auth: AuthContext,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| bad_request("no file part"))?;
    if upload.filename.is_empty() {
        return Err(bad_request("no selected file"));
    }

    let receipt = state.service.submit_document(&auth.tenant, upload).await?;
    Ok(Json(UploadResponse {
        document_id: receipt.document_id,
        chunk_count: receipt.chunk_count,
        message: "File uploaded and processed successfully".to_string(),
    }))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "payload_too_large".to_string(),
            message: err.body_text(),
        }
    } else {
        bad_request(err.body_text())
    }
}

// ============ POST /api/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    grounded: bool,
    chunk_ids: Vec<String>,
}

async fn handle_ask(
    auth: AuthContext,
    State(state): State<AppState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let answer = state.service.ask(&auth.tenant, &req.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        grounded: answer.grounded,
        chunk_ids: answer.chunk_ids,
    }))
}

// ============ GET /api/files ============

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<String>,
}

async fn handle_files(
    auth: AuthContext,
    State(state): State<AppState>,
) -> Result<Json<FilesResponse>, AppError> {
    let documents = state.service.list_documents(&auth.tenant).await?;
    Ok(Json(FilesResponse {
        files: documents.into_iter().map(|d| d.filename).collect(),
    }))
}

// ============ GET /api/history ============

#[derive(Serialize)]
struct HistoryItem {
    question: String,
    answer: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<HistoryItem>,
}

async fn handle_history(
    auth: AuthContext,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, AppError> {
    let entries = state.service.list_history(&auth.tenant).await?;
    Ok(Json(HistoryResponse {
        history: entries
            .into_iter()
            .map(|e| HistoryItem {
                question: e.question,
                answer: e.answer,
            })
            .collect(),
    }))
}
