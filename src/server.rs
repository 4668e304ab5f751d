//! HTTP server for documentation generation and retrieval.
//!
//! Thin axum layer over [`DocService`]. Every handler parses its JSON body,
//! calls one pipeline operation, and maps [`DocsError`] to a status code.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/repo` | Provision the repository's agent if needed, generate and store documentation |
//! | `POST` | `/documentation` | Stored documentation split into sections |
//! | `GET`, `POST` | `/chat_with_agent` | One chat turn with the repository's agent |
//! | `GET`  | `/repos` | Known repository → agent bindings |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "repoUrl must not be empty", "code": "bad_request" }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `ingestion_timeout` (504),
//! `upstream_error`, `ingestion_failed`, `aggregation_error` and `internal`
//! (all 500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::DocsError;
use crate::models::RepoBinding;
use crate::pipeline::{DocService, DocumentationView};

/// Starts the HTTP server with the agent service, snapshotter, and store
/// selected by `config`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = DocService::from_config(Arc::new(config.clone()))?;
    run_server_with_service(Arc::new(service)).await
}

/// Starts the HTTP server around an already-built [`DocService`].
///
/// Binds to `[server].bind` of the service's configuration. Embedders and
/// tests use this to inject their own agent service or store.
pub async fn run_server_with_service(service: Arc<DocService>) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with all routes and the CORS layer.
pub fn router(service: Arc<DocService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/repo", post(handle_repo))
        .route("/documentation", post(handle_documentation))
        .route(
            "/chat_with_agent",
            get(handle_chat).post(handle_chat),
        )
        .route("/repos", get(handle_repos))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(service)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DocsError> for AppError {
    fn from(err: DocsError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        } else {
            tracing::debug!(code = err.code(), error = %err, "request rejected");
        }
        AppError {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
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

// ============ POST /repo ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoRequest {
    #[serde(default)]
    repo_url: String,
    #[serde(default)]
    conf_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RepoResponse {
    assistant_message_content: String,
    repo_url: String,
    conf_url: Option<String>,
}

/// Handler for `POST /repo`.
///
/// Provisions the repository's agent on first use (which waits for
/// ingestion to finish), then asks it for documentation and stores the
/// answer. `confUrl` is echoed back unchanged.
async fn handle_repo(
    State(service): State<Arc<DocService>>,
    payload: Result<Json<RepoRequest>, JsonRejection>,
) -> Result<Json<RepoResponse>, AppError> {
    let Json(req) = payload?;
    let repo_url = req.repo_url.trim().to_string();
    let conf_url = req.conf_url.map(|url| url.trim().to_string());

    let doc = service.generate_documentation(&repo_url).await?;

    Ok(Json(RepoResponse {
        assistant_message_content: doc.raw_text,
        repo_url,
        conf_url,
    }))
}

// ============ POST /documentation ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentationRequest {
    #[serde(default)]
    repo_url: String,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct DocumentationResponse {
    documentation: DocumentationView,
}

/// Handler for `POST /documentation`.
///
/// Returns `404` when nothing has been generated for the repository yet.
async fn handle_documentation(
    State(service): State<Arc<DocService>>,
    payload: Result<Json<DocumentationRequest>, JsonRejection>,
) -> Result<Json<DocumentationResponse>, AppError> {
    let Json(req) = payload?;
    let documentation = service
        .documentation(&req.repo_url, req.query.as_deref())
        .await?;
    Ok(Json(DocumentationResponse { documentation }))
}

// ============ /chat_with_agent ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    user_input: String,
    #[serde(default)]
    repo_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    reply: String,
    repo_url: String,
}

/// Handler for `GET` and `POST /chat_with_agent`.
async fn handle_chat(
    State(service): State<Arc<DocService>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    let repo_url = req.repo_url.trim().to_string();
    let reply = service.chat(&repo_url, &req.user_input).await?;
    Ok(Json(ChatResponse { reply, repo_url }))
}

// ============ GET /repos ============

#[derive(Serialize)]
struct ReposResponse {
    repos: Vec<RepoBinding>,
}

async fn handle_repos(State(service): State<Arc<DocService>>) -> Json<ReposResponse> {
    Json(ReposResponse {
        repos: service.registry().bindings(),
    })
}
