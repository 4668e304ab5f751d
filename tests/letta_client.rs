//! Tests for [`LettaClient`] against a mock agent service.
//!
//! The mock is a small axum app speaking the subset of the Letta REST API
//! the client uses. It checks the bearer token and records request bodies.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docsmith::aggregate::collect_reply;
use docsmith::agents;
use docsmith::client::{AgentService, LettaClient};
use docsmith::config::{parse_config, AgentServiceConfig, ProvisioningConfig};
use docsmith::error::DocsError;
use docsmith::models::{DocumentPayload, RepoId};
use docsmith::provision::provision_source;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const API_KEY: &str = "test-key";

// ─── Mock agent service ─────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    polls: AtomicUsize,
    fail_job: bool,
    upload_body: Mutex<Vec<u8>>,
    agent_body: Mutex<Option<Value>>,
    message_body: Mutex<Option<Value>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", API_KEY))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "invalid api key").into_response()
}

async fn create_source(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "id": "source-abc", "name": body["name"] })).into_response()
}

async fn upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(source_id): Path<String>,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(source_id, "source-abc");
    *state.upload_body.lock().unwrap() = body.to_vec();
    Json(json!({ "id": "job-7", "status": "created" })).into_response()
}

async fn get_job(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if job_id != "job-7" {
        return (StatusCode::NOT_FOUND, "job not found").into_response();
    }
    let n = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let job = match (n, state.fail_job) {
        (1, _) => json!({ "id": job_id, "status": "running" }),
        (_, true) => json!({
            "id": job_id,
            "status": "failed",
            "metadata": { "error": "could not parse file", "stage": "embedding" }
        }),
        (_, false) => json!({ "id": job_id, "status": "completed", "metadata": {} }),
    };
    Json(job).into_response()
}

async fn create_agent(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    *state.agent_body.lock().unwrap() = Some(body);
    Json(json!({ "id": "agent-xyz", "name": "ignored" })).into_response()
}

async fn send_message(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(agent_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(agent_id, "agent-xyz");
    *state.message_body.lock().unwrap() = Some(body);
    Json(json!({
        "messages": [
            { "message_type": "reasoning_message", "reasoning": "..." },
            { "message_type": "assistant_message", "content": [
                { "type": "text", "text": "Overview:\n" },
                { "type": "text", "text": "It works." }
            ]}
        ],
        "usage": { "total_tokens": 10 }
    }))
    .into_response()
}

async fn start_mock(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/v1/sources/", post(create_source))
        .route("/v1/sources/{id}/upload", post(upload))
        .route("/v1/jobs/{id}", get(get_job))
        .route("/v1/agents/", post(create_agent))
        .route("/v1/agents/{id}/messages", post(send_message))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, api_key: &str) -> LettaClient {
    let config = AgentServiceConfig {
        base_url: base_url.to_string(),
        timeout_secs: 10,
        ..Default::default()
    };
    LettaClient::with_api_key(&config, api_key.to_string()).unwrap()
}

fn fast_polling() -> ProvisioningConfig {
    ProvisioningConfig {
        poll_interval_ms: 5,
        max_poll_attempts: 10,
    }
}

fn payload() -> DocumentPayload {
    DocumentPayload {
        file_name: "org-repo.txt".to_string(),
        content: "Repository: https://github.com/org/repo\n\n=== README.md ===\n# Demo\n"
            .to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_provision_create_agent_and_chat() {
    let state = Arc::new(MockState::default());
    let base = start_mock(state.clone()).await;
    let letta = client(&base, API_KEY);
    let repo = RepoId::from_url("https://github.com/org/repo").unwrap();

    let source = provision_source(&letta, &fast_polling(), &repo, &payload())
        .await
        .unwrap();
    assert_eq!(source.source_id, "source-abc");
    assert_eq!(source.name, repo.resource_name());
    assert_eq!(state.polls.load(Ordering::SeqCst), 2);

    let upload = String::from_utf8(state.upload_body.lock().unwrap().clone()).unwrap();
    assert!(upload.contains("name=\"file\""));
    assert!(upload.contains("filename=\"org-repo.txt\""));
    assert!(upload.contains("=== README.md ==="));

    let config = parse_config("[server]\nbind = \"127.0.0.1:0\"\n").unwrap();
    let agent_id = agents::create_agent(&letta, &config, &repo, &source)
        .await
        .unwrap();
    assert_eq!(agent_id, "agent-xyz");

    let agent_body = state.agent_body.lock().unwrap().clone().unwrap();
    assert_eq!(agent_body["source_ids"], json!(["source-abc"]));
    assert_eq!(agent_body["memory_blocks"][0]["label"], "persona");
    assert!(agent_body["memory_blocks"][0]["value"]
        .as_str()
        .unwrap()
        .contains("https://github.com/org/repo"));
    assert_eq!(agent_body["model"], "openai/gpt-4o-mini");

    let stream = letta.send_message(&agent_id, "Describe it").await.unwrap();
    let answer = collect_reply(stream).await.unwrap();
    assert_eq!(answer, "Overview:\nIt works.");

    let message_body = state.message_body.lock().unwrap().clone().unwrap();
    assert_eq!(
        message_body,
        json!({ "messages": [{ "role": "user", "content": "Describe it" }] })
    );
}

#[tokio::test]
async fn test_failed_job_metadata_passed_through() {
    let state = Arc::new(MockState {
        fail_job: true,
        ..Default::default()
    });
    let base = start_mock(state).await;
    let letta = client(&base, API_KEY);
    let repo = RepoId::from_url("https://github.com/org/repo").unwrap();

    let err = provision_source(&letta, &fast_polling(), &repo, &payload())
        .await
        .unwrap_err();
    match err {
        DocsError::IngestionFailed { job_id, metadata } => {
            assert_eq!(job_id, "job-7");
            assert_eq!(
                metadata,
                json!({ "error": "could not parse file", "stage": "embedding" })
            );
        }
        other => panic!("expected IngestionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_success_status_is_upstream_error() {
    let base = start_mock(Arc::new(MockState::default())).await;

    let err = client(&base, API_KEY).get_job("missing").await.unwrap_err();
    match err {
        DocsError::Upstream { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "job not found");
        }
        other => panic!("expected Upstream, got {:?}", other),
    }

    let err = client(&base, "wrong-key")
        .create_source("org-repo")
        .await
        .unwrap_err();
    assert!(matches!(err, DocsError::Upstream { status: 401, .. }));
}

#[tokio::test]
async fn test_truncated_error_body_is_reported() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Promises 100 bytes of body, sends 7, then hangs up.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial",
            )
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let err = client(&format!("http://{}", addr), API_KEY)
        .get_job("job-7")
        .await
        .unwrap_err();
    match err {
        DocsError::Upstream { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.starts_with("<unreadable body"), "body: {:?}", body);
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = client(&format!("http://127.0.0.1:{}", port), API_KEY)
        .get_job("job-7")
        .await
        .unwrap_err();
    assert!(matches!(err, DocsError::Transport { .. }));
}
