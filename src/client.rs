//! Client for the external agent service.
//!
//! The pipeline talks to the agent service only through the
//! [`AgentService`] trait, so tests and embedders can substitute their own
//! implementation. [`LettaClient`] is the HTTP implementation for a
//! Letta-style REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`create_source`](AgentService::create_source) | `POST /v1/sources/` |
//! | [`upload_document`](AgentService::upload_document) | `POST /v1/sources/{id}/upload` (multipart) |
//! | [`get_job`](AgentService::get_job) | `GET /v1/jobs/{id}` |
//! | [`create_agent`](AgentService::create_agent) | `POST /v1/agents/` |
//! | [`send_message`](AgentService::send_message) | `POST /v1/agents/{id}/messages` |
//!
//! Every call is attempted exactly once. A non-success status becomes
//! [`DocsError::Upstream`] carrying the response body; a failed request
//! becomes [`DocsError::Transport`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::config::AgentServiceConfig;
use crate::error::{DocsError, DocsResult};
use crate::models::{DocumentPayload, IngestionJob, KnowledgeSource};

/// A chat reply as it arrives from the agent service: byte chunks in
/// arrival order, ending when the transport signals the body is complete.
pub type ReplyStream = BoxStream<'static, DocsResult<Bytes>>;

/// Request to create an agent bound to one or more knowledge sources.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSpec {
    pub name: String,
    /// Persona block that constrains the agent's behaviour.
    pub persona: String,
    pub model: String,
    pub embedding: String,
    pub source_ids: Vec<String>,
}

/// Operations the pipeline needs from the external agent service.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Create an empty knowledge source.
    async fn create_source(&self, name: &str) -> DocsResult<KnowledgeSource>;

    /// Upload a document into a source, returning the ingestion job.
    async fn upload_document(
        &self,
        source_id: &str,
        payload: &DocumentPayload,
    ) -> DocsResult<IngestionJob>;

    /// Fetch the current state of an ingestion job.
    async fn get_job(&self, job_id: &str) -> DocsResult<IngestionJob>;

    /// Create an agent and return its identifier.
    async fn create_agent(&self, spec: &AgentSpec) -> DocsResult<String>;

    /// Post one user message to an agent. The reply body is returned
    /// undrained; see [`crate::aggregate`].
    async fn send_message(&self, agent_id: &str, text: &str) -> DocsResult<ReplyStream>;
}

/// HTTP client for a Letta-compatible agent service.
pub struct LettaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LettaClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the environment variable named by `api_key_env` is unset
    /// or the HTTP client cannot be constructed.
    pub fn new(config: &AgentServiceConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &AgentServiceConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Send a request and return the response if its status is a success.
    async fn execute(
        &self,
        step: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> DocsResult<reqwest::Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|source| DocsError::Transport { step, source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        tracing::warn!(step, status = status.as_u16(), "agent service rejected request");
        Err(DocsError::Upstream {
            step,
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        step: &'static str,
        response: reqwest::Response,
    ) -> DocsResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| DocsError::Transport { step, source })
    }
}

#[async_trait]
impl AgentService for LettaClient {
    async fn create_source(&self, name: &str) -> DocsResult<KnowledgeSource> {
        let step = "create source";
        let response = self
            .execute(
                step,
                self.http
                    .post(self.url("/v1/sources/"))
                    .json(&json!({ "name": name })),
            )
            .await?;
        Self::read_json(step, response).await
    }

    async fn upload_document(
        &self,
        source_id: &str,
        payload: &DocumentPayload,
    ) -> DocsResult<IngestionJob> {
        let step = "upload document";
        let part = reqwest::multipart::Part::text(payload.content.clone())
            .file_name(payload.file_name.clone())
            .mime_str("text/plain")
            .map_err(|source| DocsError::Transport { step, source })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .execute(
                step,
                self.http
                    .post(self.url(&format!("/v1/sources/{}/upload", source_id)))
                    .multipart(form),
            )
            .await?;
        Self::read_json(step, response).await
    }

    async fn get_job(&self, job_id: &str) -> DocsResult<IngestionJob> {
        let step = "poll job";
        let response = self
            .execute(step, self.http.get(self.url(&format!("/v1/jobs/{}", job_id))))
            .await?;
        Self::read_json(step, response).await
    }

    async fn create_agent(&self, spec: &AgentSpec) -> DocsResult<String> {
        let step = "create agent";
        let body = json!({
            "name": spec.name,
            "memory_blocks": [
                { "label": "persona", "value": spec.persona },
            ],
            "model": spec.model,
            "embedding": spec.embedding,
            "source_ids": spec.source_ids,
        });
        let response = self
            .execute(step, self.http.post(self.url("/v1/agents/")).json(&body))
            .await?;
        let created: serde_json::Value = Self::read_json(step, response).await?;
        created
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| DocsError::Upstream {
                step,
                status: 200,
                body: format!("agent creation response has no id: {}", created),
            })
    }

    async fn send_message(&self, agent_id: &str, text: &str) -> DocsResult<ReplyStream> {
        let step = "send message";
        let body = json!({
            "messages": [{ "role": "user", "content": text }],
        });
        let response = self
            .execute(
                step,
                self.http
                    .post(self.url(&format!("/v1/agents/{}/messages", agent_id)))
                    .json(&body),
            )
            .await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|source| DocsError::Transport { step: "read reply", source }));
        Ok(stream.boxed())
    }
}
