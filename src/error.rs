//! Error taxonomy for the provisioning and retrieval pipeline.
//!
//! Every failure the pipeline can produce is a [`DocsError`] variant. The
//! HTTP layer maps each variant to a status code and machine-readable code
//! via [`DocsError::status`] and [`DocsError::code`]; nothing is retried.
//!
//! | Kind | Variants | Status |
//! |------|----------|--------|
//! | Validation | [`Validation`](DocsError::Validation) | 400 |
//! | Upstream | [`Upstream`](DocsError::Upstream), [`Transport`](DocsError::Transport) | 500 |
//! | Ingestion | [`IngestionFailed`](DocsError::IngestionFailed) | 500 |
//! | Ingestion | [`IngestionTimeout`](DocsError::IngestionTimeout) | 504 |
//! | Aggregation | [`ReplyParse`](DocsError::ReplyParse), [`NoAssistantContent`](DocsError::NoAssistantContent) | 500 |
//! | Not found | [`NotFound`](DocsError::NotFound) | 404 |

use axum::http::StatusCode;
use thiserror::Error;

/// Result alias used throughout the library.
pub type DocsResult<T> = std::result::Result<T, DocsError>;

#[derive(Debug, Error)]
pub enum DocsError {
    /// A request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The agent service answered with a non-success status.
    #[error("agent service returned {status} during {step}: {body}")]
    Upstream {
        step: &'static str,
        status: u16,
        body: String,
    },

    /// The request to the agent service could not be completed.
    #[error("agent service request failed during {step}: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The ingestion job reached the `failed` state. `metadata` is the
    /// job metadata exactly as the agent service reported it.
    #[error("ingestion job {job_id} failed: {metadata}")]
    IngestionFailed {
        job_id: String,
        metadata: serde_json::Value,
    },

    #[error("ingestion job {job_id} did not finish after {attempts} polls")]
    IngestionTimeout { job_id: String, attempts: u32 },

    /// The drained reply body was not valid JSON.
    #[error("could not parse agent reply: {0}")]
    ReplyParse(#[source] serde_json::Error),

    #[error("no assistant content found in agent reply")]
    NoAssistantContent,

    #[error("no documentation stored for {0}")]
    NotFound(String),

    #[error("repository snapshot failed: {0:#}")]
    Snapshot(anyhow::Error),

    #[error("document store error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl DocsError {
    /// HTTP status the server answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            DocsError::Validation(_) => StatusCode::BAD_REQUEST,
            DocsError::NotFound(_) => StatusCode::NOT_FOUND,
            DocsError::IngestionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DocsError::Upstream { .. }
            | DocsError::Transport { .. }
            | DocsError::IngestionFailed { .. }
            | DocsError::ReplyParse(_)
            | DocsError::NoAssistantContent
            | DocsError::Snapshot(_)
            | DocsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code included in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DocsError::Validation(_) => "bad_request",
            DocsError::Upstream { .. } | DocsError::Transport { .. } => "upstream_error",
            DocsError::IngestionFailed { .. } => "ingestion_failed",
            DocsError::IngestionTimeout { .. } => "ingestion_timeout",
            DocsError::ReplyParse(_) | DocsError::NoAssistantContent => "aggregation_error",
            DocsError::NotFound(_) => "not_found",
            DocsError::Snapshot(_) | DocsError::Storage(_) => "internal",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DocsError::Validation(message.into())
    }
}
