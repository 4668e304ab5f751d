//! Core data models shared by the pipeline, the server, and the agent
//! service client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{DocsError, DocsResult};

/// Normalized repository identifier derived from a repository URL.
///
/// Trailing slashes and a trailing `.git` are removed so that
/// `https://github.com/org/repo.git/` and `https://github.com/org/repo`
/// address the same binding and document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    pub fn from_url(url: &str) -> DocsResult<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        let trimmed = trimmed.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(DocsError::validation("repoUrl must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is a remote git URL: `https://host/path`,
    /// `ssh://host/path` or scp-like `user@host:path`. Anything else (local
    /// paths, `file://`, other transports, or text git could read as an
    /// option) is not.
    pub fn is_remote(&self) -> bool {
        let s = self.0.as_str();
        if s.starts_with('-') || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return false;
        }
        for scheme in ["https://", "ssh://"] {
            if let Some(rest) = s.strip_prefix(scheme) {
                return match rest.split_once('/') {
                    Some((host, path)) => {
                        !host.is_empty() && !host.starts_with('-') && !path.is_empty()
                    }
                    None => false,
                };
            }
        }
        if s.contains("://") {
            return false;
        }
        match s.split_once(':') {
            Some((user_host, path)) => match user_host.split_once('@') {
                Some((user, host)) => {
                    !user.is_empty()
                        && !host.is_empty()
                        && !host.starts_with('-')
                        && !user_host.contains('/')
                        && !path.is_empty()
                }
                None => false,
            },
            None => false,
        }
    }

    /// Short, human-readable name: the last two path segments joined by `-`
    /// and reduced to `[a-z0-9-]`.
    pub fn slug(&self) -> String {
        let segments: Vec<&str> = self
            .0
            .rsplit(['/', ':'])
            .filter(|s| !s.is_empty())
            .take(2)
            .collect();
        let joined = segments.into_iter().rev().collect::<Vec<_>>().join("-");
        let mut slug = String::with_capacity(joined.len());
        for c in joined.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-').to_string();
        if slug.is_empty() {
            "repo".to_string()
        } else {
            slug
        }
    }

    /// First 12 hex digits of the SHA-256 of the identifier.
    pub fn short_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{:x}", hasher.finalize())[..12].to_string()
    }

    /// Name used for the knowledge source and the agent of this repository.
    pub fn resource_name(&self) -> String {
        format!("{}-{}", self.slug(), self.short_hash())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repository bound to the agent provisioned for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoBinding {
    pub repository_id: RepoId,
    pub agent_id: String,
}

/// Lifecycle state of an ingestion job.
///
/// Status strings the agent service reports are folded into four states:
/// `created` counts as pending and `cancelled` as failed. Unrecognised
/// strings are treated as pending so polling continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<String> for JobStatus {
    fn from(status: String) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" | "cancelled" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Asynchronous job that loads an uploaded document into a knowledge source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionJob {
    #[serde(rename = "id")]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, alias = "metadata_")]
    pub metadata: serde_json::Value,
}

/// A knowledge source created on the agent service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeSource {
    #[serde(rename = "id")]
    pub source_id: String,
    pub name: String,
}

/// The text uploaded into a knowledge source.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub file_name: String,
    pub content: String,
}

/// Documentation text produced by a repository's agent.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub repository_id: RepoId,
    pub raw_text: String,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedDocument {
    pub fn new(repository_id: RepoId, raw_text: String) -> Self {
        Self {
            repository_id,
            raw_text,
            generated_at: Utc::now(),
        }
    }
}

/// A titled part of a generated document. Recomputed on every retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSection {
    pub id: String,
    pub title: String,
    pub content: String,
}
