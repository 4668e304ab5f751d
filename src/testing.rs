//! Scripted [`AgentService`] used by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::client::{AgentService, AgentSpec, ReplyStream};
use crate::error::{DocsError, DocsResult};
use crate::models::{DocumentPayload, IngestionJob, JobStatus, KnowledgeSource, RepoId};
use crate::snapshot::SnapshotSource;

pub(crate) struct ScriptedService {
    upload_status: JobStatus,
    /// Returned by successive `get_job` calls; the last entry repeats.
    polls: Mutex<VecDeque<(JobStatus, Value)>>,
    reply: String,
    fail_create_source: bool,
    calls: Mutex<Vec<String>>,
    agent_specs: Mutex<Vec<AgentSpec>>,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self {
            upload_status: JobStatus::Pending,
            polls: Mutex::new(VecDeque::from(vec![(JobStatus::Completed, Value::Null)])),
            reply: r#"{"messages":[{"message_type":"assistant_message","content":"Overview:\nGenerated docs."}]}"#
                .to_string(),
            fail_create_source: false,
            calls: Mutex::new(Vec::new()),
            agent_specs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_upload_status(mut self, status: JobStatus) -> Self {
        self.upload_status = status;
        self
    }

    pub(crate) fn with_polls(self, polls: Vec<(JobStatus, Value)>) -> Self {
        *self.polls.lock().unwrap() = VecDeque::from(polls);
        self
    }

    pub(crate) fn with_reply(mut self, reply: &str) -> Self {
        self.reply = reply.to_string();
        self
    }

    pub(crate) fn failing_source_creation(mut self) -> Self {
        self.fail_create_source = true;
        self
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn agent_specs(&self) -> Vec<AgentSpec> {
        self.agent_specs.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl AgentService for ScriptedService {
    async fn create_source(&self, name: &str) -> DocsResult<KnowledgeSource> {
        self.record("create_source");
        if self.fail_create_source {
            return Err(DocsError::Upstream {
                step: "create source",
                status: 409,
                body: "source exists".to_string(),
            });
        }
        Ok(KnowledgeSource {
            source_id: "source-1".to_string(),
            name: name.to_string(),
        })
    }

    async fn upload_document(
        &self,
        _source_id: &str,
        _payload: &DocumentPayload,
    ) -> DocsResult<IngestionJob> {
        self.record("upload_document");
        Ok(IngestionJob {
            job_id: "job-1".to_string(),
            status: self.upload_status,
            metadata: Value::Null,
        })
    }

    async fn get_job(&self, job_id: &str) -> DocsResult<IngestionJob> {
        self.record("get_job");
        let mut polls = self.polls.lock().unwrap();
        let (status, metadata) = if polls.len() > 1 {
            polls.pop_front().unwrap()
        } else {
            polls.front().cloned().unwrap()
        };
        Ok(IngestionJob {
            job_id: job_id.to_string(),
            status,
            metadata,
        })
    }

    async fn create_agent(&self, spec: &AgentSpec) -> DocsResult<String> {
        self.record("create_agent");
        self.agent_specs.lock().unwrap().push(spec.clone());
        Ok(format!("agent-{}", self.count("create_agent")))
    }

    async fn send_message(&self, _agent_id: &str, _text: &str) -> DocsResult<ReplyStream> {
        self.record("send_message");
        let chunks: Vec<DocsResult<Bytes>> = self
            .reply
            .as_bytes()
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

/// Snapshot source returning fixed content without touching the filesystem.
pub(crate) struct StaticSnapshot;

#[async_trait]
impl SnapshotSource for StaticSnapshot {
    async fn snapshot(&self, repo: &RepoId) -> DocsResult<DocumentPayload> {
        Ok(DocumentPayload {
            file_name: format!("{}.txt", repo.resource_name()),
            content: format!("Repository: {}\n\n=== README.md ===\n# Demo\n", repo),
        })
    }
}
