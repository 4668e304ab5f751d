//! The provisioning-and-retrieval pipeline.
//!
//! [`DocService`] ties the components together:
//!
//! ```text
//! repoUrl ─▶ RepoId ─▶ RepoRegistry ─(absent)─▶ snapshot ─▶ provision ─▶ create agent ─▶ bind
//!                           │
//!                           ▼
//!                     send message ─▶ collect reply ─▶ DocumentStore
//!
//! DocumentStore ─▶ segment ─▶ filter ─▶ DocumentationView
//! ```
//!
//! Both the HTTP server and the CLI go through this type. Before anything is
//! provisioned the repository must be a remote git URL, or a local
//! directory when `[snapshot].allow_local_paths` is set.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::agents;
use crate::aggregate::collect_reply;
use crate::client::{AgentService, LettaClient};
use crate::config::Config;
use crate::error::{DocsError, DocsResult};
use crate::models::{DocumentSection, GeneratedDocument, RepoBinding, RepoId};
use crate::provision::provision_source;
use crate::registry::RepoRegistry;
use crate::sections::{filter_sections, segment};
use crate::snapshot::{check_location, GitSnapshotter, SnapshotSource};
use crate::store::{create_store, DocumentStore};

/// Title of the documentation returned by [`DocService::documentation`].
pub const DOCUMENTATION_TITLE: &str = "Internal Documentation";

/// Stored documentation split into sections, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentationView {
    pub title: String,
    pub content: String,
    pub sections: Vec<DocumentSection>,
}

/// Shared pipeline state. Cheap to share behind an `Arc`.
pub struct DocService {
    config: Arc<Config>,
    agents: Arc<dyn AgentService>,
    snapshots: Arc<dyn SnapshotSource>,
    store: Arc<dyn DocumentStore>,
    registry: RepoRegistry,
}

impl DocService {
    /// Build the service, seeding the registry with `[[bindings]]` from
    /// config.
    pub fn new(
        config: Arc<Config>,
        agents: Arc<dyn AgentService>,
        snapshots: Arc<dyn SnapshotSource>,
        store: Arc<dyn DocumentStore>,
    ) -> DocsResult<Self> {
        let mut seeded = Vec::with_capacity(config.bindings.len());
        for binding in &config.bindings {
            seeded.push(RepoBinding {
                repository_id: RepoId::from_url(&binding.repo_url)?,
                agent_id: binding.agent_id.clone(),
            });
        }
        if !seeded.is_empty() {
            tracing::info!(count = seeded.len(), "seeded repository bindings");
        }

        Ok(Self {
            config,
            agents,
            snapshots,
            store,
            registry: RepoRegistry::with_bindings(seeded),
        })
    }

    /// Build the service with the production collaborators selected by
    /// `config`: [`LettaClient`], [`GitSnapshotter`] and the configured
    /// document store.
    ///
    /// # Errors
    ///
    /// Fails if the API key environment variable is unset, the store
    /// directory cannot be created, or a configured binding is invalid.
    pub fn from_config(config: Arc<Config>) -> anyhow::Result<Self> {
        let agents = Arc::new(
            LettaClient::new(&config.agent_service)
                .context("Failed to create agent service client")?,
        );
        let snapshots = Arc::new(GitSnapshotter::new(config.snapshot.clone()));
        let store = create_store(&config.store)?;
        Ok(Self::new(config, agents, snapshots, store)?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &RepoRegistry {
        &self.registry
    }

    /// Return the agent for `repo`, provisioning one first if needed.
    ///
    /// Provisioning runs at most once per repository; concurrent callers
    /// wait for it and share the result.
    pub async fn ensure_agent(&self, repo: &RepoId) -> DocsResult<String> {
        self.registry
            .get_or_create(repo, || self.provision_agent(repo))
            .await
    }

    async fn provision_agent(&self, repo: &RepoId) -> DocsResult<String> {
        check_location(repo, self.config.snapshot.allow_local_paths)?;
        tracing::info!(repo = %repo, "provisioning agent");
        let payload = self.snapshots.snapshot(repo).await?;
        let source = provision_source(
            self.agents.as_ref(),
            &self.config.provisioning,
            repo,
            &payload,
        )
        .await?;
        agents::create_agent(self.agents.as_ref(), &self.config, repo, &source).await
    }

    /// Send one message to an agent and return its aggregated answer.
    pub async fn ask(&self, agent_id: &str, text: &str) -> DocsResult<String> {
        let stream = self.agents.send_message(agent_id, text).await?;
        collect_reply(stream).await
    }

    /// Provision (if needed), generate the documentation for `repo_url`,
    /// and store it.
    pub async fn generate_documentation(&self, repo_url: &str) -> DocsResult<GeneratedDocument> {
        let repo = RepoId::from_url(repo_url)?;
        let agent_id = self.ensure_agent(&repo).await?;

        let text = self
            .ask(&agent_id, &self.config.persona.documentation_prompt)
            .await?;
        let doc = GeneratedDocument::new(repo, text);
        self.store.put(doc.clone()).await?;

        tracing::info!(
            repo = %doc.repository_id,
            agent_id = %agent_id,
            bytes = doc.raw_text.len(),
            "documentation stored"
        );
        Ok(doc)
    }

    /// Forward one chat turn to the agent of `repo_url`.
    pub async fn chat(&self, repo_url: &str, user_input: &str) -> DocsResult<String> {
        let repo = RepoId::from_url(repo_url)?;
        if user_input.trim().is_empty() {
            return Err(DocsError::validation("userInput must not be empty"));
        }
        let agent_id = self.ensure_agent(&repo).await?;
        tracing::debug!(repo = %repo, agent_id = %agent_id, "chat turn");
        self.ask(&agent_id, user_input).await
    }

    /// Retrieve the stored documentation for `repo_url` as sections,
    /// optionally keeping only sections that match `query`.
    pub async fn documentation(
        &self,
        repo_url: &str,
        query: Option<&str>,
    ) -> DocsResult<DocumentationView> {
        let repo = RepoId::from_url(repo_url)?;
        let doc = self
            .store
            .get(&repo)
            .await?
            .ok_or_else(|| DocsError::NotFound(repo.to_string()))?;

        let mut sections = segment(&doc.raw_text);
        if let Some(query) = query {
            sections = filter_sections(sections, query);
        }

        Ok(DocumentationView {
            title: DOCUMENTATION_TITLE.to_string(),
            content: doc.raw_text,
            sections,
        })
    }
}
