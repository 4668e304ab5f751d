//! Agent factory: binds a persona and an ingested knowledge source into a
//! new conversational agent.
//!
//! # Persona
//!
//! Every repository agent gets the same persona, taken from the `[persona]`
//! config section. It confines the agent to the repository material that was
//! ingested into its knowledge source and tells it to decline unrelated
//! questions. The repository identifier is appended so the agent knows which
//! project it documents.
//!
//! ```rust
//! use docsmith::agents::Persona;
//! use docsmith::config::PersonaConfig;
//! use docsmith::models::RepoId;
//!
//! let persona = Persona::from_config(&PersonaConfig::default());
//! let repo = RepoId::from_url("https://github.com/org/repo").unwrap();
//! assert!(persona.render(&repo).contains("https://github.com/org/repo"));
//! ```

use serde::Serialize;

use crate::client::{AgentService, AgentSpec};
use crate::config::{Config, PersonaConfig};
use crate::error::DocsResult;
use crate::models::{KnowledgeSource, RepoId};

// ═══════════════════════════════════════════════════════════════════════
// Persona
// ═══════════════════════════════════════════════════════════════════════

/// The fixed behaviour configuration shared by all repository agents.
#[derive(Debug, Clone, Serialize)]
pub struct Persona {
    /// Persona name (e.g. `"docs-assistant"`).
    pub name: String,
    /// Instructions constraining what the agent may answer.
    pub instructions: String,
}

impl Persona {
    pub fn from_config(config: &PersonaConfig) -> Self {
        Self {
            name: config.name.clone(),
            instructions: config.instructions.clone(),
        }
    }

    /// Persona text for the agent of `repo`.
    pub fn render(&self, repo: &RepoId) -> String {
        format!(
            "Persona: {}\n{}\nRepository: {}",
            self.name,
            self.instructions.trim(),
            repo
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Factory
// ═══════════════════════════════════════════════════════════════════════

/// Build the creation request for the agent of `repo`, bound to `source`.
pub fn agent_spec(config: &Config, repo: &RepoId, source: &KnowledgeSource) -> AgentSpec {
    AgentSpec {
        name: repo.resource_name(),
        persona: Persona::from_config(&config.persona).render(repo),
        model: config.agent_service.model.clone(),
        embedding: config.agent_service.embedding.clone(),
        source_ids: vec![source.source_id.clone()],
    }
}

/// Create the agent for `repo` and return its identifier.
///
/// One creation call is made; a failure is returned as-is and not retried.
pub async fn create_agent(
    service: &dyn AgentService,
    config: &Config,
    repo: &RepoId,
    source: &KnowledgeSource,
) -> DocsResult<String> {
    let spec = agent_spec(config, repo, source);
    let agent_id = service.create_agent(&spec).await?;
    tracing::info!(
        repo = %repo,
        agent_id = %agent_id,
        source_id = %source.source_id,
        model = %spec.model,
        "agent created"
    );
    Ok(agent_id)
}
