//! Repository → agent registry.
//!
//! Maps each [`RepoId`] to the agent provisioned for it. Bindings live for
//! the lifetime of the process and are never removed.
//!
//! [`RepoRegistry::get_or_create`] is the idempotence gate of the pipeline:
//! for one repository, concurrent callers share a single creation future, so
//! at most one agent is provisioned and every caller observes the same
//! agent id. If creation fails nothing is bound and the next call retries.
//!
//! ```rust
//! use docsmith::models::RepoId;
//! use docsmith::registry::RepoRegistry;
//!
//! let registry = RepoRegistry::new();
//! let repo = RepoId::from_url("https://github.com/org/repo").unwrap();
//! assert!(!registry.exists(&repo));
//! registry.bind(&repo, "agent-1");
//! assert_eq!(registry.lookup(&repo).as_deref(), Some("agent-1"));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{OnceCell, SetError};

use crate::error::DocsResult;
use crate::models::{RepoBinding, RepoId};

type Slot = Arc<OnceCell<String>>;

/// Concurrency-safe repo→agent map.
#[derive(Default)]
pub struct RepoRegistry {
    slots: RwLock<HashMap<RepoId, Slot>>,
}

impl RepoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with known bindings.
    pub fn with_bindings(bindings: impl IntoIterator<Item = RepoBinding>) -> Self {
        let registry = Self::new();
        for binding in bindings {
            registry.bind(&binding.repository_id, &binding.agent_id);
        }
        registry
    }

    pub fn exists(&self, repo: &RepoId) -> bool {
        self.lookup(repo).is_some()
    }

    pub fn lookup(&self, repo: &RepoId) -> Option<String> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(repo).and_then(|slot| slot.get().cloned())
    }

    /// Bind `repo` to `agent_id`, replacing any existing binding.
    ///
    /// While a [`get_or_create`](Self::get_or_create) for `repo` is in
    /// flight the binding is refused and `false` is returned; the running
    /// creation decides the agent and its waiters all observe that one.
    pub fn bind(&self, repo: &RepoId, agent_id: &str) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(repo) {
            if !slot.initialized() {
                match slot.set(agent_id.to_string()) {
                    Ok(()) => return true,
                    Err(SetError::InitializingError(_)) => {
                        tracing::warn!(
                            repo = %repo,
                            agent_id = %agent_id,
                            "agent creation in progress, binding refused"
                        );
                        return false;
                    }
                    // Filled between the check and the set; replaced below.
                    Err(SetError::AlreadyInitializedError(_)) => {}
                }
            }
        }
        slots.insert(repo.clone(), Arc::new(OnceCell::from(agent_id.to_string())));
        true
    }

    /// Return the agent bound to `repo`, running `create` to provision and
    /// bind one if there is none yet.
    ///
    /// `create` runs at most once per repository at a time; callers that
    /// arrive while it is running wait for its result.
    pub async fn get_or_create<F, Fut>(&self, repo: &RepoId, create: F) -> DocsResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DocsResult<String>>,
    {
        let slot = self.slot(repo);
        if let Some(agent_id) = slot.get() {
            tracing::debug!(repo = %repo, agent_id = %agent_id, "agent already bound");
            return Ok(agent_id.clone());
        }
        let agent_id = slot.get_or_try_init(create).await?;
        Ok(agent_id.clone())
    }

    /// All bindings, ordered by repository id.
    pub fn bindings(&self) -> Vec<RepoBinding> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut bindings: Vec<RepoBinding> = slots
            .iter()
            .filter_map(|(repo, slot)| {
                slot.get().map(|agent_id| RepoBinding {
                    repository_id: repo.clone(),
                    agent_id: agent_id.clone(),
                })
            })
            .collect();
        bindings.sort_by(|a, b| a.repository_id.cmp(&b.repository_id));
        bindings
    }

    fn slot(&self, repo: &RepoId) -> Slot {
        {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(repo) {
                return slot.clone();
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.entry(repo.clone()).or_default().clone()
    }
}
