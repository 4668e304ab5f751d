//! Storage for generated documentation.
//!
//! The [`DocumentStore`] trait keeps the pipeline independent of where
//! documents live. Two implementations are provided:
//!
//! - [`MemoryDocumentStore`]: `HashMap` behind a `RwLock`; contents are lost
//!   on restart. Used when `[store].dir` is unset and in tests.
//! - [`FileDocumentStore`]: one JSON file per repository under a directory.
//!
//! Both have overwrite semantics: storing a document for a repository
//! replaces the previous one. There is no versioning.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::StoreConfig;
use crate::models::{GeneratedDocument, RepoId};

/// Abstract storage backend for generated documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a document, replacing any previous one for the same repository.
    async fn put(&self, doc: GeneratedDocument) -> Result<()>;

    /// Fetch the stored document for a repository.
    async fn get(&self, repo: &RepoId) -> Result<Option<GeneratedDocument>>;
}

/// Create the store selected by configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match &config.dir {
        Some(dir) => Ok(Arc::new(FileDocumentStore::open(dir.clone())?)),
        None => Ok(Arc::new(MemoryDocumentStore::new())),
    }
}

// ============ In-memory ============

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<RepoId, GeneratedDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, doc: GeneratedDocument) -> Result<()> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(doc.repository_id.clone(), doc);
        Ok(())
    }

    async fn get(&self, repo: &RepoId) -> Result<Option<GeneratedDocument>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(repo).cloned())
    }
}

// ============ File-backed ============

/// On-disk record for one repository's document.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    repository_id: String,
    generated_at: DateTime<Utc>,
    raw_text: String,
}

/// Stores each document as `<dir>/<sha256-prefix>.json`.
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, repo: &RepoId) -> PathBuf {
        self.dir.join(format!("{}.json", repo.short_hash()))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn put(&self, doc: GeneratedDocument) -> Result<()> {
        let path = self.path_for(&doc.repository_id);
        let record = StoredDocument {
            repository_id: doc.repository_id.to_string(),
            generated_at: doc.generated_at,
            raw_text: doc.raw_text,
        };
        let bytes = serde_json::to_vec(&record)?;

        // Write then rename so readers never see a partial file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move document into {}", path.display()))?;
        Ok(())
    }

    async fn get(&self, repo: &RepoId) -> Result<Option<GeneratedDocument>> {
        let path = self.path_for(repo);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let record: StoredDocument = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt document file: {}", path.display()))?;
        Ok(Some(GeneratedDocument {
            repository_id: RepoId::from_url(&record.repository_id)?,
            raw_text: record.raw_text,
            generated_at: record.generated_at,
        }))
    }
}
