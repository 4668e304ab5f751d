//! Repository snapshots: the document payload ingested into a knowledge
//! source.
//!
//! A snapshot is the plain-text concatenation of a repository's text files,
//! one `=== path ===` header per file. It packs content for the agent
//! service; nothing here parses or interprets the code.
//!
//! Workflow for [`GitSnapshotter`]:
//! 1. Remote URLs (see [`RepoId::is_remote`]) are `git clone`d (shallow if
//!    configured) into a temporary directory that is removed afterwards.
//!    Local directories are used in place, but only when
//!    `allow_local_paths` is set. Anything else is a validation error.
//! 2. Walk the tree, applying include/exclude globs (`.git`, `target` and
//!    `node_modules` are always excluded).
//! 3. Skip files over `max_file_bytes` and files that are not UTF-8.
//! 4. Skip any file that would push the snapshot past `max_total_bytes`;
//!    smaller files after it are still added.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::process::Command;
use walkdir::WalkDir;

use crate::config::SnapshotConfig;
use crate::error::{DocsError, DocsResult};
use crate::models::{DocumentPayload, RepoId};

/// Produces the document payload for a repository.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, repo: &RepoId) -> DocsResult<DocumentPayload>;
}

/// Snapshots remote repositories via `git clone`, and local directories
/// directly when the config allows them.
pub struct GitSnapshotter {
    config: SnapshotConfig,
}

impl GitSnapshotter {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SnapshotSource for GitSnapshotter {
    async fn snapshot(&self, repo: &RepoId) -> DocsResult<DocumentPayload> {
        check_location(repo, self.config.allow_local_paths)?;
        let config = self.config.clone();
        let repo = repo.clone();
        tokio::task::spawn_blocking(move || snapshot_blocking(&config, &repo))
            .await
            .map_err(|e| DocsError::Snapshot(e.into()))?
            .map_err(DocsError::Snapshot)
    }
}

/// Check that `repo` names something a snapshot may be taken of: a remote
/// git URL, or an existing directory when `allow_local_paths` is set.
pub fn check_location(repo: &RepoId, allow_local_paths: bool) -> DocsResult<()> {
    if repo.is_remote() {
        return Ok(());
    }
    if allow_local_paths {
        if Path::new(repo.as_str()).is_dir() {
            return Ok(());
        }
        return Err(DocsError::validation(
            "repoUrl must be an https://, ssh:// or user@host:path repository URL, \
             or an existing directory",
        ));
    }
    Err(DocsError::validation(
        "repoUrl must be an https://, ssh:// or user@host:path repository URL",
    ))
}

fn snapshot_blocking(config: &SnapshotConfig, repo: &RepoId) -> Result<DocumentPayload> {
    let content = if !repo.is_remote() {
        render_tree(config, repo, Path::new(repo.as_str()))?
    } else {
        let checkout = tempfile::Builder::new()
            .prefix("docsmith-")
            .tempdir()
            .context("Failed to create temporary checkout directory")?;
        let dest = checkout.path().join("repo");
        git_clone(repo.as_str(), config.branch.as_deref(), config.shallow, &dest)?;
        render_tree(config, repo, &dest)?
    };

    Ok(DocumentPayload {
        file_name: format!("{}.txt", repo.resource_name()),
        content,
    })
}

fn git_clone(url: &str, branch: Option<&str>, shallow: bool, dest: &Path) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.arg("clone");
    if let Some(branch) = branch {
        cmd.args(["--branch", branch, "--single-branch"]);
    }
    if shallow {
        cmd.args(["--depth", "1"]);
    }
    cmd.arg("--");
    cmd.arg(url);
    cmd.arg(dest);

    tracing::info!(url, shallow, "cloning repository");
    let output = cmd
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

/// Concatenate the matching text files under `root` into one document.
pub fn render_tree(config: &SnapshotConfig, repo: &RepoId, root: &Path) -> Result<String> {
    let include_set = build_globset(&config.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        ".git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        if entry.metadata()?.len() > config.max_file_bytes {
            tracing::debug!(path = %rel_str, "skipping oversized file");
            continue;
        }
        files.push((rel_str, path.to_path_buf()));
    }

    let mut out = format!("Repository: {}\n", repo);
    let mut included = 0usize;
    let mut skipped = 0usize;
    for (rel, path) in files {
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(_) => {
                // Binary or otherwise unreadable as text.
                skipped += 1;
                continue;
            }
        };
        let block = format!("\n=== {} ===\n{}\n", rel, body.trim_end());
        if out.len() + block.len() > config.max_total_bytes {
            skipped += 1;
            continue;
        }
        out.push_str(&block);
        included += 1;
    }

    tracing::info!(
        repo = %repo,
        files = included,
        skipped,
        bytes = out.len(),
        "repository snapshot built"
    );

    if included == 0 {
        bail!("no text files matched in {}", root.display());
    }

    Ok(out)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("README.md"), "# Demo\n\nA demo repo.\n").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("target/debug/out.txt"), "build output").unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::write(root.join("logo.png"), [0x89u8, 0x50, 0xff, 0xfe, 0x00]).unwrap();
        tmp
    }

    #[test]
    fn test_render_tree_includes_text_files() {
        let tmp = fixture();
        let repo = RepoId::from_url(tmp.path().to_str().unwrap()).unwrap();
        let out = render_tree(&SnapshotConfig::default(), &repo, tmp.path()).unwrap();

        assert!(out.starts_with("Repository: "));
        assert!(out.contains("=== README.md ===\n# Demo"));
        assert!(out.contains("=== src/main.rs ===\nfn main() {}"));
        assert!(!out.contains("build output"));
        assert!(!out.contains("refs/heads/main"));
        assert!(!out.contains("logo.png"));
    }

    #[test]
    fn test_render_tree_respects_globs() {
        let tmp = fixture();
        let repo = RepoId::from_url(tmp.path().to_str().unwrap()).unwrap();
        let config = SnapshotConfig {
            include_globs: vec!["**/*.rs".to_string()],
            ..Default::default()
        };
        let out = render_tree(&config, &repo, tmp.path()).unwrap();
        assert!(out.contains("src/main.rs"));
        assert!(!out.contains("README.md"));
    }

    #[test]
    fn test_render_tree_total_cap() {
        let tmp = fixture();
        let repo = RepoId::from_url(tmp.path().to_str().unwrap()).unwrap();
        let config = SnapshotConfig {
            max_total_bytes: 200 + tmp.path().to_string_lossy().len(),
            ..Default::default()
        };
        fs::write(tmp.path().join("big.txt"), "x".repeat(4096)).unwrap();
        let out = render_tree(&config, &repo, tmp.path()).unwrap();
        assert!(!out.contains("big.txt"));
        assert!(out.len() <= config.max_total_bytes);
        // Files walked after the oversized one still fit and are kept.
        assert!(out.contains("=== src/main.rs ===\nfn main() {}"));
    }

    #[test]
    fn test_render_tree_no_matches_fails() {
        let tmp = fixture();
        let repo = RepoId::from_url(tmp.path().to_str().unwrap()).unwrap();
        let config = SnapshotConfig {
            include_globs: vec!["**/*.zig".to_string()],
            ..Default::default()
        };
        assert!(render_tree(&config, &repo, tmp.path()).is_err());
    }

    #[tokio::test]
    async fn test_snapshot_local_directory() {
        let tmp = fixture();
        let repo = RepoId::from_url(tmp.path().to_str().unwrap()).unwrap();
        let config = SnapshotConfig {
            allow_local_paths: true,
            ..Default::default()
        };
        let payload = GitSnapshotter::new(config).snapshot(&repo).await.unwrap();
        assert!(payload.file_name.ends_with(".txt"));
        assert!(payload.content.contains("A demo repo."));
    }

    #[tokio::test]
    async fn test_local_directory_rejected_by_default() {
        let tmp = fixture();
        let repo = RepoId::from_url(tmp.path().to_str().unwrap()).unwrap();
        let err = GitSnapshotter::new(SnapshotConfig::default())
            .snapshot(&repo)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_option_like_and_file_urls_rejected() {
        let config = SnapshotConfig {
            allow_local_paths: true,
            ..Default::default()
        };
        let snapshotter = GitSnapshotter::new(config);
        for url in ["-oProxyCommand=x", "file:///etc", "/nonexistent/docsmith/repo"] {
            let repo = RepoId::from_url(url).unwrap();
            let err = snapshotter.snapshot(&repo).await.unwrap_err();
            assert!(matches!(err, DocsError::Validation(_)), "{}", url);
        }
    }
}
