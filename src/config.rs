use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub agent_service: AgentServiceConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding")]
    pub embedding: String,
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            model: default_model(),
            embedding: default_embedding(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.letta.com".to_string()
}
fn default_api_key_env() -> String {
    "LETTA_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_embedding() -> String {
    "openai/text-embedding-3-small".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvisioningConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_poll_attempts() -> u32 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,
    #[serde(default = "default_instructions")]
    pub instructions: String,
    /// Message sent to a repository's agent to produce its documentation.
    #[serde(default = "default_documentation_prompt")]
    pub documentation_prompt: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            instructions: default_instructions(),
            documentation_prompt: default_documentation_prompt(),
        }
    }
}

fn default_persona_name() -> String {
    "docs-assistant".to_string()
}

fn default_instructions() -> String {
    "You are the internal documentation assistant for a single software repository. \
     Answer only from the repository content attached to you as a knowledge source. \
     If a question is unrelated to this repository or its documentation, politely \
     decline and say that you can only help with this repository."
        .to_string()
}

fn default_documentation_prompt() -> String {
    "Write the internal documentation for this repository using only the attached \
     repository content. Use a short heading line for each part, for example \
     Overview:, Architecture:, Installation:, Configuration:, Usage:, API:, \
     Deployment:, Testing: and Troubleshooting:, followed by plain-text paragraphs."
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_branch")]
    pub branch: Option<String>,
    #[serde(default = "default_shallow")]
    pub shallow: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: usize,
    /// Accept local directories as repositories. Off for the server; the
    /// CLI turns it on.
    #[serde(default = "default_allow_local_paths")]
    pub allow_local_paths: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            branch: default_branch(),
            shallow: default_shallow(),
            max_file_bytes: default_max_file_bytes(),
            max_total_bytes: default_max_total_bytes(),
            allow_local_paths: default_allow_local_paths(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_branch() -> Option<String> {
    None
}
fn default_shallow() -> bool {
    true
}
fn default_max_file_bytes() -> u64 {
    256 * 1024
}
fn default_max_total_bytes() -> usize {
    8 * 1024 * 1024
}
fn default_allow_local_paths() -> bool {
    false
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Directory for persisted documents. In-memory when unset.
    pub dir: Option<PathBuf>,
}

/// A repo→agent binding known before startup.
#[derive(Debug, Deserialize, Clone)]
pub struct BindingConfig {
    pub repo_url: String,
    pub agent_id: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    let base_url = &config.agent_service.base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        anyhow::bail!(
            "agent_service.base_url must start with http:// or https://, got '{}'",
            base_url
        );
    }

    if config.agent_service.timeout_secs == 0 {
        anyhow::bail!("agent_service.timeout_secs must be > 0");
    }

    if config.provisioning.max_poll_attempts == 0 {
        anyhow::bail!("provisioning.max_poll_attempts must be >= 1");
    }

    if config.snapshot.max_total_bytes == 0 {
        anyhow::bail!("snapshot.max_total_bytes must be > 0");
    }

    if config.snapshot.include_globs.is_empty() {
        anyhow::bail!("snapshot.include_globs must contain at least one pattern");
    }

    for binding in &config.bindings {
        if binding.repo_url.trim().is_empty() || binding.agent_id.trim().is_empty() {
            anyhow::bail!("bindings entries need a non-empty repo_url and agent_id");
        }
    }

    Ok(config)
}
