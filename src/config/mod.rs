mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level vault-agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Root of the Markdown vault; defaults to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_dir: Option<PathBuf>,

    /// State directory for persistent data.
    #[serde(skip)]
    pub state_dir: PathBuf,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(config_path) if config_path.exists() => {
                info!("Loading config from {}", config_path.display());
                load_config_file(&config_path)?
            }
            Some(config_path) => {
                anyhow::bail!("Config file '{}' does not exist", config_path.display());
            }
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.state_dir = resolve_state_dir();

        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        write_config_file(Path::new(path), &Config::default())
    }

    /// Vault root, falling back to the working directory.
    pub fn vault_root(&self) -> PathBuf {
        self.vault_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Where the index snapshot lives.
    pub fn snapshot_path(&self) -> PathBuf {
        match &self.index.snapshot_file {
            Some(file) if file.is_absolute() => file.clone(),
            Some(file) => self.state_dir.join(file),
            None => self.state_dir.join(DEFAULT_SNAPSHOT_FILE),
        }
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai.api_key = Some(key);
            }
        }

        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }

        if let Ok(dir) = std::env::var("VAULT_AGENT_VAULT_DIR") {
            self.vault_dir = Some(PathBuf::from(dir));
        }

        if let Ok(model) = std::env::var("VAULT_AGENT_MODEL") {
            self.agent.model = model;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            agent: AgentConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            logging: LoggingConfig::default(),
            vault_dir: None,
            state_dir: resolve_state_dir(),
        }
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("vault-agent.json"),
        PathBuf::from("vault-agent.json5"),
        PathBuf::from("vault-agent.yaml"),
        PathBuf::from("vault-agent.yml"),
        PathBuf::from("vault-agent.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // Check home directory
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".vault-agent").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Resolve the state directory for persistent data.
fn resolve_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VAULT_AGENT_STATE_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|h| h.join(".vault-agent"))
        .unwrap_or_else(|| PathBuf::from(".vault-agent"))
}
