//! Configuration for the knowledge base.

use std::path::{Path, PathBuf};

use rigpa_embeddings::{DEFAULT_BATCH_SIZE, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KnowledgeError, Result};

/// Top-level configuration, usually read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// JSON file holding the persisted user-added documents.
    pub storage_path: PathBuf,

    /// JSON file holding imported dictionary definitions.
    pub definitions_path: PathBuf,

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Embedding gateway configuration.
    pub embedding: EmbeddingConfig,

    /// Search configuration.
    pub search: SearchConfig,

    /// Prompt assembly configuration.
    pub prompt: PromptConfig,

    /// Dictionary import configuration.
    pub dictionary: DictionaryConfig,
}

impl KnowledgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| KnowledgeError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KnowledgeError::Config(e.to_string()))
    }

    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("rigpa")
            .join("config.toml")
    }

    /// Set the storage path.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            storage_path: dirs::data_dir()
                .unwrap_or_default()
                .join("rigpa")
                .join("custom-texts.json"),
            definitions_path: dirs::data_dir()
                .unwrap_or_default()
                .join("rigpa")
                .join("definitions.json"),
            log_level: "rigpa=info".to_string(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            prompt: PromptConfig::default(),
            dictionary: DictionaryConfig::default(),
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings.
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Maximum number of documents per embeddings request.
    pub batch_size: usize,

    /// Maximum cache size. Zero disables the cache.
    pub cache_max_entries: usize,

    /// File backing the embedding cache. `None` keeps it in memory.
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            cache_max_entries: 10_000,
            cache_path: Some(
                dirs::cache_dir()
                    .unwrap_or_default()
                    .join("rigpa")
                    .join("embeddings.json"),
            ),
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results used when building an augmented prompt.
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Text wrapped around retrieved context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// First line of the context block.
    pub preamble: String,

    /// Instruction appended after the context block.
    pub closing_instruction: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            preamble: "Relevant knowledge from the Dzogchen database:".to_string(),
            closing_instruction: "Use the above knowledge to inform your response. When \
                referencing Tibetan terms from the knowledge base, include the Tibetan script, \
                transliteration, and translation as shown in the reference material."
                .to_string(),
        }
    }
}

/// Configuration for the external dictionary import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// MediaWiki `api.php` endpoint.
    pub base_url: String,

    /// Pause between consecutive requests, in milliseconds.
    pub request_delay_ms: u64,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rywiki.tsadra.org/api.php".to_string(),
            request_delay_ms: 800,
        }
    }
}
