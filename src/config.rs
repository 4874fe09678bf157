use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

/// A keyword-boost rule: when `term` appears in the query and `term` (or any
/// of `aliases`) appears in a chunk, the chunk's distance is multiplied by
/// `factor`. Factors below 1.0 improve rank; multiple matching rules compound.
#[derive(Debug, Deserialize, Clone)]
pub struct BoostRule {
    pub term: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub factor: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Maximum distance for a chunk to count as relevant in single-document
    /// Q&A.
    #[serde(default = "default_chat_threshold")]
    pub chat_threshold: f64,
    /// Cutoff for aggregate extraction, compared against the reciprocal of
    /// the accumulated relevance score.
    #[serde(default = "default_extract_threshold")]
    pub extract_threshold: f64,
    #[serde(default)]
    pub boost: Vec<BoostRule>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            chat_threshold: default_chat_threshold(),
            extract_threshold: default_extract_threshold(),
            boost: Vec::new(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_chat_threshold() -> f64 {
    1.5
}
fn default_extract_threshold() -> f64 {
    1.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub url: String,
    /// Deadline for the chat path (connection + first token).
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
    /// Deadline for the bulk-extraction path, which produces much longer
    /// completions.
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_secs: u64,
    /// Model selector table: user-facing name to backend model id.
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_generation_url(),
            timeout_secs: default_chat_timeout(),
            extract_timeout_secs: default_extract_timeout(),
            models: default_models(),
            default_model: default_model(),
        }
    }
}

fn default_generation_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_chat_timeout() -> u64 {
    15
}
fn default_extract_timeout() -> u64 {
    40
}
fn default_models() -> BTreeMap<String, String> {
    let mut models = BTreeMap::new();
    models.insert("llama".to_string(), "llama3.1:8b".to_string());
    models.insert("deepseek".to_string(), "deepseek-r1:14b".to_string());
    models
}
fn default_model() -> String {
    "llama".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    pub folder: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string(), "**/*.txt".to_string()]
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// A self-contained default configuration (store in `./data`), used by
    /// tests and as a fallback when no config file exists yet.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("./data/pdfctx.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            watch: None,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.chat_threshold <= 0.0 || config.retrieval.extract_threshold <= 0.0 {
        anyhow::bail!("retrieval thresholds must be > 0");
    }
    for rule in &config.retrieval.boost {
        if rule.factor <= 0.0 {
            anyhow::bail!("retrieval.boost factor for '{}' must be > 0", rule.term);
        }
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" | "hash" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, hash, ollama, or openai.",
            other
        ),
    }

    // Validate generation
    if !config
        .generation
        .models
        .contains_key(&config.generation.default_model)
    {
        anyhow::bail!(
            "generation.default_model '{}' is not in [generation.models]",
            config.generation.default_model
        );
    }

    // Validate watch
    if let Some(ref watch) = config.watch {
        if watch.poll_interval_secs == 0 {
            anyhow::bail!("watch.poll_interval_secs must be > 0");
        }
    }

    Ok(config)
}
