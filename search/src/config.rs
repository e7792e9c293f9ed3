//! Configuration for tender search.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tender_embeddings::{
    DEFAULT_HASHING_DIMENSION, EmbeddingProvider, HashingProvider, OpenAIProvider,
};

use crate::error::{Result, SearchError};

/// Environment variable overriding [`SearchConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "TENDERS_DATA_DIR";

/// Public tender notices endpoint.
pub const DEFAULT_FEED_URL: &str = "https://gpp.ppda.go.ug/adminapi/public/api/tender/notices";

/// Configuration for tender search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Directory holding saved partitions and the feed backup.
    pub data_dir: PathBuf,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Query defaults.
    pub query: QueryConfig,

    /// Source record feed.
    pub feed: FeedConfig,
}

impl SearchConfig {
    /// Create a configuration with default values rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
            feed: FeedConfig::default(),
        }
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Default config file location, `<config dir>/tenders/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tenders").join("config.toml"))
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// Load from `path`, or defaults when no path is given or the file
    /// does not exist. [`DATA_DIR_ENV`] overrides the data directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(path)?;
                Self::from_toml(&text)?
            }
            _ => Self::default(),
        };

        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values no search could use.
    pub fn validate(&self) -> Result<()> {
        if !self.query.threshold.is_finite() {
            return Err(SearchError::Config(
                "query.threshold must be a finite number".to_string(),
            ));
        }
        if self.embedding.dimension == Some(0) {
            return Err(SearchError::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Where the raw feed is backed up.
    pub fn backup_path(&self) -> PathBuf {
        self.feed
            .backup_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("tenders_raw.json"))
    }

    /// Directory holding saved partitions.
    pub fn partitions_dir(&self) -> PathBuf {
        self.data_dir.join("partitions")
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("tenders"))
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: Option<String>,

    /// Output dimension.
    pub dimension: Option<usize>,

    /// API base URL override.
    pub base_url: Option<String>,

    /// Normalize vectors to unit length.
    pub normalize: bool,

    /// Maximum inputs per provider request.
    pub max_batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAI,
            model: None,
            dimension: None,
            base_url: None,
            normalize: true,
            max_batch_size: 512,
        }
    }
}

impl EmbeddingConfig {
    /// Offline hashing provider settings.
    pub fn hashing() -> Self {
        Self {
            provider: EmbeddingProviderType::Hashing,
            ..Self::default()
        }
    }

    /// Instantiate the configured provider.
    pub fn build_provider(&self) -> Arc<dyn EmbeddingProvider> {
        match self.provider {
            EmbeddingProviderType::OpenAI => {
                let mut provider = OpenAIProvider::new()
                    .with_normalization(self.normalize)
                    .with_max_batch_size(self.max_batch_size);
                if let Some(model) = &self.model {
                    provider = provider.with_model(model);
                }
                if let Some(dimension) = self.dimension {
                    provider = provider.with_dimensions(dimension);
                }
                if let Some(url) = &self.base_url {
                    provider = provider.with_base_url(url);
                }
                if !provider.is_available() {
                    warn!("OPENAI_API_KEY is not set; building new partitions will fail");
                }
                Arc::new(provider)
            }
            EmbeddingProviderType::Hashing => Arc::new(HashingProvider::new(
                self.dimension.unwrap_or(DEFAULT_HASHING_DIMENSION),
            )),
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Offline feature-hashing model.
    Hashing,
}

/// Query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum number of results to return.
    pub top_k: usize,

    /// Minimum similarity score for a match.
    pub threshold: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.3,
        }
    }
}

/// Source record feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed URL.
    pub url: String,

    /// Backup file for the raw feed; defaults to `<data_dir>/tenders_raw.json`.
    pub backup_path: Option<PathBuf>,

    /// Request timeout.
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            backup_path: None,
            timeout_secs: 120,
        }
    }
}
