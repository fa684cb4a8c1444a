//! Configuration loading and management for the moderation assistant
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Default thresholds and seed examples are embedded in the domain, not infrastructure
//! - Configuration names every file the stores read and rewrite

use crate::domain::violations::{Example, ModerationError, ModerationResult, Severity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration files probed in the working directory when none is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] = ["moderation.yaml", "moderation.yml", ".moderation.yaml"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Configuration format version
    pub version: String,
    /// Files read and written by the stores
    #[serde(default)]
    pub storage: StorageConfig,
    /// Matching thresholds
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Sentence embedding backend
    #[serde(default)]
    pub embedder: EmbedderConfig,
    /// Interactive session settings
    #[serde(default)]
    pub session: SessionConfig,
}

/// Locations of persisted and bootstrap data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persisted example blob
    pub examples: PathBuf,
    /// Persisted non-violation blob
    pub non_violations: PathBuf,
    /// One-time bootstrap text file (`<text> - <level>` per line)
    pub bootstrap: PathBuf,
    /// Abbreviation dictionary (JSON object)
    pub abbreviations: PathBuf,
    /// Persisted embedding cache; disabled when absent
    #[serde(default)]
    pub embedding_cache: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            examples: PathBuf::from("vio_words.json"),
            non_violations: PathBuf::from("non_vio_words.json"),
            bootstrap: PathBuf::from("luat_data.txt"),
            abbreviations: PathBuf::from("toxic_abb.json"),
            embedding_cache: Some(PathBuf::from(".moderation").join("embedding_cache.json")),
        }
    }
}

/// Thresholds used by the detector and abbreviation matcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum cosine similarity for a reported match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Minimum fuzzy score (0..=100) for an abbreviation hit
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// Which embedding backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Hashed word and character-trigram features, for offline runs and tests
    Ngram,
    /// all-MiniLM-L6-v2 sentence encoder (requires the `minilm` feature)
    #[default]
    Minilm,
}

/// Embedding backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Backend to use
    #[serde(default)]
    pub kind: EmbedderKind,
    /// Vector size for the n-gram backend
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Hub repository for the transformer backend
    #[serde(default = "default_model")]
    pub model: String,
    /// Number of embeddings memoized in memory (0 disables)
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::default(),
            dimensions: default_dimensions(),
            model: default_model(),
            memo_capacity: default_memo_capacity(),
        }
    }
}

/// Interactive session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Input that ends the session (compared case-insensitively)
    #[serde(default = "default_exit_keyword")]
    pub exit_keyword: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { exit_keyword: default_exit_keyword() }
    }
}

impl ModerationConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ModerationResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ModerationError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            ModerationError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> ModerationResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ModerationError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the first configuration file found in the working directory,
    /// falling back to defaults
    pub fn discover() -> ModerationResult<Self> {
        for config_name in &DEFAULT_CONFIG_FILES {
            if Path::new(config_name).exists() {
                tracing::debug!("Using configuration file {}", config_name);
                return Self::load_from_file(config_name);
            }
        }
        Ok(Self::default())
    }

    /// Get default configuration
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            storage: StorageConfig::default(),
            detection: DetectionConfig::default(),
            embedder: EmbedderConfig::default(),
            session: SessionConfig::default(),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> ModerationResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(ModerationError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        let similarity = self.detection.similarity_threshold;
        if !(-1.0..=1.0).contains(&similarity) {
            return Err(ModerationError::config(format!(
                "similarity_threshold must be within -1.0..=1.0, got {similarity}"
            )));
        }

        let fuzzy = self.detection.fuzzy_threshold;
        if !(0.0..=100.0).contains(&fuzzy) {
            return Err(ModerationError::config(format!(
                "fuzzy_threshold must be within 0..=100, got {fuzzy}"
            )));
        }

        if self.embedder.dimensions == 0 {
            return Err(ModerationError::config("embedder dimensions must be positive"));
        }

        if self.embedder.kind == EmbedderKind::Minilm && !cfg!(feature = "minilm") {
            return Err(ModerationError::config(
                "embedder kind 'minilm' requires building with the `minilm` feature",
            ));
        }

        if self.session.exit_keyword.trim().is_empty() {
            return Err(ModerationError::config("exit_keyword must not be empty"));
        }

        let storage = &self.storage;
        if storage.examples == storage.non_violations {
            return Err(ModerationError::config(format!(
                "examples and non_violations must be different files ('{}')",
                storage.examples.display()
            )));
        }

        Ok(())
    }

    /// Fingerprint of the settings that change detection results
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(self.version.as_bytes());
        hasher.update(self.detection.similarity_threshold.to_le_bytes());
        hasher.update(self.detection.fuzzy_threshold.to_le_bytes());
        hasher.update(format!("{:?}", self.embedder.kind).as_bytes());
        hasher.update((self.embedder.dimensions as u64).to_le_bytes());
        hasher.update(self.embedder.model.as_bytes());

        format!("{:x}", hasher.finalize())[..16].to_string()
    }

    /// Whether an input line asks to end the session
    pub fn is_exit(&self, input: &str) -> bool {
        input.trim().to_lowercase() == self.session.exit_keyword.trim().to_lowercase()
    }

    /// Resolve every relative storage path against `root`
    pub fn rooted_at<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        let resolve = |path: &PathBuf| {
            if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            }
        };

        self.storage.examples = resolve(&self.storage.examples);
        self.storage.non_violations = resolve(&self.storage.non_violations);
        self.storage.bootstrap = resolve(&self.storage.bootstrap);
        self.storage.abbreviations = resolve(&self.storage.abbreviations);
        self.storage.embedding_cache = self.storage.embedding_cache.as_ref().map(resolve);
        self
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Built-in seed examples used when neither a persisted store nor a
/// bootstrap file exists
pub fn default_examples() -> Vec<Example> {
    vec![
        Example::new("Spam tin nhắn gây phiền hà", Severity::Serious),
        Example::new("Chat nội dung 18+", Severity::Severe),
        Example::new("Chửi tục, dùng những từ toxic", Severity::Severe),
        Example::new("Dùng những từ không phù hợp với tiêu chuẩn cộng đồng", Severity::Severe),
        Example::new("Xúc phạm người khác", Severity::Severe),
        Example::new("Kêu gọi, sát sinh", Severity::Critical),
        Example::new(
            "Quảng cáo server khác (nội dung có chứa bạn có muốn vào server discord mình không, /discord.gg/...)",
            Severity::Critical,
        ),
    ]
}

fn default_similarity_threshold() -> f64 {
    0.60
}

fn default_fuzzy_threshold() -> f64 {
    80.0
}

fn default_dimensions() -> usize {
    512
}

fn default_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_memo_capacity() -> usize {
    1024
}

fn default_exit_keyword() -> String {
    "exit".to_string()
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: ModerationConfig,
    root: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: ModerationConfig::default(), root: None }
    }

    /// Keep every data file under `dir`
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root = Some(dir.into());
        self
    }

    /// Set the similarity threshold
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.detection.similarity_threshold = threshold;
        self
    }

    /// Set the fuzzy abbreviation threshold
    pub fn fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.config.detection.fuzzy_threshold = threshold;
        self
    }

    /// Choose the embedding backend
    pub fn embedder(mut self, kind: EmbedderKind) -> Self {
        self.config.embedder.kind = kind;
        self
    }

    /// Set or disable the persisted embedding cache
    pub fn embedding_cache(mut self, path: Option<PathBuf>) -> Self {
        self.config.storage.embedding_cache = path;
        self
    }

    /// Set the exit keyword
    pub fn exit_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.config.session.exit_keyword = keyword.into();
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ModerationResult<ModerationConfig> {
        self.config.validate()?;
        Ok(match self.root {
            Some(root) => self.config.rooted_at(root),
            None => self.config,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
