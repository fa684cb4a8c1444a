//! Persisted example and non-violation stores
//!
//! Architecture: Repository Layer - stores own every read and write of moderation data
//! - The example store keeps texts and their embeddings as parallel sequences
//! - Each learning event rewrites the whole blob before memory is updated
//! - Embeddings are derived data and may be served from the persisted cache

pub mod bootstrap;
pub mod clearance;

use crate::cache::{CacheStatistics, EmbeddingCache};
use crate::config::{default_examples, StorageConfig};
use crate::detector::{Embedder, Embedding};
use crate::domain::violations::{Example, ModerationError, ModerationResult, Severity};
use std::fs;
use std::path::{Path, PathBuf};

pub use clearance::NonViolationStore;

const STORE_NAME: &str = "examples";

/// Where the examples of a freshly opened store came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSource {
    /// The persisted blob
    Persisted,
    /// The bootstrap text file, now persisted
    BootstrapFile,
    /// The built-in seed set, now persisted
    Defaults,
}

impl std::fmt::Display for BootstrapSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted => write!(f, "persisted store"),
            Self::BootstrapFile => write!(f, "bootstrap file"),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Labeled examples with one embedding per example
#[derive(Debug)]
pub struct ExampleStore {
    blob_path: Option<PathBuf>,
    examples: Vec<Example>,
    embeddings: Vec<Embedding>,
    cache: Option<EmbeddingCache>,
}

impl ExampleStore {
    /// Open the persisted store, bootstrapping it on first use
    pub fn open(
        storage: &StorageConfig,
        embedder: &dyn Embedder,
    ) -> ModerationResult<(Self, BootstrapSource)> {
        let (examples, source) = load_examples(storage)?;
        if source != BootstrapSource::Persisted {
            write_blob(&storage.examples, &examples)?;
            tracing::info!(
                "Initialized {} with {} examples from {}",
                storage.examples.display(),
                examples.len(),
                source
            );
        }

        let mut cache = storage.embedding_cache.as_deref().map(open_cache);
        let embeddings = derive_embeddings(&mut cache, &examples, embedder)?;

        let store =
            Self { blob_path: Some(storage.examples.clone()), examples, embeddings, cache };
        Ok((store, source))
    }

    /// Store that lives only in memory
    pub fn in_memory(examples: Vec<Example>, embedder: &dyn Embedder) -> ModerationResult<Self> {
        let embeddings = derive_embeddings(&mut None, &examples, embedder)?;
        Ok(Self { blob_path: None, examples, embeddings, cache: None })
    }

    /// Examples in store order
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Embeddings, parallel to `examples()`
    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the store holds no examples
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Persisted blob, if any
    pub fn blob_path(&self) -> Option<&Path> {
        self.blob_path.as_deref()
    }

    /// Embedding cache statistics, when a cache is configured
    pub fn cache_statistics(&self) -> Option<CacheStatistics> {
        self.cache.as_ref().map(EmbeddingCache::statistics)
    }

    /// Append a new example, re-embed the whole store and persist it.
    /// Memory is only updated once both steps succeeded.
    pub fn learn_violation(
        &mut self,
        text: &str,
        severity: Severity,
        embedder: &dyn Embedder,
    ) -> ModerationResult<()> {
        let mut candidate = self.examples.clone();
        candidate.push(Example::learned(text, severity));

        let embeddings = derive_embeddings(&mut self.cache, &candidate, embedder)?;
        if let Some(path) = &self.blob_path {
            write_blob(path, &candidate)?;
        }

        self.examples = candidate;
        self.embeddings = embeddings;
        tracing::info!("Learned violation [{}]: {}", severity, text);
        Ok(())
    }

    /// Re-read the blob and re-derive every embedding
    pub fn reload(&mut self, embedder: &dyn Embedder) -> ModerationResult<()> {
        let examples = match &self.blob_path {
            Some(path) => read_blob(path)?,
            None => self.examples.clone(),
        };

        let embeddings = derive_embeddings(&mut self.cache, &examples, embedder)?;
        self.examples = examples;
        self.embeddings = embeddings;
        Ok(())
    }
}

fn load_examples(storage: &StorageConfig) -> ModerationResult<(Vec<Example>, BootstrapSource)> {
    if storage.examples.exists() {
        let examples = read_blob(&storage.examples)?;
        tracing::debug!(
            "Loaded {} examples from {}",
            examples.len(),
            storage.examples.display()
        );
        return Ok((examples, BootstrapSource::Persisted));
    }

    if storage.bootstrap.exists() {
        let examples = bootstrap::load_file(&storage.bootstrap);
        if !examples.is_empty() {
            return Ok((examples, BootstrapSource::BootstrapFile));
        }
        tracing::warn!(
            "Bootstrap file {} has no usable lines; using built-in examples",
            storage.bootstrap.display()
        );
    }

    Ok((default_examples(), BootstrapSource::Defaults))
}

fn read_blob(path: &Path) -> ModerationResult<Vec<Example>> {
    let content = fs::read_to_string(path).map_err(|e| {
        ModerationError::store(STORE_NAME, format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        ModerationError::store(STORE_NAME, format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn write_blob(path: &Path, examples: &[Example]) -> ModerationResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(examples)
        .map_err(|e| ModerationError::store(STORE_NAME, format!("Failed to serialize: {e}")))?;

    fs::write(path, content).map_err(|e| {
        ModerationError::store(STORE_NAME, format!("Failed to write {}: {}", path.display(), e))
    })
}

fn open_cache(path: &Path) -> EmbeddingCache {
    let mut cache = EmbeddingCache::new(path);
    if let Err(e) = cache.load() {
        tracing::warn!("Ignoring embedding cache {}: {}", path.display(), e);
        cache.reset();
    }
    cache
}

fn derive_embeddings(
    cache: &mut Option<EmbeddingCache>,
    examples: &[Example],
    embedder: &dyn Embedder,
) -> ModerationResult<Vec<Embedding>> {
    let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
    let fingerprint = EmbeddingCache::fingerprint(embedder.model_id(), &texts);

    if let Some(cache) = cache.as_mut() {
        if let Some(hit) = cache.lookup(&fingerprint, texts.len()) {
            tracing::debug!("Reusing {} cached example embeddings", texts.len());
            let embeddings = hit.to_vec();
            save_cache(cache);
            return Ok(embeddings);
        }
    }

    let embeddings = embedder.embed_batch(&texts)?;
    if embeddings.len() != texts.len() {
        return Err(ModerationError::embedding(format!(
            "model returned {} embeddings for {} examples",
            embeddings.len(),
            texts.len()
        )));
    }

    if let Some(cache) = cache.as_mut() {
        cache.update(fingerprint, embedder.model_id(), embeddings.clone());
        save_cache(cache);
    }

    Ok(embeddings)
}

/// Persists vectors and hit/miss counters; a failed write only costs the cache
fn save_cache(cache: &mut EmbeddingCache) {
    if let Err(e) = cache.save() {
        tracing::warn!("Failed to save embedding cache {}: {}", cache.path().display(), e);
    }
}
