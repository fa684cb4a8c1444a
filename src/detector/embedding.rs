//! Sentence embedding backends
//!
//! The detector and example store only see the `Embedder` trait. The default
//! backend is all-MiniLM-L6-v2 (feature `minilm`). `NgramEmbedder` hashes word
//! and character-trigram features and is selected explicitly for offline use
//! and tests.

use crate::config::{EmbedderConfig, EmbedderKind};
use crate::domain::violations::{ModerationError, ModerationResult};
use sha2::{Digest, Sha256};

/// Embedding vector
pub type Embedding = Vec<f32>;

/// Trait for text embedding services
///
/// Implementations must return the same vector for the same text for the
/// lifetime of the process.
pub trait Embedder: Send + Sync {
    /// Identifier of the model, used to key persisted embeddings
    fn model_id(&self) -> &str;

    /// Generate embedding for text
    fn embed(&self, text: &str) -> ModerationResult<Embedding>;

    /// Batch embed multiple texts, preserving order
    fn embed_batch(&self, texts: &[&str]) -> ModerationResult<Vec<Embedding>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashed bag of lower-cased words and character trigrams
///
/// Buckets come from a SHA-256 prefix so vectors stay valid in the persisted
/// cache across builds.
#[derive(Debug, Clone)]
pub struct NgramEmbedder {
    dimensions: usize,
    model_id: String,
}

impl NgramEmbedder {
    /// Create an embedder producing vectors of `dimensions` components
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, model_id: format!("ngram-v2-{dimensions}") }
    }

    /// Vector size
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bucket(&self, feature: &str) -> usize {
        let digest = Sha256::digest(feature.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dimensions as u64) as usize
    }
}

impl Embedder for NgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, text: &str) -> ModerationResult<Embedding> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in text.to_lowercase().split_whitespace() {
            vector[self.bucket(word)] += 1.0;

            let padded: Vec<char> = std::iter::once('<')
                .chain(word.chars())
                .chain(std::iter::once('>'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(&trigram)] += 1.0;
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }

        Ok(vector)
    }
}

/// Memoizing wrapper around another embedder
#[cfg(feature = "cache")]
pub struct CachedEmbedder {
    inner: Box<dyn Embedder>,
    memo: std::sync::Mutex<lru::LruCache<String, Embedding>>,
}

#[cfg(feature = "cache")]
impl CachedEmbedder {
    /// Wrap `inner`, remembering up to `capacity` embeddings
    pub fn new(inner: Box<dyn Embedder>, capacity: std::num::NonZeroUsize) -> Self {
        Self { inner, memo: std::sync::Mutex::new(lru::LruCache::new(capacity)) }
    }

    /// Number of memoized embeddings
    pub fn memoized(&self) -> usize {
        self.memo.lock().map(|memo| memo.len()).unwrap_or(0)
    }

    fn memo(
        &self,
    ) -> ModerationResult<std::sync::MutexGuard<'_, lru::LruCache<String, Embedding>>> {
        self.memo
            .lock()
            .map_err(|_| ModerationError::embedding("embedding memo lock poisoned"))
    }
}

#[cfg(feature = "cache")]
impl Embedder for CachedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn embed(&self, text: &str) -> ModerationResult<Embedding> {
        if let Some(embedding) = self.memo()?.get(text) {
            return Ok(embedding.clone());
        }

        let embedding = self.inner.embed(text)?;
        self.memo()?.put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> ModerationResult<Vec<Embedding>> {
        let mut results: Vec<Option<Embedding>> = {
            let mut memo = self.memo()?;
            texts.iter().map(|text| memo.get(*text).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        if !missing.is_empty() {
            let uncached: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let fresh = self.inner.embed_batch(&uncached)?;
            if fresh.len() != uncached.len() {
                return Err(ModerationError::embedding(format!(
                    "model returned {} embeddings for {} texts",
                    fresh.len(),
                    uncached.len()
                )));
            }

            let mut memo = self.memo()?;
            for (i, embedding) in missing.into_iter().zip(fresh) {
                memo.put(texts[i].to_string(), embedding.clone());
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

/// Construct the embedder described by the configuration
pub fn build_embedder(config: &EmbedderConfig) -> ModerationResult<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match config.kind {
        EmbedderKind::Ngram => Box::new(NgramEmbedder::new(config.dimensions)),
        #[cfg(feature = "minilm")]
        EmbedderKind::Minilm => Box::new(super::minilm::MiniLmEmbedder::from_hub(&config.model)?),
        #[cfg(not(feature = "minilm"))]
        EmbedderKind::Minilm => {
            return Err(ModerationError::config(
                "embedder kind 'minilm' requires building with the `minilm` feature",
            ))
        }
    };

    tracing::debug!("Using embedding model {}", embedder.model_id());
    Ok(memoize(embedder, config.memo_capacity))
}

#[cfg(feature = "cache")]
fn memoize(embedder: Box<dyn Embedder>, capacity: usize) -> Box<dyn Embedder> {
    match std::num::NonZeroUsize::new(capacity) {
        Some(capacity) => Box::new(CachedEmbedder::new(embedder, capacity)),
        None => embedder,
    }
}

#[cfg(not(feature = "cache"))]
fn memoize(embedder: Box<dyn Embedder>, _capacity: usize) -> Box<dyn Embedder> {
    embedder
}
