//! Persisted embedding cache for the example store
//!
//! CDD Principle: Infrastructure Layer - Cache provides performance optimization without affecting domain logic
//! - EmbeddingCache remembers the vectors derived for the last example sequence it saw
//! - A SHA-256 fingerprint of model id and example texts decides whether vectors are reusable
//! - Losing or corrupting the cache only costs a re-embedding pass

use crate::detector::Embedding;
use crate::domain::violations::{ModerationError, ModerationResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const CURRENT_VERSION: u32 = 1;

/// Cache of derived example embeddings
#[derive(Debug)]
pub struct EmbeddingCache {
    /// Path to the cache file
    cache_path: PathBuf,
    /// In-memory cache data
    data: CacheData,
    /// Whether the cache has been modified
    dirty: bool,
}

/// Serializable cache data structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheData {
    /// Cache format version for migration support
    version: u32,
    /// Model that produced the vectors
    model_id: Option<String>,
    /// Fingerprint of model id and example texts
    fingerprint: Option<String>,
    /// One vector per example, in store order
    embeddings: Vec<Embedding>,
    /// Cache metadata
    #[serde(default)]
    metadata: CacheMetadata,
}

/// Metadata about the cache itself
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the cache was created
    created_at: u64,
    /// When the cache was last updated
    updated_at: u64,
    /// Number of cache hits since creation
    hits: u64,
    /// Number of cache misses since creation
    misses: u64,
}

impl EmbeddingCache {
    /// Create a new cache backed by the given file
    pub fn new<P: AsRef<Path>>(cache_path: P) -> Self {
        Self { cache_path: cache_path.as_ref().to_path_buf(), data: CacheData::fresh(), dirty: false }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Load cache from disk, starting empty if it doesn't exist
    pub fn load(&mut self) -> ModerationResult<()> {
        if self.cache_path.exists() {
            let content = fs::read_to_string(&self.cache_path)
                .map_err(|e| ModerationError::cache(format!("Failed to read cache file: {}", e)))?;

            self.data = serde_json::from_str(&content)
                .map_err(|e| ModerationError::cache(format!("Failed to parse cache file: {}", e)))?;

            if self.data.version != CURRENT_VERSION {
                return Err(ModerationError::cache(format!(
                    "Unsupported cache version: {}. Please delete the cache file.",
                    self.data.version
                )));
            }
        } else {
            self.data = CacheData::fresh();
            self.dirty = true;
        }

        Ok(())
    }

    /// Discard in-memory contents without touching the file
    pub fn reset(&mut self) {
        self.data = CacheData::fresh();
        self.dirty = true;
    }

    /// Save cache to disk if it has been modified
    pub fn save(&mut self) -> ModerationResult<()> {
        if !self.dirty {
            return Ok(());
        }

        self.data.metadata.updated_at = current_timestamp();

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ModerationError::cache(format!("Failed to create cache directory: {}", e))
            })?;
        }

        let content = serde_json::to_string(&self.data)
            .map_err(|e| ModerationError::cache(format!("Failed to serialize cache: {}", e)))?;

        fs::write(&self.cache_path, content)
            .map_err(|e| ModerationError::cache(format!("Failed to write cache file: {}", e)))?;

        self.dirty = false;
        Ok(())
    }

    /// Vectors stored under `fingerprint`, if they cover `expected_len` examples
    pub fn lookup(&mut self, fingerprint: &str, expected_len: usize) -> Option<&[Embedding]> {
        let hit = self.data.fingerprint.as_deref() == Some(fingerprint)
            && self.data.embeddings.len() == expected_len;

        self.dirty = true;
        if hit {
            self.data.metadata.hits += 1;
            Some(self.data.embeddings.as_slice())
        } else {
            self.data.metadata.misses += 1;
            None
        }
    }

    /// Replace the cached vectors
    pub fn update(&mut self, fingerprint: String, model_id: &str, embeddings: Vec<Embedding>) {
        self.data.fingerprint = Some(fingerprint);
        self.data.model_id = Some(model_id.to_string());
        self.data.embeddings = embeddings;
        self.dirty = true;
    }

    /// Get cache statistics
    pub fn statistics(&self) -> CacheStatistics {
        let lookups = self.data.metadata.hits + self.data.metadata.misses;
        CacheStatistics {
            model_id: self.data.model_id.clone(),
            cached_embeddings: self.data.embeddings.len(),
            cache_hits: self.data.metadata.hits,
            cache_misses: self.data.metadata.misses,
            hit_rate: if lookups > 0 {
                (self.data.metadata.hits as f64) / (lookups as f64)
            } else {
                0.0
            },
            created_at: self.data.metadata.created_at,
            updated_at: self.data.metadata.updated_at,
        }
    }

    /// Clear the entire cache and remove its file
    pub fn clear(&mut self) -> ModerationResult<()> {
        self.data = CacheData::fresh();
        self.dirty = true;

        if self.cache_path.exists() {
            fs::remove_file(&self.cache_path)
                .map_err(|e| ModerationError::cache(format!("Failed to remove cache file: {}", e)))?;
        }

        Ok(())
    }

    /// SHA-256 over the model id and every example text, in order
    pub fn fingerprint(model_id: &str, texts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        for text in texts {
            hasher.update((text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl CacheData {
    fn fresh() -> Self {
        Self { version: CURRENT_VERSION, ..Default::default() }
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        let now = current_timestamp();
        Self { created_at: now, updated_at: now, hits: 0, misses: 0 }
    }
}

/// Cache performance statistics
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub model_id: Option<String>,
    pub cached_embeddings: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl CacheStatistics {
    /// Format statistics for display
    pub fn format_display(&self) -> String {
        format!(
            "Cache: {} embeddings ({}), {:.1}% hit rate ({} hits, {} misses)",
            self.cached_embeddings,
            self.model_id.as_deref().unwrap_or("no model"),
            self.hit_rate * 100.0,
            self.cache_hits,
            self.cache_misses
        )
    }
}

/// Get current timestamp as seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_creation() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = EmbeddingCache::new(temp_dir.path().join("cache.json"));
        cache.load().unwrap();

        assert_eq!(cache.data.version, 1);
        assert!(cache.data.embeddings.is_empty());
    }

    #[test]
    fn test_lookup_requires_matching_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = EmbeddingCache::new(temp_dir.path().join("cache.json"));
        cache.load().unwrap();

        let fingerprint = EmbeddingCache::fingerprint("model", &["a", "b"]);
        assert!(cache.lookup(&fingerprint, 2).is_none());

        cache.update(fingerprint.clone(), "model", vec![vec![1.0], vec![2.0]]);
        assert_eq!(cache.lookup(&fingerprint, 2).unwrap().len(), 2);
        assert!(cache.lookup(&fingerprint, 3).is_none());

        let other = EmbeddingCache::fingerprint("model", &["a", "b", "c"]);
        assert!(cache.lookup(&other, 2).is_none());
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let base = EmbeddingCache::fingerprint("model", &["ab", "c"]);
        assert_eq!(base, EmbeddingCache::fingerprint("model", &["ab", "c"]));
        assert_ne!(base, EmbeddingCache::fingerprint("model", &["a", "bc"]));
        assert_ne!(base, EmbeddingCache::fingerprint("other", &["ab", "c"]));
        assert_ne!(base, EmbeddingCache::fingerprint("model", &["c", "ab"]));
    }

    #[test]
    fn test_cache_persistence() -> ModerationResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("nested").join("cache.json");
        let fingerprint = EmbeddingCache::fingerprint("model", &["x"]);

        {
            let mut cache = EmbeddingCache::new(&cache_path);
            cache.load()?;
            cache.update(fingerprint.clone(), "model", vec![vec![0.5, 0.5]]);
            cache.save()?;
        }

        {
            let mut cache = EmbeddingCache::new(&cache_path);
            cache.load()?;
            assert_eq!(cache.lookup(&fingerprint, 1).unwrap().to_vec(), vec![vec![0.5, 0.5]]);

            let stats = cache.statistics();
            assert_eq!(stats.cached_embeddings, 1);
            assert_eq!(stats.model_id.as_deref(), Some("model"));
        }

        Ok(())
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("cache.json");
        fs::write(&cache_path, "not json").unwrap();

        let mut cache = EmbeddingCache::new(&cache_path);
        assert!(cache.load().is_err());
    }

    #[test]
    fn test_clear_removes_file() -> ModerationResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("cache.json");

        let mut cache = EmbeddingCache::new(&cache_path);
        cache.load()?;
        cache.update("fp".to_string(), "model", vec![vec![1.0]]);
        cache.save()?;
        assert!(cache_path.exists());

        cache.clear()?;
        assert!(!cache_path.exists());
        assert_eq!(cache.statistics().cached_embeddings, 0);
        Ok(())
    }

    #[test]
    fn test_statistics() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = EmbeddingCache::new(temp_dir.path().join("cache.json"));
        cache.load().unwrap();

        cache.data.metadata.hits = 10;
        cache.data.metadata.misses = 5;

        let stats = cache.statistics();
        assert_eq!(stats.cache_hits, 10);
        assert_eq!(stats.cache_misses, 5);
        assert_eq!(stats.hit_rate, 10.0 / 15.0);
        assert!(stats.format_display().contains("66.7% hit rate"));
    }
}
