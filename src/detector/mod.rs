//! Nearest-example violation detection
//!
//! Architecture: Domain Service - the detector classifies one message against the example store
//! - Embedding generation is delegated to an `Embedder` capability
//! - Similarity is a linear cosine scan; the store is small enough that no index is kept
//! - A match is reported only at or above the similarity threshold

pub mod embedding;
#[cfg(feature = "minilm")]
pub mod minilm;

use crate::domain::violations::{Match, ModerationResult, ScreeningOutcome};
use crate::store::ExampleStore;

#[cfg(feature = "cache")]
pub use embedding::CachedEmbedder;
pub use embedding::{build_embedder, Embedder, Embedding, NgramEmbedder};
#[cfg(feature = "minilm")]
pub use minilm::MiniLmEmbedder;

/// Classifies messages by their most similar stored example
#[derive(Debug, Clone, Copy)]
pub struct Detector {
    threshold: f64,
}

impl Detector {
    /// Create a detector reporting matches with similarity >= `threshold`
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Similarity threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the closest example to `text`, or `None` when even the closest
    /// one is below the threshold. Embedding failures propagate.
    pub fn detect(
        &self,
        text: &str,
        embedder: &dyn Embedder,
        store: &ExampleStore,
    ) -> ModerationResult<Option<Match>> {
        Ok(match self.classify(text, embedder, store)? {
            ScreeningOutcome::Matched(found) => Some(found),
            _ => None,
        })
    }

    /// Like `detect`, but a miss still carries the best similarity seen
    pub fn classify(
        &self,
        text: &str,
        embedder: &dyn Embedder,
        store: &ExampleStore,
    ) -> ModerationResult<ScreeningOutcome> {
        let query = embedder.embed(text)?;

        let Some((index, score)) = nearest(&query, store.embeddings()) else {
            tracing::debug!("Example store is empty; nothing to compare against");
            return Ok(ScreeningOutcome::NoMatch { best_score: None });
        };

        tracing::debug!(
            "Best similarity {:.2} with example #{} (threshold {})",
            score,
            index,
            self.threshold
        );

        let found = store
            .examples()
            .get(index)
            .filter(|_| meets_threshold(score, self.threshold))
            .map(|example| Match::new(text, example, index, score));

        Ok(match found {
            Some(found) => ScreeningOutcome::Matched(found),
            None => ScreeningOutcome::NoMatch { best_score: Some(score) },
        })
    }
}

/// Index and score of the most similar candidate. Ties go to the lowest index.
pub fn nearest(query: &[f32], candidates: &[Embedding]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best
}

/// Whether a similarity score counts as a match
pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Cosine similarity accumulated in f64. Zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
