//! Test doubles shared by unit tests

use crate::detector::{Embedder, Embedding};
use crate::domain::violations::{ModerationError, ModerationResult};
use std::collections::HashMap;

/// Embedder with hand-picked vectors; unknown texts fail to embed
#[derive(Debug, Default)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Embedding>,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Embedding) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str {
        "fixed"
    }

    fn embed(&self, text: &str) -> ModerationResult<Embedding> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| ModerationError::embedding(format!("no fixed vector for '{text}'")))
    }
}
