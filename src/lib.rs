//! Chat Moderator - interactive moderation assistant that learns rule violations
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic separated from infrastructure concerns
//! - Embedding and fuzzy scoring sit behind capability traits
//! - The `Moderator` facade screens messages and applies learning feedback

pub mod cache;
pub mod config;
pub mod detector;
pub mod domain;
pub mod patterns;
pub mod report;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export main types for convenient access
pub use domain::feedback::{Correction, FeedbackError};
pub use domain::violations::{
    AbbreviationHit, Example, Match, ModerationError, ModerationResult, Screening,
    ScreeningOutcome, Severity,
};

pub use config::{ConfigBuilder, EmbedderKind, ModerationConfig};

pub use detector::{build_embedder, Detector, Embedder, Embedding, NgramEmbedder};

pub use patterns::{AbbreviationDictionary, AbbreviationMatcher, IndelScorer, Scorer};

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use cache::{CacheStatistics, EmbeddingCache};

pub use session::{FeedbackSession, SessionSummary};

pub use store::{BootstrapSource, ExampleStore, NonViolationStore};

/// Main moderation service tying detection, abbreviation handling and learning together
pub struct Moderator {
    config: ModerationConfig,
    embedder: Box<dyn Embedder>,
    matcher: AbbreviationMatcher,
    detector: Detector,
    examples: ExampleStore,
    non_violations: NonViolationStore,
    bootstrap_source: BootstrapSource,
}

impl Moderator {
    /// Open the stores named by `config` with the configured embedder
    pub fn open(config: ModerationConfig) -> ModerationResult<Self> {
        config.validate()?;
        let embedder = build_embedder(&config.embedder)?;
        Self::open_with(config, embedder, Box::new(IndelScorer))
    }

    /// Open the stores with explicit capability implementations
    pub fn open_with(
        config: ModerationConfig,
        embedder: Box<dyn Embedder>,
        scorer: Box<dyn Scorer>,
    ) -> ModerationResult<Self> {
        let dictionary = AbbreviationDictionary::load(&config.storage.abbreviations);
        let matcher =
            AbbreviationMatcher::new(dictionary, scorer, config.detection.fuzzy_threshold);
        let detector = Detector::new(config.detection.similarity_threshold);

        let (examples, bootstrap_source) = ExampleStore::open(&config.storage, embedder.as_ref())?;
        let non_violations = NonViolationStore::new(&config.storage.non_violations);

        tracing::info!(
            "Moderator ready: {} examples ({}), {} abbreviations, model {}",
            examples.len(),
            bootstrap_source,
            matcher.dictionary().len(),
            embedder.model_id()
        );

        Ok(Self { config, embedder, matcher, detector, examples, non_violations, bootstrap_source })
    }

    /// Screen one message: spot abbreviations, expand them, honor earlier
    /// clearances of the exact raw text, then look for the nearest example
    /// of the expanded text.
    pub fn screen(&self, raw: &str) -> ModerationResult<Screening> {
        let abbreviation = self.matcher.check(raw);
        let expanded = self.matcher.expand(raw);

        let outcome = if self.non_violations.contains(raw)? {
            tracing::debug!("'{}' was cleared before", raw);
            ScreeningOutcome::Cleared
        } else {
            self.detector.classify(&expanded, self.embedder.as_ref(), &self.examples)?
        };

        Ok(Screening {
            raw: raw.to_string(),
            expanded,
            abbreviation,
            outcome,
            similarity_threshold: self.detector.threshold(),
        })
    }

    /// Add `text` to the example store
    pub fn learn_violation(&mut self, text: &str, severity: Severity) -> ModerationResult<()> {
        self.examples.learn_violation(text, severity, self.embedder.as_ref())
    }

    /// Add `text` to the non-violation store. Returns false if it was already there.
    pub fn learn_non_violation(&self, text: &str) -> ModerationResult<bool> {
        self.non_violations.learn(text)
    }

    /// Apply a user correction to `text`. Returns whether a store changed.
    pub fn apply_correction(&mut self, text: &str, correction: Correction) -> ModerationResult<bool> {
        match correction {
            Correction::Violation(severity) => {
                self.learn_violation(text, severity)?;
                Ok(true)
            }
            Correction::NotViolation => self.learn_non_violation(text),
        }
    }

    /// Re-read the example store from disk
    pub fn reload(&mut self) -> ModerationResult<()> {
        self.examples.reload(self.embedder.as_ref())
    }

    /// Active configuration
    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// The example store
    pub fn examples(&self) -> &ExampleStore {
        &self.examples
    }

    /// The non-violation store
    pub fn non_violations(&self) -> &NonViolationStore {
        &self.non_violations
    }

    /// Where the example store was loaded from
    pub fn bootstrap_source(&self) -> BootstrapSource {
        self.bootstrap_source
    }

    /// The abbreviation matcher
    pub fn matcher(&self) -> &AbbreviationMatcher {
        &self.matcher
    }

    /// The embedding model in use
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Embedding cache statistics, when a cache is configured
    pub fn cache_statistics(&self) -> Option<CacheStatistics> {
        self.examples.cache_statistics()
    }
}

impl std::fmt::Debug for Moderator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Moderator")
            .field("examples", &self.examples.len())
            .field("bootstrap_source", &self.bootstrap_source)
            .field("matcher", &self.matcher)
            .field("detector", &self.detector)
            .field("model", &self.embedder.model_id())
            .finish()
    }
}

/// Open a moderator using the discovered configuration
pub fn create_moderator() -> ModerationResult<Moderator> {
    Moderator::open(ModerationConfig::discover()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedEmbedder;
    use std::fs;
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir) -> ModerationConfig {
        ConfigBuilder::new()
            .storage_dir(temp_dir.path())
            .embedder(EmbedderKind::Ngram)
            .build()
            .unwrap()
    }

    #[test]
    fn test_fresh_start_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        let moderator = Moderator::open(config.clone()).unwrap();

        assert_eq!(moderator.bootstrap_source(), BootstrapSource::Defaults);
        assert_eq!(moderator.examples().len(), 7);
        assert!(config.storage.examples.exists());
        assert!(moderator.matcher().dictionary().is_empty());
    }

    #[test]
    fn test_stored_example_matches_itself() {
        let temp_dir = TempDir::new().unwrap();
        let moderator = Moderator::open(config(&temp_dir)).unwrap();

        let screening = moderator.screen("Xúc phạm người khác").unwrap();
        let found = screening.matched().unwrap();

        assert_eq!(found.matched_text, "Xúc phạm người khác");
        assert_eq!(found.label, Severity::Severe);
        assert!(found.score >= 0.60);
    }

    #[test]
    fn test_learned_violation_is_detected_next_time() {
        let temp_dir = TempDir::new().unwrap();
        let mut moderator = Moderator::open(config(&temp_dir)).unwrap();

        moderator.learn_violation("bán acc game giá rẻ inbox ngay", Severity::Moderate).unwrap();
        assert_eq!(moderator.examples().len(), 8);
        assert_eq!(moderator.examples().embeddings().len(), 8);

        let screening = moderator.screen("bán acc game giá rẻ inbox ngay").unwrap();
        assert_eq!(screening.matched().unwrap().label, Severity::Moderate);
        assert_eq!(screening.matched().unwrap().index, 7);
    }

    #[test]
    fn test_learn_non_violation_twice() {
        let temp_dir = TempDir::new().unwrap();
        let moderator = Moderator::open(config(&temp_dir)).unwrap();

        assert!(moderator.learn_non_violation("chào mọi người").unwrap());
        assert!(!moderator.learn_non_violation("chào mọi người").unwrap());
        assert_eq!(moderator.non_violations().entries().unwrap().len(), 1);
    }

    #[test]
    fn test_clearance_uses_raw_text_not_expansion() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        fs::write(
            &config.storage.examples,
            serde_json::to_string(&[Example::new("get out", Severity::Severe)]).unwrap(),
        )
        .unwrap();
        fs::write(&config.storage.abbreviations, r#"{"gtfo": "get out"}"#).unwrap();
        let embedder = FixedEmbedder::new().with("get out", vec![1.0, 0.0]);
        let moderator =
            Moderator::open_with(config, Box::new(embedder), Box::new(IndelScorer)).unwrap();

        let before = moderator.screen("gtfo").unwrap();
        assert_eq!(before.expanded, "get out");
        assert_eq!(before.abbreviation.as_ref().unwrap().abbreviation, "gtfo");
        assert!(before.is_violation());

        // Clearing the expansion does not clear the raw phrasing
        moderator.learn_non_violation("get out").unwrap();
        assert!(moderator.screen("gtfo").unwrap().is_violation());

        // Clearing the raw phrasing skips detection even though the expansion matches
        moderator.learn_non_violation("gtfo").unwrap();
        let after = moderator.screen("gtfo").unwrap();
        assert!(matches!(after.outcome, ScreeningOutcome::Cleared));
    }

    #[test]
    fn test_apply_correction() {
        let temp_dir = TempDir::new().unwrap();
        let mut moderator = Moderator::open(config(&temp_dir)).unwrap();

        assert!(moderator.apply_correction("ổn mà", Correction::NotViolation).unwrap());
        assert!(!moderator.apply_correction("ổn mà", Correction::NotViolation).unwrap());
        assert_eq!(moderator.examples().len(), 7);

        assert!(moderator
            .apply_correction("đồ ngu", Correction::Violation(Severity::Severe))
            .unwrap());
        assert_eq!(moderator.examples().len(), 8);
    }

    #[test]
    fn test_embedding_failure_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        fs::write(
            &config.storage.examples,
            serde_json::to_string(&[Example::new("known", Severity::Minor)]).unwrap(),
        )
        .unwrap();
        let embedder = FixedEmbedder::new().with("known", vec![1.0]);
        let moderator =
            Moderator::open_with(config, Box::new(embedder), Box::new(IndelScorer)).unwrap();

        assert!(matches!(moderator.screen("unknown"), Err(ModerationError::Embedding { .. })));
    }

    #[test]
    fn test_reopen_keeps_learned_examples() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut moderator = Moderator::open(config(&temp_dir)).unwrap();
            moderator.learn_violation("spam link liên tục", Severity::Serious).unwrap();
        }

        let moderator = Moderator::open(config(&temp_dir)).unwrap();
        assert_eq!(moderator.bootstrap_source(), BootstrapSource::Persisted);
        assert_eq!(moderator.examples().len(), 8);
        assert!(moderator.cache_statistics().is_some());
    }
}
