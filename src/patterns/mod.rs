//! Abbreviation matching for toxic shorthand
//!
//! Architectural Principle: Service Layer - the matcher scans message tokens against an
//! ordered dictionary using a pluggable `Scorer`
//! - `check` reports the first token/abbreviation pair that clears the threshold
//! - `expand` rewrites every qualifying token before the message reaches the detector
//! - A missing or malformed dictionary disables the feature instead of failing

pub mod scorer;

use crate::domain::violations::{AbbreviationHit, ModerationError, ModerationResult};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

pub use scorer::{IndelScorer, Scorer};

/// Ordered mapping from abbreviation to its expansion, read-only after load
#[derive(Debug, Clone, Default)]
pub struct AbbreviationDictionary {
    entries: Vec<(String, String)>,
}

impl AbbreviationDictionary {
    /// Build a dictionary from pairs, keeping their order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Parse a JSON object of `"abbreviation": "expansion"` pairs in file order.
    /// Entries whose value is not a string are skipped.
    pub fn from_json_str(content: &str) -> ModerationResult<Self> {
        let value: JsonValue = serde_json::from_str(content)
            .map_err(|e| ModerationError::config(format!("Failed to parse abbreviations: {e}")))?;

        let JsonValue::Object(map) = value else {
            return Err(ModerationError::config("Abbreviation file must contain a JSON object"));
        };

        let mut entries = Vec::with_capacity(map.len());
        for (abbreviation, expansion) in map {
            match expansion {
                JsonValue::String(expansion) => entries.push((abbreviation, expansion)),
                other => tracing::warn!(
                    "Skipping abbreviation '{}': expansion is not a string ({})",
                    abbreviation,
                    other
                ),
            }
        }

        Ok(Self { entries })
    }

    /// Load the dictionary file. Any failure degrades to an empty dictionary.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let loaded = fs::read_to_string(path)
            .map_err(|e| {
                ModerationError::config(format!("Failed to read '{}': {}", path.display(), e))
            })
            .and_then(|content| Self::from_json_str(&content));

        match loaded {
            Ok(dictionary) => {
                tracing::info!(
                    "Loaded {} abbreviations from {}",
                    dictionary.len(),
                    path.display()
                );
                dictionary
            }
            Err(e) => {
                tracing::warn!("Abbreviation matching disabled: {}", e);
                Self::default()
            }
        }
    }

    /// Number of abbreviations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in stored order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Fuzzy matcher that finds and expands known abbreviations in messages
pub struct AbbreviationMatcher {
    dictionary: AbbreviationDictionary,
    scorer: Box<dyn Scorer>,
    threshold: f64,
}

impl AbbreviationMatcher {
    /// Create a matcher over `dictionary` accepting scores >= `threshold`
    pub fn new(dictionary: AbbreviationDictionary, scorer: Box<dyn Scorer>, threshold: f64) -> Self {
        Self { dictionary, scorer, threshold }
    }

    /// Create a matcher using the default Indel scorer
    pub fn with_default_scorer(dictionary: AbbreviationDictionary, threshold: f64) -> Self {
        Self::new(dictionary, Box::new(IndelScorer), threshold)
    }

    /// The dictionary this matcher scans
    pub fn dictionary(&self) -> &AbbreviationDictionary {
        &self.dictionary
    }

    /// First token (in message order) resembling any abbreviation (in
    /// dictionary order). The scan stops at the first qualifying pair.
    pub fn check(&self, text: &str) -> Option<AbbreviationHit> {
        for word in text.split_whitespace() {
            let word_lower = word.to_lowercase();
            for (abbreviation, _) in self.dictionary.iter() {
                let score = self.scorer.ratio(&word_lower, &abbreviation.to_lowercase());
                if score >= self.threshold {
                    return Some(AbbreviationHit {
                        word: word.to_string(),
                        abbreviation: abbreviation.to_string(),
                        score,
                    });
                }
            }
        }
        None
    }

    /// Replace every qualifying token with its expansion and re-join with
    /// single spaces. When several abbreviations qualify for one token the
    /// last one in dictionary order wins.
    pub fn expand(&self, text: &str) -> String {
        let mut words: Vec<String> = Vec::new();

        for word in text.split_whitespace() {
            let word_lower = word.to_lowercase();
            let mut replacement: Option<&str> = None;

            for (abbreviation, expansion) in self.dictionary.iter() {
                let score = self.scorer.ratio(&word_lower, &abbreviation.to_lowercase());
                if score >= self.threshold {
                    tracing::info!(
                        "Recognized '{}' ~ '{}' ({:.0}%) -> '{}'",
                        word,
                        abbreviation,
                        score,
                        expansion
                    );
                    replacement = Some(expansion);
                }
            }

            words.push(replacement.unwrap_or(word).to_string());
        }

        words.join(" ")
    }
}

impl std::fmt::Debug for AbbreviationMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbbreviationMatcher")
            .field("abbreviations", &self.dictionary.len())
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    #[fixture]
    fn matcher() -> AbbreviationMatcher {
        AbbreviationMatcher::with_default_scorer(
            AbbreviationDictionary::from_pairs([
                ("stfu", "shut the fuck up"),
                ("gtfo", "get the fuck out"),
                ("wtf", "what the fuck"),
            ]),
            80.0,
        )
    }

    #[rstest]
    fn test_check_finds_first_token(matcher: AbbreviationMatcher) {
        let hit = matcher.check("hey GTFO and stfu").unwrap();
        assert_eq!(hit.word, "GTFO");
        assert_eq!(hit.abbreviation, "gtfo");
        assert_eq!(hit.score, 100.0);
    }

    #[rstest]
    #[case("stfuu please", Some("stfu"))]
    #[case("wtff", Some("wtf"))]
    #[case("hello there", None)]
    #[case("", None)]
    fn test_check_threshold(
        matcher: AbbreviationMatcher,
        #[case] text: &str,
        #[case] expected: Option<&str>,
    ) {
        let hit = matcher.check(text);
        assert_eq!(hit.as_ref().map(|h| h.abbreviation.as_str()), expected);
    }

    #[test]
    fn test_one_extra_letter_matches_short_abbreviation() {
        let matcher = AbbreviationMatcher::with_default_scorer(
            AbbreviationDictionary::from_pairs([("dcm", "chửi thề"), ("wtf", "what the fuck")]),
            80.0,
        );

        let hit = matcher.check("dcmm").unwrap();
        assert_eq!(hit.abbreviation, "dcm");
        assert!((hit.score - 600.0 / 7.0).abs() < 1e-6);
        assert_eq!(matcher.expand("wtff"), "what the fuck");
    }

    #[test]
    fn test_check_first_dictionary_key_wins() {
        let matcher = AbbreviationMatcher::with_default_scorer(
            AbbreviationDictionary::from_pairs([("stfu", "first"), ("stfuu", "second")]),
            80.0,
        );
        assert_eq!(matcher.check("stfu").unwrap().abbreviation, "stfu");
    }

    #[test]
    fn test_expand_last_qualifying_key_wins() {
        let matcher = AbbreviationMatcher::with_default_scorer(
            AbbreviationDictionary::from_pairs([("stfu", "first"), ("stfuu", "second")]),
            80.0,
        );
        assert_eq!(matcher.expand("stfu now"), "second now");
    }

    #[rstest]
    fn test_expand_replaces_every_token(matcher: AbbreviationMatcher) {
        assert_eq!(
            matcher.expand("wtf   man,\tstfu"),
            "what the fuck man, shut the fuck up"
        );
    }

    #[rstest]
    fn test_expand_is_stable(matcher: AbbreviationMatcher) {
        let once = matcher.expand("stfu and gtfo");
        let twice = matcher.expand(&once);
        assert_eq!(once, "shut the fuck up and get the fuck out");
        assert_eq!(twice, once);
    }

    #[rstest]
    fn test_expand_collapses_whitespace_only(matcher: AbbreviationMatcher) {
        assert_eq!(matcher.expand("  hello   world  "), "hello world");
    }

    #[test]
    fn test_dictionary_keeps_file_order() {
        let dictionary =
            AbbreviationDictionary::from_json_str(r#"{"zz": "last", "aa": "first", "n": 3}"#)
                .unwrap();
        let keys: Vec<&str> = dictionary.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zz", "aa"]);
    }

    #[test]
    fn test_dictionary_load_degrades_to_empty() {
        let temp_dir = TempDir::new().unwrap();

        let missing = AbbreviationDictionary::load(temp_dir.path().join("missing.json"));
        assert!(missing.is_empty());

        let malformed_path = temp_dir.path().join("malformed.json");
        fs::write(&malformed_path, "{not json").unwrap();
        assert!(AbbreviationDictionary::load(&malformed_path).is_empty());

        let array_path = temp_dir.path().join("array.json");
        fs::write(&array_path, r#"["stfu"]"#).unwrap();
        assert!(AbbreviationDictionary::load(&array_path).is_empty());

        let good_path = temp_dir.path().join("good.json");
        fs::write(&good_path, r#"{"stfu": "shut the fuck up"}"#).unwrap();
        assert_eq!(AbbreviationDictionary::load(&good_path).len(), 1);
    }

    #[test]
    fn test_empty_dictionary_never_matches() {
        let matcher = AbbreviationMatcher::with_default_scorer(AbbreviationDictionary::default(), 80.0);
        assert!(matcher.check("stfu").is_none());
        assert_eq!(matcher.expand("stfu  now"), "stfu now");
    }
}
