//! Core domain models for rule violations, learned examples and detection results
//!
//! Architecture: Rich Domain Models - Examples and matches carry their own behavior
//! - Severity knows how to parse and render its rule labels
//! - Examples are immutable once created; stores only ever append them
//! - Matches describe a single nearest-example decision for one message

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::feedback::FeedbackError;

/// Prefix used when rendering severity labels
pub const LABEL_PREFIX: &str = "Mức";

lazy_static! {
    /// Trailing level number of a rule label such as "Mức 4" or "4"
    static ref LABEL_LEVEL: Regex = Regex::new(r"(\d+)\s*$").expect("label regex is valid");
}

/// Ordinal seriousness of a rule violation, level 1 (least) to 5 (most)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Minor,
    Moderate,
    Serious,
    Severe,
    Critical,
}

impl Severity {
    /// All levels in ascending order
    pub const ALL: [Severity; 5] =
        [Self::Minor, Self::Moderate, Self::Serious, Self::Severe, Self::Critical];

    /// Numeric level (1..=5)
    pub fn level(self) -> u8 {
        match self {
            Self::Minor => 1,
            Self::Moderate => 2,
            Self::Serious => 3,
            Self::Severe => 4,
            Self::Critical => 5,
        }
    }

    /// Build from a numeric level, rejecting anything outside 1..=5
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Minor),
            2 => Some(Self::Moderate),
            3 => Some(Self::Serious),
            4 => Some(Self::Severe),
            5 => Some(Self::Critical),
            _ => None,
        }
    }

    /// Parse a free-form rule label ("Mức 4", "4", "level 4")
    pub fn from_label(label: &str) -> Option<Self> {
        let captures = LABEL_LEVEL.captures(label.trim())?;
        let level: u8 = captures.get(1)?.as_str().parse().ok()?;
        Self::from_level(level)
    }

    /// Parse a level typed by a user. Only ASCII digits are accepted.
    pub fn parse_level(input: &str) -> Result<Self, FeedbackError> {
        let level = parse_digits(input)?;
        u8::try_from(level)
            .ok()
            .and_then(Self::from_level)
            .ok_or(FeedbackError::OutOfRange { level })
    }

    /// Rule label as stored and displayed
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", LABEL_PREFIX, self.level())
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.level()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("severity level {level} is outside 1..=5"))
    }
}

/// Parse an all-digit answer. Values too large for u64 saturate so they still
/// read as out of range rather than as non-numeric.
pub(crate) fn parse_digits(input: &str) -> Result<u64, FeedbackError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(FeedbackError::NotNumeric { input: trimmed.to_string() });
    }
    Ok(trimmed.parse().unwrap_or(u64::MAX))
}

/// A labeled example of a rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Text of the offending message or rule description
    pub text: String,
    /// Severity assigned to this example
    pub label: Severity,
    /// When the example entered the store (absent for seeds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl Example {
    /// Create an example without a timestamp
    pub fn new(text: impl Into<String>, label: Severity) -> Self {
        Self { text: text.into(), label, added_at: None }
    }

    /// Create an example stamped with the current time
    pub fn learned(text: impl Into<String>, label: Severity) -> Self {
        Self { added_at: Some(Utc::now()), ..Self::new(text, label) }
    }

    /// Format example for display
    pub fn format_display(&self) -> String {
        format!("[{}] {}", self.label, self.text)
    }
}

/// Nearest stored example for an incoming message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    /// The (expanded) text that was classified
    pub input: String,
    /// Text of the closest stored example
    pub matched_text: String,
    /// Severity of the closest stored example
    pub label: Severity,
    /// Cosine similarity between input and example
    pub score: f64,
    /// Position of the example in the store
    pub index: usize,
    /// When the decision was made
    pub detected_at: DateTime<Utc>,
}

impl Match {
    /// Create a match against the example at `index`
    pub fn new(input: impl Into<String>, example: &Example, index: usize, score: f64) -> Self {
        Self {
            input: input.into(),
            matched_text: example.text.clone(),
            label: example.label,
            score,
            index,
            detected_at: Utc::now(),
        }
    }

    /// Format match for display
    pub fn format_display(&self) -> String {
        format!("{} [{}] (similarity {:.2})", self.matched_text, self.label, self.score)
    }
}

/// A message token that resembles a known toxic abbreviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbbreviationHit {
    /// Token as written in the message
    pub word: String,
    /// Dictionary key it resembles
    pub abbreviation: String,
    /// Fuzzy similarity on a 0..=100 scale
    pub score: f64,
}

/// Decision reached for one screened message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScreeningOutcome {
    /// The raw text was cleared earlier and skipped detection
    Cleared,
    /// No stored example was similar enough; `best_score` is the closest
    /// similarity seen, absent when the store is empty
    NoMatch { best_score: Option<f64> },
    /// The closest stored example cleared the threshold
    Matched(Match),
}

/// Everything learned about one incoming message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screening {
    /// Message as typed
    pub raw: String,
    /// Message after abbreviation expansion
    pub expanded: String,
    /// First abbreviation spotted in the raw message
    pub abbreviation: Option<AbbreviationHit>,
    /// Outcome of clearance and detection
    pub outcome: ScreeningOutcome,
    /// Threshold detection compared against
    pub similarity_threshold: f64,
}

impl Screening {
    /// Whether the message matched a stored violation
    pub fn is_violation(&self) -> bool {
        matches!(self.outcome, ScreeningOutcome::Matched(_))
    }

    /// The match, if any
    pub fn matched(&self) -> Option<&Match> {
        self.outcome.matched()
    }

    /// Highest similarity found by detection; `None` when detection was skipped
    pub fn best_score(&self) -> Option<f64> {
        match &self.outcome {
            ScreeningOutcome::Cleared => None,
            ScreeningOutcome::NoMatch { best_score } => *best_score,
            ScreeningOutcome::Matched(found) => Some(found.score),
        }
    }
}

impl ScreeningOutcome {
    /// The match, if any
    pub fn matched(&self) -> Option<&Match> {
        match self {
            ScreeningOutcome::Matched(found) => Some(found),
            _ => None,
        }
    }
}

/// Error types that can occur while moderating
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or written
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A persisted store could not be read or written
    #[error("Store error in {store}: {message}")]
    Store { store: String, message: String },

    /// The embedding model failed
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Embedding cache operation failed
    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl ModerationError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a store error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store { store: store.into(), message: message.into() }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding { message: message.into() }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache { message: message.into() }
    }
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;
