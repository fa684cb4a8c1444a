//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - Screenings and example listings are rendered for people or for programs
//! - Each format encapsulates its own presentation rules
//! - Domain types stay free of terminal concerns

use crate::domain::violations::{
    AbbreviationHit, Example, Match, ModerationError, ModerationResult, Screening,
    ScreeningOutcome,
};
use serde_json::Value as JsonValue;
use std::io::Write;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors
    Human,
    /// JSON format for programmatic consumption
    Json,
}

impl OutputFormat {
    /// Parse format from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to show the expanded text when it differs from the input
    pub show_expanded: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { use_colors: true, show_expanded: true }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Warn,
    Bad,
    Dim,
    Bold,
}

/// Renders screenings and store listings
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Formatter that never emits escape codes
    pub fn plain() -> Self {
        Self::new(ReportOptions { use_colors: false, ..ReportOptions::default() })
    }

    /// Format one screening
    pub fn format_screening(
        &self,
        screening: &Screening,
        format: OutputFormat,
    ) -> ModerationResult<String> {
        match format {
            OutputFormat::Human => Ok(self.format_screening_human(screening)),
            OutputFormat::Json => {
                let mut value = serde_json::to_value(screening).map_err(json_error)?;
                if let JsonValue::Object(map) = &mut value {
                    map.insert("is_violation".to_string(), screening.is_violation().into());
                }
                to_pretty(&value)
            }
        }
    }

    /// Format the contents of the example store
    pub fn format_examples(
        &self,
        examples: &[Example],
        format: OutputFormat,
    ) -> ModerationResult<String> {
        match format {
            OutputFormat::Human => {
                let mut output = self.paint(
                    &format!("📚 {} stored examples\n", examples.len()),
                    Tone::Bold,
                );
                for (index, example) in examples.iter().enumerate() {
                    let label = self.paint(&format!("[{}]", example.label), tone_for(example));
                    output.push_str(&format!("  {:>3}. {} {}\n", index + 1, label, example.text));
                }
                Ok(output)
            }
            OutputFormat::Json => to_pretty(&serde_json::json!({
                "count": examples.len(),
                "examples": examples,
            })),
        }
    }

    /// Write a formatted screening to a writer
    pub fn write_screening<W: Write>(
        &self,
        screening: &Screening,
        format: OutputFormat,
        mut writer: W,
    ) -> ModerationResult<()> {
        let formatted = self.format_screening(screening, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// Notice printed when an abbreviation is spotted
    pub fn abbreviation_notice(&self, hit: &AbbreviationHit) -> String {
        self.paint(
            &format!(
                "⚠️  Abbreviation spotted: '{}' ~ '{}' ({:.0}%), expanding before detection",
                hit.word, hit.abbreviation, hit.score
            ),
            Tone::Warn,
        )
    }

    /// Notice for a confirmation of learning
    pub fn learned_notice(&self, message: &str) -> String {
        self.paint(&format!("✅ {message}"), Tone::Good)
    }

    /// Notice for rejected input
    pub fn error_notice(&self, message: &str) -> String {
        self.paint(&format!("❌ {message}"), Tone::Bad)
    }

    fn format_screening_human(&self, screening: &Screening) -> String {
        let mut lines = Vec::new();

        if let Some(hit) = &screening.abbreviation {
            lines.push(self.abbreviation_notice(hit));
        }

        if self.options.show_expanded && screening.expanded != screening.raw {
            lines.push(self.paint(&format!("↪  Expanded: {}", screening.expanded), Tone::Dim));
        }

        if let Some(score) = screening.best_score() {
            lines.push(format!(
                "🔍 Similarity score: {:.2} (threshold: {})",
                score, screening.similarity_threshold
            ));
        }

        match &screening.outcome {
            ScreeningOutcome::Cleared => lines.push(self.paint(
                "✅ This message was marked as not a violation before. Skipping.",
                Tone::Good,
            )),
            ScreeningOutcome::NoMatch { .. } => {
                lines.push(self.paint("✅ No violation detected.", Tone::Good))
            }
            ScreeningOutcome::Matched(found) => lines.extend(self.match_lines(found)),
        }

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }

    fn match_lines(&self, found: &Match) -> Vec<String> {
        vec![
            self.paint(&format!("⚠️  Suspected violation: {}", found.matched_text), Tone::Bad),
            format!("🏷️  Warning level: {}", self.paint(&found.label.to_string(), Tone::Bold)),
        ]
    }

    #[cfg(feature = "colors")]
    fn paint(&self, text: &str, tone: Tone) -> String {
        use colored::Colorize;

        if !self.options.use_colors {
            return text.to_string();
        }
        match tone {
            Tone::Good => text.green().to_string(),
            Tone::Warn => text.yellow().to_string(),
            Tone::Bad => text.red().to_string(),
            Tone::Dim => text.dimmed().to_string(),
            Tone::Bold => text.bold().to_string(),
        }
    }

    #[cfg(not(feature = "colors"))]
    fn paint(&self, text: &str, _tone: Tone) -> String {
        text.to_string()
    }
}

fn tone_for(example: &Example) -> Tone {
    if example.label.level() >= 4 {
        Tone::Bad
    } else {
        Tone::Warn
    }
}

fn to_pretty(value: &JsonValue) -> ModerationResult<String> {
    serde_json::to_string_pretty(value).map_err(json_error)
}

fn json_error(e: serde_json::Error) -> ModerationError {
    ModerationError::config(format!("JSON serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violations::Severity;

    fn matched_screening() -> Screening {
        let example = Example::new("Spam tin nhắn", Severity::Serious);
        Screening {
            raw: "spam tin nhan lien tuc".to_string(),
            expanded: "spam tin nhan lien tuc".to_string(),
            abbreviation: None,
            outcome: ScreeningOutcome::Matched(Match::new(
                "spam tin nhan lien tuc",
                &example,
                0,
                0.713,
            )),
            similarity_threshold: 0.6,
        }
    }

    #[test]
    fn test_human_format_for_match() {
        let output = ReportFormatter::plain()
            .format_screening(&matched_screening(), OutputFormat::Human)
            .unwrap();

        assert!(output.contains("Suspected violation: Spam tin nhắn"));
        assert!(output.contains("Similarity score: 0.71 (threshold: 0.6)"));
        assert!(output.contains("Warning level: Mức 3"));
        assert!(!output.contains("Expanded"));
    }

    #[test]
    fn test_human_format_shows_abbreviation_and_expansion() {
        let screening = Screening {
            raw: "gtfo now".to_string(),
            expanded: "get the fuck out now".to_string(),
            abbreviation: Some(AbbreviationHit {
                word: "gtfo".to_string(),
                abbreviation: "gtfo".to_string(),
                score: 100.0,
            }),
            outcome: ScreeningOutcome::NoMatch { best_score: Some(0.4216) },
            similarity_threshold: 0.6,
        };

        let output =
            ReportFormatter::plain().format_screening(&screening, OutputFormat::Human).unwrap();
        assert!(output.contains("Abbreviation spotted: 'gtfo' ~ 'gtfo' (100%)"));
        assert!(output.contains("Expanded: get the fuck out now"));
        assert!(output.contains("Similarity score: 0.42 (threshold: 0.6)"));
        assert!(output.contains("No violation detected."));
    }

    #[test]
    fn test_human_format_omits_score_when_nothing_was_compared() {
        let mut screening = matched_screening();
        screening.outcome = ScreeningOutcome::Cleared;
        let cleared =
            ReportFormatter::plain().format_screening(&screening, OutputFormat::Human).unwrap();
        assert!(cleared.contains("marked as not a violation before"));
        assert!(!cleared.contains("Similarity score"));

        screening.outcome = ScreeningOutcome::NoMatch { best_score: None };
        let empty_store =
            ReportFormatter::plain().format_screening(&screening, OutputFormat::Human).unwrap();
        assert!(empty_store.contains("No violation detected."));
        assert!(!empty_store.contains("Similarity score"));
    }

    #[test]
    fn test_json_format() {
        let output = ReportFormatter::plain()
            .format_screening(&matched_screening(), OutputFormat::Json)
            .unwrap();
        let parsed: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["is_violation"], true);
        assert_eq!(parsed["outcome"]["status"], "matched");
        assert_eq!(parsed["outcome"]["matched_text"], "Spam tin nhắn");
    }

    #[test]
    fn test_examples_listing() {
        let examples = vec![
            Example::new("Spam tin nhắn", Severity::Serious),
            Example::new("Kêu gọi, sát sinh", Severity::Critical),
        ];
        let formatter = ReportFormatter::plain();

        let human = formatter.format_examples(&examples, OutputFormat::Human).unwrap();
        assert!(human.contains("2 stored examples"));
        assert!(human.contains("2. [Mức 5] Kêu gọi, sát sinh"));

        let json: JsonValue =
            serde_json::from_str(&formatter.format_examples(&examples, OutputFormat::Json).unwrap())
                .unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["examples"][0]["label"], 3);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("human"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::from_str("sarif"), None);
        assert_eq!(OutputFormat::all_formats().len(), 2);
    }
}
