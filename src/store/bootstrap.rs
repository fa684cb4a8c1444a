//! Parsing of the one-time bootstrap text file
//!
//! Each useful line reads `<text> - <label>`. Anything else is skipped so a
//! hand-edited file never blocks startup.

use crate::domain::violations::{Example, Severity};
use std::fs;
use std::path::Path;

/// Separator between example text and its label
pub const SEPARATOR: &str = " - ";

/// Parse one bootstrap line. The text may itself contain the separator, so
/// the line is split at its last occurrence.
pub fn parse_line(line: &str) -> Option<Example> {
    let (text, label) = line.trim().rsplit_once(SEPARATOR)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let severity = Severity::from_label(label)?;
    Some(Example::new(text, severity))
}

/// Parse every line of a bootstrap document, skipping unusable ones
pub fn parse_document(content: &str) -> Vec<Example> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(number, line)| {
            let parsed = parse_line(line);
            if parsed.is_none() {
                tracing::warn!("Skipping bootstrap line {}: {:?}", number + 1, line.trim());
            }
            parsed
        })
        .collect()
}

/// Read and parse the bootstrap file. Unreadable files yield no examples.
pub fn load_file(path: &Path) -> Vec<Example> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let examples = parse_document(&content);
            tracing::info!("Parsed {} examples from {}", examples.len(), path.display());
            examples
        }
        Err(e) => {
            tracing::warn!("Failed to read bootstrap file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
