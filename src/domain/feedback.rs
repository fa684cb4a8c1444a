//! User corrections collected by the feedback loop

use super::violations::{parse_digits, Severity};

/// What the user says a message really is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// The message violates a rule at the given severity
    Violation(Severity),
    /// The message is acceptable
    NotViolation,
}

impl Correction {
    /// Parse the corrected level for a disputed warning: `0` clears the
    /// message, `1`..=`5` relabels it.
    pub fn parse(input: &str) -> Result<Self, FeedbackError> {
        match parse_digits(input)? {
            0 => Ok(Self::NotViolation),
            level => u8::try_from(level)
                .ok()
                .and_then(Severity::from_level)
                .map(Self::Violation)
                .ok_or(FeedbackError::OutOfRange { level }),
        }
    }
}

/// Whether a yes/no answer is exactly the given letter after normalization
pub fn answer_is(answer: &str, letter: &str) -> bool {
    answer.trim().to_lowercase() == letter
}

/// Rejected feedback input. Reported to the user; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    /// Answer was not a whole number
    #[error("please enter a number, got '{input}'")]
    NotNumeric { input: String },

    /// Number outside the accepted levels
    #[error("invalid level {level}")]
    OutOfRange { level: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", Ok(Correction::NotViolation))]
    #[case("00", Ok(Correction::NotViolation))]
    #[case("1", Ok(Correction::Violation(Severity::Minor)))]
    #[case("5", Ok(Correction::Violation(Severity::Critical)))]
    #[case("7", Err(FeedbackError::OutOfRange { level: 7 }))]
    #[case("300", Err(FeedbackError::OutOfRange { level: 300 }))]
    #[case("x", Err(FeedbackError::NotNumeric { input: "x".to_string() }))]
    #[case("2.5", Err(FeedbackError::NotNumeric { input: "2.5".to_string() }))]
    fn test_correction_parse(#[case] input: &str, #[case] expected: Result<Correction, FeedbackError>) {
        assert_eq!(Correction::parse(input), expected);
    }

    #[rstest]
    #[case("n", true)]
    #[case(" N ", true)]
    #[case("no", false)]
    #[case("", false)]
    #[case("y", false)]
    fn test_answer_is_no(#[case] answer: &str, #[case] expected: bool) {
        assert_eq!(answer_is(answer, "n"), expected);
    }
}
