//! Approximate string similarity used by the abbreviation matcher

/// Scores how alike two strings are on a 0..=100 scale.
///
/// Implementations compare strings exactly as given; callers are responsible
/// for case folding.
pub trait Scorer: Send + Sync {
    /// Similarity of `a` and `b`, 100 meaning identical
    fn ratio(&self, a: &str, b: &str) -> f64;
}

/// Indel ratio over Unicode scalar values: `100 * (1 - indel / (|a| + |b|))`
#[derive(Debug, Clone, Copy, Default)]
pub struct IndelScorer;

impl Scorer for IndelScorer {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("stfu", "stfu", 100.0)]
    #[case("stfuu", "stfu", 800.0 / 9.0)]
    #[case("wtff", "wtf", 600.0 / 7.0)]
    #[case("dcmm", "dcm", 600.0 / 7.0)]
    #[case("abcd", "wxyz", 0.0)]
    fn test_indel_ratio(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        let score = IndelScorer.ratio(a, b);
        assert!((score - expected).abs() < 1e-6, "{a} vs {b} scored {score}");
    }

    #[test]
    fn test_one_extra_letter_on_short_key_clears_threshold() {
        assert!(IndelScorer.ratio("wtff", "wtf") >= 80.0);
        assert!(IndelScorer.ratio("wtf", "wtff") >= 80.0);
    }

    #[test]
    fn test_ratio_is_case_sensitive() {
        assert!(IndelScorer.ratio("STFU", "stfu") < 80.0);
    }

    #[test]
    fn test_ratio_counts_characters_not_bytes() {
        // a substitution costs one deletion plus one insertion
        let score = IndelScorer.ratio("đmm", "dmm");
        assert!((score - 200.0 / 3.0).abs() < 1e-6);
    }
}
