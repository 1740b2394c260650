//! Name similarity as a normalized Levenshtein percentage.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::model::SimilarityScore;

/// Pluggable name comparison used by the matcher.
pub trait SimilarityMetric: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> SimilarityScore;
}

/// How names are prepared before the distance is computed.
///
/// `Exact` compares the raw strings (case-sensitive, whitespace kept).
/// `Folded` trims, collapses whitespace runs to one space and lowercases.
/// Accents are never folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    Exact,
    Folded,
}

impl Normalization {
    pub fn apply<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            Self::Exact => Cow::Borrowed(name),
            Self::Folded => {
                let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
                Cow::Owned(collapsed.to_lowercase())
            }
        }
    }
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Folded => write!(f, "folded"),
        }
    }
}

/// Unit-cost edit distance over chars, scaled to a percentage of the longer name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Levenshtein {
    normalization: Normalization,
}

impl Levenshtein {
    pub fn new(normalization: Normalization) -> Self {
        Self { normalization }
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }
}

impl SimilarityMetric for Levenshtein {
    fn similarity(&self, a: &str, b: &str) -> SimilarityScore {
        let a = self.normalization.apply(a);
        let b = self.normalization.apply(b);
        let longest = a.chars().count().max(b.chars().count());
        if longest == 0 {
            return SimilarityScore::IDENTICAL;
        }
        let distance = strsim::levenshtein(&a, &b);
        // Integer numerator keeps exact boundaries (e.g. 6/10 -> 60.0) exact.
        SimilarityScore::from_percent((longest - distance) as f64 * 100.0 / longest as f64)
    }
}

/// Similarity under the reference metric (exact, case-sensitive).
pub fn similarity(a: &str, b: &str) -> SimilarityScore {
    Levenshtein::default().similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_names_score_100() {
        assert_eq!(similarity("Macintosh", "Macintosh").value(), 100.0);
    }

    #[test]
    fn two_empty_names_are_identical() {
        assert_eq!(similarity("", "").value(), 100.0);
    }

    #[test]
    fn empty_against_non_empty_is_zero() {
        assert_eq!(similarity("", "Amiga").value(), 0.0);
        assert_eq!(similarity("Amiga", "").value(), 0.0);
    }

    #[test]
    fn percentage_of_longer_name() {
        // kitten -> sitting: 3 edits over 7 chars
        let s = similarity("kitten", "sitting").value();
        assert!((s - 400.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn exact_boundary_is_not_rounded_away() {
        // one substitution over ten chars
        assert_eq!(similarity("ABCDEFGHIJ", "ABCDEFGHIX").value(), 90.0);
        // four substitutions over ten chars
        assert_eq!(similarity("ABCDEFGHIJ", "ABCDEFWXYZ").value(), 60.0);
    }

    #[test]
    fn mixed_script_counts_chars_not_bytes() {
        // "Macintош": Cyrillic о and ш, 3 edits over 9 chars
        let s = similarity("Macintosh", "Macintош").value();
        assert!((s - 600.0 / 9.0).abs() < 1e-9);
        assert!(s >= 60.0);
    }

    #[test]
    fn exact_is_case_sensitive() {
        let s = similarity("Macintosh", "macintosh").value();
        assert!(s < 100.0);
        assert!((s - 800.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn exact_keeps_whitespace() {
        assert!(similarity("Amiga 500", " Amiga  500 ").value() < 100.0);
    }

    #[test]
    fn folded_ignores_case_and_spacing() {
        let folded = Levenshtein::new(Normalization::Folded);
        assert_eq!(folded.similarity("Macintosh", "MACINTOSH").value(), 100.0);
        assert_eq!(folded.similarity("Amiga 500", "  amiga   500 ").value(), 100.0);
    }

    #[test]
    fn folded_keeps_accents() {
        let folded = Levenshtein::new(Normalization::Folded);
        assert!(folded.similarity("Télé", "tele").value() < 100.0);
    }

    #[test]
    fn normalization_display() {
        assert_eq!(Normalization::Exact.to_string(), "exact");
        assert_eq!(Normalization::Folded.to_string(), "folded");
    }

    proptest! {
        #[test]
        fn prop_identity(a in "\\PC{0,16}") {
            prop_assert_eq!(similarity(&a, &a).value(), 100.0);
        }

        #[test]
        fn prop_symmetry(a in "\\PC{0,16}", b in "\\PC{0,16}") {
            prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }

        #[test]
        fn prop_in_range(a in "\\PC{0,16}", b in "\\PC{0,16}") {
            let s = similarity(&a, &b).value();
            prop_assert!((0.0..=100.0).contains(&s));
        }
    }
}
