//! Approximate matching of free-text symptom input against the catalog.
//!
//! Scores use the Ratcliff/Obershelp ratio: the longest common block of the two
//! strings is found, the procedure recurses on the pieces to its left and right,
//! and the matched character count `M` gives a score of `2·M / (|a| + |b|)`.
//! Identical strings score 1.0; strings with nothing in common score 0.0.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::SymptomCatalog,
    error::{DiagnosisError, Result},
};

/// Minimum similarity a candidate needs before it is accepted.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// A raw input resolved to a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomMatch {
    pub symptom: String,
    pub index: usize,
    pub score: f64,
}

/// Lowercases and collapses whitespace, `-` and `_` runs into a single `_`.
///
/// `"Skin Rash"`, `"skin-rash"` and `"skin_rash"` all normalize to `"skin_rash"`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_separator = false;

    for ch in text.trim().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_separator = !out.is_empty();
            continue;
        }
        if pending_separator {
            out.push('_');
            pending_separator = false;
        }
        out.extend(ch.to_lowercase());
    }

    out
}

/// Ratcliff/Obershelp similarity of two strings, compared as written.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio(&a, &b)
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_characters(a, b, 0, a.len(), 0, b.len());
    2.0 * matched as f64 / total as f64
}

fn matching_characters(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> usize {
    let (i, j, size) = longest_common_block(a, b, alo, ahi, blo, bhi);
    if size == 0 {
        return 0;
    }
    size + matching_characters(a, b, alo, i, blo, j)
        + matching_characters(a, b, i + size, ahi, j + size, bhi)
}

/// Longest block shared by `a[alo..ahi]` and `b[blo..bhi]`, returned as
/// `(start_in_a, start_in_b, len)`. Among equally long blocks the one starting
/// earliest in `a` wins, then earliest in `b`.
fn longest_common_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    if alo >= ahi || blo >= bhi {
        return best;
    }

    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo + 1;
            curr[k] = if a[i] == b[j] { prev[k - 1] + 1 } else { 0 };
            if curr[k] > best.2 {
                best = (i + 1 - curr[k], j + 1 - curr[k], curr[k]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

struct Candidate {
    symptom: String,
    normalized: Vec<char>,
}

/// Resolves free text to the closest catalog symptom.
///
/// The matcher precomputes the normalized form of every catalog entry once and
/// is immutable afterwards.
pub struct SymptomMatcher {
    candidates: Vec<Candidate>,
    threshold: f64,
}

impl SymptomMatcher {
    pub fn new(catalog: &SymptomCatalog) -> Self {
        Self {
            candidates: catalog
                .iter()
                .map(|symptom| Candidate {
                    symptom: symptom.to_string(),
                    normalized: normalize(symptom).chars().collect(),
                })
                .collect(),
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Like [`SymptomMatcher::new`] with a custom acceptance threshold in `(0, 1]`.
    pub fn with_threshold(catalog: &SymptomCatalog, threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DiagnosisError::Config(format!(
                "match threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        let mut matcher = Self::new(catalog);
        matcher.threshold = threshold;
        Ok(matcher)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best catalog entry scoring at least the threshold, or `None`.
    ///
    /// Input that is empty after trimming never matches. Equal scores resolve
    /// to the entry that comes first in the catalog.
    pub fn match_symptom(&self, raw_text: &str) -> Option<SymptomMatch> {
        let query: Vec<char> = normalize(raw_text).chars().collect();
        if query.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in self.candidates.iter().enumerate() {
            let score = ratio(&query, &candidate.normalized);
            if score < self.threshold {
                continue;
            }
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, score)) => {
                let symptom = self.candidates[index].symptom.clone();
                debug!(input = %raw_text, symptom = %symptom, score, "Matched symptom");
                Some(SymptomMatch {
                    symptom,
                    index,
                    score,
                })
            }
            None => {
                debug!(input = %raw_text, threshold = self.threshold, "No symptom cleared the threshold");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SymptomCatalog {
        SymptomCatalog::new(["fever", "cough", "fatigue", "skin_rash", "headache"]).unwrap()
    }

    #[test]
    fn test_similarity_scores() {
        assert_eq!(similarity("fever", "fever"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // "fev" + "r" shared: 2 * 4 / 9
        assert!((similarity("fevr", "fever") - 8.0 / 9.0).abs() < 1e-12);
        // only two single-character blocks: 2 * 2 / 13
        assert!((similarity("headache", "fever") - 4.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Skin Rash "), "skin_rash");
        assert_eq!(normalize("skin--rash"), "skin_rash");
        assert_eq!(normalize("_skin_ rash_"), "skin_rash");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_exact_entry_matches_itself() {
        let matcher = SymptomMatcher::new(&catalog());
        for symptom in catalog().iter() {
            let found = matcher.match_symptom(symptom).unwrap();
            assert_eq!(found.symptom, symptom);
            assert_eq!(found.score, 1.0);
        }
    }

    #[test]
    fn test_forgives_typos_case_and_spacing() {
        let matcher = SymptomMatcher::new(&catalog());
        assert_eq!(matcher.match_symptom("Fevr").unwrap().symptom, "fever");
        assert_eq!(matcher.match_symptom("coughing").unwrap().symptom, "cough");
        assert_eq!(matcher.match_symptom("Skin Rash").unwrap().symptom, "skin_rash");
    }

    #[test]
    fn test_unrelated_or_empty_input_rejected() {
        let matcher = SymptomMatcher::new(&catalog());
        assert!(matcher.match_symptom("not a real symptom").is_none());
        assert!(matcher.match_symptom("xyz").is_none());
        assert!(matcher.match_symptom("   ").is_none());
        assert!(matcher.match_symptom("").is_none());
    }

    #[test]
    fn test_ties_prefer_catalog_order() {
        // "ab" scores 2*2/6 against both entries
        let catalog = SymptomCatalog::new(["abxy", "abzw"]).unwrap();
        let matcher = SymptomMatcher::with_threshold(&catalog, 0.5).unwrap();
        let found = matcher.match_symptom("ab").unwrap();
        assert_eq!(found.symptom, "abxy");
        assert_eq!(found.index, 0);
    }

    #[test]
    fn test_threshold_is_a_hard_cutoff() {
        let catalog = SymptomCatalog::new(["fever"]).unwrap();
        // 8/9 similarity
        let strict = SymptomMatcher::with_threshold(&catalog, 0.9).unwrap();
        assert_eq!(strict.threshold(), 0.9);
        assert!(strict.match_symptom("fevr").is_none());
        assert_eq!(SymptomMatcher::new(&catalog).threshold(), DEFAULT_MATCH_THRESHOLD);

        let inclusive = SymptomMatcher::with_threshold(&catalog, 8.0 / 9.0).unwrap();
        assert!(inclusive.match_symptom("fevr").is_some());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        assert!(SymptomMatcher::with_threshold(&catalog(), 0.0).is_err());
        assert!(SymptomMatcher::with_threshold(&catalog(), 1.5).is_err());
        assert!(SymptomMatcher::with_threshold(&catalog(), f64::NAN).is_err());
    }
}
