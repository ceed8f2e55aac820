//! Similarity scoring for fuzzy and embedding-based resolution.
//!
//! Scoring is a capability, not a concrete algorithm: resolvers take a
//! [`SimilarityScorer`] so edit-distance, token-ratio, or other strategies
//! can be swapped without touching their control flow. The default is
//! Jaro-Winkler over lowercased strings.

use std::cmp::Ordering;

/// Minimum Jaro-Winkler similarity for option-value matching.
pub const OPTION_MATCH_THRESHOLD: f64 = 0.6;

/// Minimum similarity for entity-name shortlisting (looser: the LLM picks
/// from the shortlist, so recall matters more than precision here).
pub const ENTITY_SHORTLIST_THRESHOLD: f64 = 0.4;

/// Shortlist size offered to the LLM for field disambiguation.
pub const FIELD_SHORTLIST_SIZE: usize = 5;

/// Shortlist size offered to the LLM for entity selection.
pub const ENTITY_SHORTLIST_SIZE: usize = 10;

/// Pluggable string-similarity strategy. Scores are in `[0.0, 1.0]`,
/// higher is more similar.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Jaro-Winkler over lowercased input. The crate default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl SimilarityScorer for JaroWinkler {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::jaro_winkler(&a.to_lowercase(), &b.to_lowercase())
    }
}

/// A scored candidate from a shortlist pass.
#[derive(Debug, Clone)]
pub struct ScoredCandidate<T> {
    pub item: T,
    pub score: f64,
}

/// Rank `candidates` against `query`, keep those at or above `threshold`,
/// and return the best `k` in descending score order.
///
/// `name_of` extracts the comparable text from each candidate.
pub fn shortlist<T, F>(
    scorer: &dyn SimilarityScorer,
    query: &str,
    candidates: impl IntoIterator<Item = T>,
    name_of: F,
    threshold: f64,
    k: usize,
) -> Vec<ScoredCandidate<T>>
where
    F: Fn(&T) -> &str,
{
    let mut scored: Vec<ScoredCandidate<T>> = candidates
        .into_iter()
        .map(|item| {
            let score = scorer.score(query, name_of(&item));
            ScoredCandidate { item, score }
        })
        .filter(|c| c.score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Cosine similarity between two embedding vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude vectors rather than
/// erroring: such records simply never rank.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaro_winkler_is_case_insensitive() {
        let s = JaroWinkler;
        assert_eq!(s.score("Phishing Detection", "phishing detection"), 1.0);
    }

    #[test]
    fn test_shortlist_orders_and_truncates() {
        let s = JaroWinkler;
        let names = vec!["Nordea Rollout", "SLSP Core", "Nordea Pilot"];
        let hits = shortlist(&s, "nordea", names, |n| n, 0.4, 2);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.item.starts_with("Nordea")));
    }

    #[test]
    fn test_shortlist_applies_threshold() {
        let s = JaroWinkler;
        let hits = shortlist(&s, "zzzzqq", vec!["Nordea Rollout"], |n| n, 0.4, 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        // Length mismatch and zero vectors never rank
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
