//! Lexical overlap between a candidate's related queries and the approved set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::query::token_set;

/// How related queries are compared against approved queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalMode {
    /// Exact token-set equality against approved queries of the same length.
    Ngram,
    /// Exact string membership in the approved set.
    String,
}

/// Approved queries bucketed by their number of distinct tokens.
///
/// Lookups only touch the bucket of the candidate's own length, and inside a
/// bucket token sets are hashed, so a membership test costs one hash lookup.
#[derive(Debug, Clone, Default)]
pub struct NgramIndex {
    by_len: HashMap<usize, Vec<String>>,
    token_sets: HashMap<usize, HashSet<BTreeSet<String>>>,
    queries: HashSet<String>,
}

impl NgramIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index over already normalized queries.
    pub fn from_queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for query in queries {
            index.insert(query.as_ref());
        }
        index
    }

    /// Adds a normalized query. Returns `false` if it was already indexed.
    pub fn insert(&mut self, query: &str) -> bool {
        if !self.queries.insert(query.to_string()) {
            return false;
        }
        let tokens = token_set(query);
        let len = tokens.len();
        self.by_len.entry(len).or_default().push(query.to_string());
        self.token_sets.entry(len).or_default().insert(tokens);
        true
    }

    /// Number of approved queries in the index.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn contains_query(&self, query: &str) -> bool {
        self.queries.contains(query)
    }

    /// True when some indexed query has exactly this token set.
    pub fn contains_token_set(&self, tokens: &BTreeSet<String>) -> bool {
        self.token_sets
            .get(&tokens.len())
            .is_some_and(|bucket| bucket.contains(tokens))
    }

    /// Queries indexed under the given token count, in insertion order.
    pub fn queries_of_len(&self, len: usize) -> &[String] {
        self.by_len.get(&len).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct token counts present in the index, ascending.
    pub fn lengths(&self) -> Vec<usize> {
        let mut lengths: Vec<usize> = self.by_len.keys().copied().collect();
        lengths.sort_unstable();
        lengths
    }
}

/// Fraction of `candidates` that already belong to the approved reference.
///
/// Returns 1.0 when the reference is empty (nothing approved yet, so the
/// first query is accepted unconditionally) and 0.0 when there are no
/// candidates. Otherwise the number of matching candidates is divided by
/// `min(|reference|, |candidates|)`. Candidates are deduplicated first (by
/// token set in ngram mode, by string in string mode), which keeps the value
/// inside [0, 1].
pub fn lexical_overlap(candidates: &[String], reference: &NgramIndex, mode: LexicalMode) -> f64 {
    if reference.is_empty() {
        return 1.0;
    }
    if candidates.is_empty() {
        return 0.0;
    }

    let (distinct, matches) = match mode {
        LexicalMode::Ngram => {
            let sets: HashSet<BTreeSet<String>> =
                candidates.iter().map(|c| token_set(c)).collect();
            let matches = sets
                .iter()
                .filter(|set| reference.contains_token_set(set))
                .count();
            (sets.len(), matches)
        }
        LexicalMode::String => {
            let strings: HashSet<&str> = candidates.iter().map(String::as_str).collect();
            let matches = strings
                .iter()
                .filter(|s| reference.contains_query(s))
                .count();
            (strings.len(), matches)
        }
    };

    let control_size = reference.len().min(distinct);
    matches as f64 / control_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_reference_is_vacuous_acceptance() {
        let index = NgramIndex::new();
        assert_eq!(lexical_overlap(&[], &index, LexicalMode::Ngram), 1.0);
        assert_eq!(
            lexical_overlap(&strings(&["a b"]), &index, LexicalMode::String),
            1.0
        );
    }

    #[test]
    fn test_empty_candidates_score_zero() {
        let index = NgramIndex::from_queries(["coffee"]);
        assert_eq!(lexical_overlap(&[], &index, LexicalMode::Ngram), 0.0);
        assert_eq!(lexical_overlap(&[], &index, LexicalMode::String), 0.0);
    }

    #[test]
    fn test_ngram_matches_ignore_word_order() {
        let index = NgramIndex::from_queries(["coffee shop", "espresso"]);
        let candidates = strings(&["shop coffee", "coffee shop near", "latte"]);
        // One match out of min(2, 3).
        let overlap = lexical_overlap(&candidates, &index, LexicalMode::Ngram);
        assert!((overlap - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_string_mode_requires_exact_text() {
        let index = NgramIndex::from_queries(["coffee shop", "espresso"]);
        let candidates = strings(&["shop coffee", "espresso"]);
        let overlap = lexical_overlap(&candidates, &index, LexicalMode::String);
        assert!((overlap - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_candidates_do_not_exceed_one() {
        let index = NgramIndex::from_queries(["coffee"]);
        let candidates = strings(&["coffee", "coffee", "coffee"]);
        assert_eq!(lexical_overlap(&candidates, &index, LexicalMode::Ngram), 1.0);
        assert_eq!(lexical_overlap(&candidates, &index, LexicalMode::String), 1.0);
    }

    #[test]
    fn test_index_buckets_by_token_count() {
        let mut index = NgramIndex::new();
        assert!(index.insert("coffee"));
        assert!(index.insert("coffee beans"));
        assert!(!index.insert("coffee"));
        assert_eq!(index.lengths(), vec![1, 2]);
        assert_eq!(index.queries_of_len(1), &["coffee".to_string()]);
        assert!(index.queries_of_len(3).is_empty());
        assert_eq!(index.len(), 2);
    }
}
