//! Query clarity: relative entropy between a query language model and the
//! language model of the collection it was issued against.
//!
//! The query model is estimated from the documents that contain at least one
//! query term, each smoothed with the collection model.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::query::stemmed_tokens;

/// Weight of the document model against the collection model.
pub const SMOOTHING: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClarityReport {
    pub score: f64,
    /// Distinct terms in the collection.
    pub vocabulary: usize,
    pub documents: usize,
    /// Documents containing at least one query term.
    pub query_documents: usize,
}

#[derive(Debug, Default)]
struct TermCounts {
    counts: HashMap<String, usize>,
    total: usize,
}

impl TermCounts {
    fn add(&mut self, tokens: &[String]) {
        for token in tokens {
            *self.counts.entry(token.clone()).or_insert(0) += 1;
        }
        self.total += tokens.len();
    }

    fn freq(&self, term: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts.get(term).copied().unwrap_or(0) as f64 / self.total as f64
    }

    fn contains(&self, term: &str) -> bool {
        self.counts.contains_key(term)
    }
}

fn smoothed(doc: &TermCounts, collection: &TermCounts, term: &str) -> f64 {
    SMOOTHING * doc.freq(term) + (1.0 - SMOOTHING) * collection.freq(term)
}

/// Clarity of `query` over `documents`.
///
/// Returns `None` when the query or the collection has no usable tokens.
/// Terms the query model gives no weight contribute nothing, so a query
/// matching none of the documents scores 0.
pub fn clarity_score(query: &str, documents: &[String]) -> Option<ClarityReport> {
    let query_terms = stemmed_tokens(query);
    if query_terms.is_empty() {
        return None;
    }

    let mut collection = TermCounts::default();
    let mut per_doc = Vec::with_capacity(documents.len());
    for doc in documents {
        let tokens = stemmed_tokens(doc);
        collection.add(&tokens);
        let mut counts = TermCounts::default();
        counts.add(&tokens);
        per_doc.push(counts);
    }
    if collection.total == 0 {
        return None;
    }

    let vocabulary = collection.counts.len();
    let prior = 1.0 / vocabulary as f64;

    // P(D|Q) up to normalization, for each document holding a query term
    let weighted: Vec<(&TermCounts, f64)> = per_doc
        .iter()
        .filter(|doc| query_terms.iter().any(|q| doc.contains(q)))
        .map(|doc| {
            let likelihood: f64 = query_terms
                .iter()
                .map(|q| smoothed(doc, &collection, q))
                .product();
            (doc, likelihood * prior)
        })
        .collect();

    let mut score = 0.0;
    for term in collection.counts.keys() {
        let p_collection = collection.freq(term);
        let p_query: f64 = weighted
            .iter()
            .map(|(doc, weight)| smoothed(doc, &collection, term) * weight)
            .sum();
        if p_query > 0.0 {
            score += p_query * (p_query / p_collection).log2();
        }
    }

    debug!(
        "Clarity of {:?}: {} terms, {}/{} documents with query terms",
        query,
        vocabulary,
        weighted.len(),
        documents.len()
    );

    Some(ClarityReport {
        score,
        vocabulary,
        documents: documents.len(),
        query_documents: weighted.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_nothing_to_score() {
        assert_eq!(clarity_score("coffee", &[]), None);
        assert_eq!(clarity_score("the of and", &docs(&["coffee beans"])), None);
        assert_eq!(clarity_score("coffee", &docs(&["the", ""])), None);
    }

    #[test]
    fn test_single_document_value() {
        // one document: every smoothed frequency is 0.5, prior 1/2
        let report = clarity_score("coffee", &docs(&["coffee beans"])).unwrap();
        assert_eq!(report.vocabulary, 2);
        assert_eq!(report.query_documents, 1);
        assert!((report.score - (-0.5)).abs() < 1e-12, "score was {}", report.score);
    }

    #[test]
    fn test_only_documents_with_query_terms_count() {
        let collection = docs(&["coffee beans roast", "green tea leaves", "roast coffee"]);
        let report = clarity_score("Coffee", &collection).unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.query_documents, 2);
        assert!(report.score.is_finite());
    }

    #[test]
    fn test_unmatched_query_scores_zero() {
        let report = clarity_score("espresso", &docs(&["green tea leaves"])).unwrap();
        assert_eq!(report.query_documents, 0);
        assert_eq!(report.score, 0.0);
    }
}
