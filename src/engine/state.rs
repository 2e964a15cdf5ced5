use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::OverlapMethod;
use crate::frontier::{Candidate, Frontier};

/// Version written into every state blob. Bump when a field changes meaning.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// One classified query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredQuery {
    pub parent: Option<String>,
    pub score: f64,
}

/// Insertion-ordered record of approved or rejected queries.
///
/// The first recording of a query wins; later attempts are refused so a
/// query is never scored twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryLog {
    entries: IndexMap<String, ScoredQuery>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `query`. Returns `false` if it was already present.
    pub fn record(&mut self, query: impl Into<String>, parent: Option<String>, score: f64) -> bool {
        let query = query.into();
        if self.entries.contains_key(&query) {
            return false;
        }
        self.entries.insert(query, ScoredQuery { parent, score });
        true
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains_key(query)
    }

    pub fn get(&self, query: &str) -> Option<&ScoredQuery> {
        self.entries.get(query)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScoredQuery)> {
        self.entries.iter()
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// A first-hop content score waiting for the iteration-0 threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingScore {
    pub candidate: Candidate,
    pub score: f64,
}

/// Everything needed to resume an expansion run for one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeState {
    pub version: u32,
    pub seed: String,
    pub method: OverlapMethod,
    pub iteration: usize,
    /// False until the initial frontier has been built.
    pub bootstrapped: bool,
    pub frontier: Frontier,
    /// Active acceptance threshold, once known.
    pub threshold: Option<f64>,
    /// Snippets of the seed; the reference for content scoring.
    #[serde(default)]
    pub reference_snippets: Vec<String>,
    /// Keyed by query.
    #[serde(default)]
    pub pending: IndexMap<String, PendingScore>,
    #[serde(default)]
    pub junk: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeState {
    pub fn new(seed: impl Into<String>, method: OverlapMethod) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_SCHEMA_VERSION,
            seed: seed.into(),
            method,
            iteration: 0,
            bootstrapped: false,
            frontier: Frontier::new(),
            threshold: None,
            reference_snippets: Vec::new(),
            pending: IndexMap::new(),
            junk: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self, query: &str) -> bool {
        self.pending.contains_key(query)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
