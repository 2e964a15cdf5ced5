use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A query waiting to be scored, with the query that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub query: String,
    /// `None` for the seed itself.
    pub parent: Option<String>,
    /// Iteration in which the candidate was discovered.
    pub iteration: usize,
}

impl Candidate {
    pub fn new(query: impl Into<String>, parent: Option<String>, iteration: usize) -> Self {
        Self {
            query: query.into(),
            parent,
            iteration,
        }
    }

    pub fn seed(query: impl Into<String>) -> Self {
        Self::new(query, None, 0)
    }
}

/// How the accepted share of a candidate's related queries is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Random shuffle, then take the first ⌊factor × n⌋.
    Shuffle,
    /// Take the first ⌊factor × n⌋ in the order the source returned them.
    Truncate,
}

impl std::str::FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shuffle" => Ok(SelectionStrategy::Shuffle),
            "truncate" => Ok(SelectionStrategy::Truncate),
            other => Err(format!("unknown selection strategy: {other}")),
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::Shuffle => write!(f, "shuffle"),
            SelectionStrategy::Truncate => write!(f, "truncate"),
        }
    }
}

/// Picks ⌊factor × n⌋ queries out of `queries`.
pub fn select_subset<R: Rng + ?Sized>(
    mut queries: Vec<String>,
    factor: f64,
    strategy: SelectionStrategy,
    rng: &mut R,
) -> Vec<String> {
    let keep = ((factor * queries.len() as f64).floor() as usize).min(queries.len());
    if strategy == SelectionStrategy::Shuffle {
        queries.shuffle(rng);
    }
    queries.truncate(keep);
    queries
}

/// Worklist of the current iteration plus the one being built for the next.
///
/// Duplicates are allowed on the way in; the engine filters already settled
/// queries when it pops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontier {
    current: VecDeque<Candidate>,
    next: Vec<Candidate>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        Self {
            current: candidates.into_iter().collect(),
            next: Vec::new(),
        }
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.current.pop_front()
    }

    /// Puts a candidate back so it is the next one popped.
    pub fn requeue_front(&mut self, candidate: Candidate) {
        self.current.push_front(candidate);
    }

    #[cfg(test)]
    pub fn push_current(&mut self, candidate: Candidate) {
        self.current.push_back(candidate);
    }

    pub fn push_next(&mut self, candidate: Candidate) {
        self.next.push(candidate);
    }

    /// Moves the next-iteration list into the current queue.
    pub fn advance(&mut self) {
        self.current.extend(self.next.drain(..));
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    /// Candidates waiting in both lists.
    pub fn len(&self) -> usize {
        self.current.len() + self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.next.is_empty()
    }

    pub fn current(&self) -> impl Iterator<Item = &Candidate> {
        self.current.iter()
    }

    pub fn front(&self) -> Option<&Candidate> {
        self.current.front()
    }
}
