use std::collections::VecDeque;
use tracing::{info, warn};

/// Credentials handed out one at a time; a throttled key is never reused
/// within a run.
#[derive(Debug, Clone, Default)]
pub struct CredentialRing {
    current: Option<String>,
    spare: VecDeque<String>,
}

impl CredentialRing {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spare: VecDeque<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|k: &String| !k.trim().is_empty())
            .collect();
        let current = spare.pop_front();
        Self { current, spare }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Number of credentials not yet used.
    pub fn remaining(&self) -> usize {
        self.spare.len()
    }

    /// Drops the current credential and moves to the next one.
    pub fn rotate(&mut self) -> Option<&str> {
        self.current = self.spare.pop_front();
        match &self.current {
            Some(key) => info!("Throttling encountered, switched to key {}", mask(key)),
            None => warn!("All credentials exhausted due to throttling"),
        }
        self.current.as_deref()
    }
}

/// Shows only the last four characters of a key.
pub fn mask(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}
