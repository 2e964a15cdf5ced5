//! Common test utilities: a scripted candidate source and small helpers.
#![allow(dead_code)]

use std::collections::HashMap;

use qexpand::engine::EngineConfig;
use qexpand::frontier::SelectionStrategy;
use qexpand::similarity::ContentKernel;
use qexpand::{CandidateSource, FetchResponse, OverlapMethod, SourceError};

/// Answers from a script. Each query has a list of responses; calls consume
/// them in order and the last one repeats. Unscripted queries answer `Ok`
/// with nothing.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Vec<FetchResponse>>,
    failing: HashMap<String, String>,
    spare_credentials: usize,
    pub requests: Vec<String>,
    pub rotations: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(self, query: &str, related: &[&str], snippets: &[&str]) -> Self {
        self.then(
            query,
            FetchResponse::ok(strings(related), strings(snippets)),
        )
    }

    pub fn then(mut self, query: &str, response: FetchResponse) -> Self {
        self.scripts
            .entry(query.to_string())
            .or_default()
            .push(response);
        self
    }

    /// Makes every fetch of `query` fail with a hard error.
    pub fn failing(mut self, query: &str, reason: &str) -> Self {
        self.failing.insert(query.to_string(), reason.to_string());
        self
    }

    pub fn with_spare_credentials(mut self, n: usize) -> Self {
        self.spare_credentials = n;
        self
    }
}

impl CandidateSource for ScriptedSource {
    fn fetch_related(&mut self, query: &str) -> Result<FetchResponse, SourceError> {
        self.requests.push(query.to_string());
        if let Some(reason) = self.failing.get(query) {
            return Err(SourceError::Other(reason.clone()));
        }
        let Some(script) = self.scripts.get_mut(query) else {
            return Ok(FetchResponse::ok(Vec::new(), Vec::new()));
        };
        if script.len() > 1 {
            Ok(script.remove(0))
        } else {
            Ok(script[0].clone())
        }
    }

    fn rotate_credentials(&mut self) -> bool {
        self.rotations += 1;
        if self.spare_credentials == 0 {
            return false;
        }
        self.spare_credentials -= 1;
        true
    }
}

/// Reads the score straight out of the candidate's first snippet.
pub struct SnippetScoreKernel;

impl ContentKernel for SnippetScoreKernel {
    fn similarity(&self, _reference: &[String], candidate: &[String]) -> Option<f64> {
        candidate.first()?.parse().ok()
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn lexical_config(iterations: usize) -> EngineConfig {
    EngineConfig {
        method: OverlapMethod::LexicalNgram,
        iteration_limit: iterations,
        threshold: 0.25,
        selection_factor: 1.0,
        selection: SelectionStrategy::Truncate,
        shuffle_seed: Some(7),
        ..Default::default()
    }
}

pub fn content_config(method: OverlapMethod, iterations: usize) -> EngineConfig {
    EngineConfig {
        method,
        iteration_limit: iterations,
        ..Default::default()
    }
}

/// The coffee graph used across the lexical tests.
pub fn coffee_source() -> ScriptedSource {
    ScriptedSource::new()
        .ok("coffee", &["coffee shop", "coffee beans", "iced coffee"], &[])
        .ok("coffee shop", &["espresso bar", "latte art"], &[])
        .ok("coffee beans", &["coffee", "arabica beans"], &[])
        .ok("iced coffee", &["cold brew"], &[])
}
