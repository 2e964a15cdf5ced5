use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::{CandidateSource, CredentialRing, FetchResponse};
use crate::errors::SourceError;
use crate::query::normalize_query;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedStatus {
    #[default]
    Ok,
    Throttled,
    ParseError,
    Unavailable,
}

/// One recorded answer in a replay file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordedResponse {
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub snippets: Vec<String>,
    #[serde(default)]
    pub status: RecordedStatus,
}

#[derive(Debug, Deserialize)]
struct ReplayFile {
    #[serde(default)]
    queries: HashMap<String, RecordedResponse>,
}

/// Answers fetches from a recorded JSON file instead of the network.
///
/// ```json
/// {"queries": {"coffee": {"related": ["coffee shop"], "snippets": ["..."]}}}
/// ```
///
/// Keys are normalized on load. Unknown queries answer `Ok` with nothing
/// related. A `throttled` entry stays throttled however often it is asked;
/// each throttle burns one credential from the ring.
#[derive(Debug, Default)]
pub struct ReplaySource {
    responses: HashMap<String, RecordedResponse>,
    credentials: CredentialRing,
    requests: Vec<String>,
}

impl ReplaySource {
    pub fn new(responses: HashMap<String, RecordedResponse>) -> Self {
        let responses = responses
            .into_iter()
            .map(|(query, response)| (normalize_query(&query), response))
            .collect();
        Self {
            responses,
            credentials: CredentialRing::default(),
            requests: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        let file: ReplayFile = serde_json::from_str(json)?;
        Ok(Self::new(file.queries))
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let json = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_credentials(mut self, credentials: CredentialRing) -> Self {
        self.credentials = credentials;
        self
    }

    /// Queries fetched so far, in order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }
}

impl CandidateSource for ReplaySource {
    fn fetch_related(&mut self, query: &str) -> Result<FetchResponse, SourceError> {
        self.requests.push(query.to_string());
        let key = normalize_query(query);
        let Some(recorded) = self.responses.get(&key) else {
            debug!("No recorded response for {:?}", query);
            return Ok(FetchResponse::ok(Vec::new(), Vec::new()));
        };

        Ok(match recorded.status {
            RecordedStatus::Ok => {
                FetchResponse::ok(recorded.related.clone(), recorded.snippets.clone())
            }
            RecordedStatus::Throttled => FetchResponse::throttled(),
            RecordedStatus::ParseError => {
                FetchResponse::parse_error(format!("recorded parse failure for {query:?}"))
            }
            RecordedStatus::Unavailable => {
                FetchResponse::unavailable(format!("recorded outage for {query:?}"))
            }
        })
    }

    fn rotate_credentials(&mut self) -> bool {
        self.credentials.rotate().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FetchStatus;

    const RECORDING: &str = r#"{
        "queries": {
            "Coffee": {"related": ["coffee shop", "coffee beans"], "snippets": ["fresh coffee"]},
            "coffee beans": {"status": "throttled"},
            "tea": {"status": "parse_error"}
        }
    }"#;

    #[test]
    fn test_lookup_is_normalized() {
        let mut source = ReplaySource::from_json_str(RECORDING).unwrap();
        let response = source.fetch_related("the coffee").unwrap();
        assert_eq!(response.status, FetchStatus::Ok);
        assert_eq!(response.related_queries, vec!["coffee shop", "coffee beans"]);
        assert_eq!(response.snippets, vec!["fresh coffee"]);
        assert_eq!(source.requests(), &["the coffee".to_string()]);
    }

    #[test]
    fn test_unknown_query_is_empty_ok() {
        let mut source = ReplaySource::from_json_str(RECORDING).unwrap();
        let response = source.fetch_related("mountain bikes").unwrap();
        assert_eq!(response, FetchResponse::ok(Vec::new(), Vec::new()));
    }

    #[test]
    fn test_recorded_failures() {
        let mut source = ReplaySource::from_json_str(RECORDING)
            .unwrap()
            .with_credentials(CredentialRing::new(["a", "b"]));
        assert_eq!(
            source.fetch_related("coffee beans").unwrap().status,
            FetchStatus::Throttled
        );
        assert!(matches!(
            source.fetch_related("tea").unwrap().status,
            FetchStatus::ParseError(_)
        ));
        assert!(source.rotate_credentials());
        assert!(!source.rotate_credentials());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            ReplaySource::from_json_str("{not json"),
            Err(SourceError::Malformed(_))
        ));
    }
}
