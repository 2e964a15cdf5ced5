//! Candidate sources: where related queries and snippets come from.
//!
//! The engine only sees the [`CandidateSource`] trait. Upstream conditions
//! are reported through [`FetchStatus`] rather than errors; the `Err` side of
//! [`CandidateSource::fetch_related`] is reserved for failures that should
//! end the run.

pub mod credentials;
pub mod pacing;
pub mod replay;

use crate::errors::SourceError;

pub use credentials::CredentialRing;
pub use pacing::Paced;
pub use replay::ReplaySource;

/// Outcome class of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    /// The upstream rate limit was hit with the current credential.
    Throttled,
    /// A response arrived but could not be understood.
    ParseError(String),
    /// No usable response arrived.
    Unavailable(String),
}

/// Related queries and snippets for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: FetchStatus,
    pub related_queries: Vec<String>,
    pub snippets: Vec<String>,
}

impl FetchResponse {
    pub fn ok(related_queries: Vec<String>, snippets: Vec<String>) -> Self {
        Self {
            status: FetchStatus::Ok,
            related_queries,
            snippets,
        }
    }

    pub fn throttled() -> Self {
        Self::failed(FetchStatus::Throttled)
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::failed(FetchStatus::ParseError(reason.into()))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::failed(FetchStatus::Unavailable(reason.into()))
    }

    fn failed(status: FetchStatus) -> Self {
        Self {
            status,
            related_queries: Vec::new(),
            snippets: Vec::new(),
        }
    }
}

/// Supplies related queries (and optionally snippets) for a query.
pub trait CandidateSource {
    fn fetch_related(&mut self, query: &str) -> Result<FetchResponse, SourceError>;

    /// Switches to the next credential after throttling. Returns `false`
    /// when none is left.
    fn rotate_credentials(&mut self) -> bool {
        false
    }
}

impl<S: CandidateSource + ?Sized> CandidateSource for Box<S> {
    fn fetch_related(&mut self, query: &str) -> Result<FetchResponse, SourceError> {
        (**self).fetch_related(query)
    }

    fn rotate_credentials(&mut self) -> bool {
        (**self).rotate_credentials()
    }
}
