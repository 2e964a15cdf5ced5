//! qexpand grows a seed search query into a set of related queries.
//!
//! Each candidate is scored either lexically (overlap of its related queries
//! with what has already been approved) or by content (TF-IDF similarity of
//! its snippets to the seed's), accepted or rejected, and its related queries
//! queued for the next iteration. Progress is checkpointed after every
//! candidate so an interrupted run resumes where it stopped.

pub mod clarity;
pub mod config;
pub mod engine;
pub mod errors;
pub mod frontier;
pub mod query;
pub mod recall;
pub mod similarity;
pub mod source;
pub mod store;

// Re-export commonly used types for convenience
pub use engine::{Engine, EngineConfig, OverlapMethod, RunSummary, StopReason};
pub use errors::{EngineError, SourceError, StoreError};
pub use similarity::{content_kernel, lexical_overlap};
pub use source::{CandidateSource, FetchResponse, FetchStatus};
pub use store::{Checkpoint, CheckpointStore, Checkpointer};
