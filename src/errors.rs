// Error types for the expansion engine, candidate sources and checkpoint store

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read source file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed source data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("candidate source failed: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("checkpoint I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint table error: {0}")]
    Csv(#[from] csv::Error),
    #[error("checkpoint state error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not replace checkpoint file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("checkpoint schema version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("malformed checkpoint row in {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("seed query {0:?} has no usable terms after normalization")]
    EmptySeed(String),
    #[error("seed query {0:?} returned no snippets to compare candidates against")]
    EmptyReference(String),
    #[error("seed query {query:?} could not be fetched: {reason}")]
    SeedUnavailable { query: String, reason: String },
    #[error("checkpoint for {seed:?} was written by method `{stored}`, not `{requested}`")]
    MethodMismatch {
        seed: String,
        stored: String,
        requested: String,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
