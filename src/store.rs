//! Durable checkpoints: one state blob plus approved/rejected CSV tables per
//! seed, all replaced atomically on every save.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::engine::{QueryLog, ScrapeState, STATE_SCHEMA_VERSION};
use crate::errors::StoreError;
use crate::query::{normalize_query, sanitize_seed};

/// Something that can persist the progress of a run.
pub trait Checkpointer {
    fn save(&self, approved: &QueryLog, rejected: &QueryLog, state: &ScrapeState) -> Result<(), StoreError>;
}

/// What a previous run left behind. Everything is empty for a new seed.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    pub approved: QueryLog,
    pub rejected: QueryLog,
    pub state: Option<ScrapeState>,
}

impl Checkpoint {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.approved.is_empty() && self.rejected.is_empty()
    }
}

/// File locations for one seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    pub state: PathBuf,
    pub approved: PathBuf,
    pub rejected: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    query: String,
    parent: Option<String>,
    score: f64,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files are keyed by the normalized seed made filesystem safe, so
    /// "The Coffee" and "coffee" share a checkpoint.
    pub fn paths(&self, seed: &str) -> CheckpointPaths {
        let token = sanitize_seed(&normalize_query(seed));
        CheckpointPaths {
            state: self.dir.join(format!("{token}.state.json")),
            approved: self.dir.join(format!("{token}_approved.csv")),
            rejected: self.dir.join(format!("{token}_rejected.csv")),
        }
    }

    /// Loads whatever exists for `seed`. Missing files are not an error.
    pub fn load(&self, seed: &str) -> Result<Checkpoint, StoreError> {
        let paths = self.paths(seed);
        let checkpoint = Checkpoint {
            approved: read_log(&paths.approved)?,
            rejected: read_log(&paths.rejected)?,
            state: read_state(&paths.state)?,
        };
        debug!(
            "Loaded checkpoint for {:?}: {} approved, {} rejected, state {}",
            seed,
            checkpoint.approved.len(),
            checkpoint.rejected.len(),
            if checkpoint.state.is_some() { "present" } else { "absent" }
        );
        Ok(checkpoint)
    }

    /// Removes every checkpoint file of `seed`.
    pub fn clear(&self, seed: &str) -> Result<(), StoreError> {
        let paths = self.paths(seed);
        for path in [&paths.state, &paths.approved, &paths.rejected] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed {:?}", path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    fn temp_file(&self) -> Result<NamedTempFile, StoreError> {
        NamedTempFile::new_in(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    fn write_log(&self, path: &Path, log: &QueryLog) -> Result<(), StoreError> {
        let mut tmp = self.temp_file()?;
        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            // serialize() only emits the header once a row exists
            writer.write_record(["query", "parent", "score"])?;
            for (query, entry) in log.iter() {
                let score = entry.score.to_string();
                writer.write_record([
                    query.as_str(),
                    entry.parent.as_deref().unwrap_or(""),
                    score.as_str(),
                ])?;
            }
            writer.flush().map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        tmp.persist(path)?;
        Ok(())
    }

    fn write_state(&self, path: &Path, state: &ScrapeState) -> Result<(), StoreError> {
        let mut tmp = self.temp_file()?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.flush().map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tmp.persist(path)?;
        Ok(())
    }
}

impl Checkpointer for CheckpointStore {
    /// Tables go first: if the process dies before the state blob is
    /// replaced, the resumed frontier only holds candidates that are
    /// skipped as already settled.
    fn save(&self, approved: &QueryLog, rejected: &QueryLog, state: &ScrapeState) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let paths = self.paths(&state.seed);
        self.write_log(&paths.approved, approved)?;
        self.write_log(&paths.rejected, rejected)?;
        self.write_state(&paths.state, state)?;
        Ok(())
    }
}

fn read_log(path: &Path) -> Result<QueryLog, StoreError> {
    let mut log = QueryLog::new();
    if !path.exists() {
        return Ok(log);
    }
    let mut reader = csv::Reader::from_path(path)?;
    for row in reader.deserialize() {
        let row: Row = row?;
        if row.query.trim().is_empty() {
            return Err(StoreError::Malformed {
                path: path.to_path_buf(),
                reason: "empty query".to_string(),
            });
        }
        let parent = row.parent.filter(|p| !p.is_empty());
        log.record(row.query, parent, row.score);
    }
    Ok(log)
}

fn read_state(path: &Path) -> Result<Option<ScrapeState>, StoreError> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let header: VersionHeader = serde_json::from_str(&json)?;
    if header.version != STATE_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: header.version,
            expected: STATE_SCHEMA_VERSION,
        });
    }
    Ok(Some(serde_json::from_str(&json)?))
}
