//! The acceptance engine: drains the frontier one candidate at a time,
//! scores each candidate, classifies it and checkpoints after every step.

pub mod state;
pub mod threshold;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::frontier::{select_subset, Candidate, Frontier, SelectionStrategy};
use crate::query::{normalize_all, normalize_query};
use crate::similarity::{lexical_overlap, ContentKernel, LexicalMode, NgramIndex, TfIdfKernel};
use crate::source::{CandidateSource, FetchStatus};
use crate::store::{Checkpoint, Checkpointer};

pub use state::{PendingScore, QueryLog, ScoredQuery, ScrapeState, STATE_SCHEMA_VERSION};

/// Frontier size past which a run stops expanding.
pub const DEFAULT_FRONTIER_CAP: usize = 40_000;

/// Scoring method used to classify candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlapMethod {
    /// Token-set overlap of related queries with approved queries.
    #[serde(rename = "ngram")]
    LexicalNgram,
    /// Exact-string overlap of related queries with approved queries.
    #[serde(rename = "string")]
    LexicalString,
    /// TF-IDF centroid similarity, threshold = weakest first-hop score.
    #[serde(rename = "kernel")]
    ContentKernel,
    /// TF-IDF centroid similarity, threshold = lower outlier fence of the
    /// first hop.
    #[serde(rename = "kernel-stat")]
    ContentKernelStatistical,
}

impl OverlapMethod {
    pub fn is_lexical(&self) -> bool {
        self.lexical_mode().is_some()
    }

    pub fn lexical_mode(&self) -> Option<LexicalMode> {
        match self {
            OverlapMethod::LexicalNgram => Some(LexicalMode::Ngram),
            OverlapMethod::LexicalString => Some(LexicalMode::String),
            OverlapMethod::ContentKernel | OverlapMethod::ContentKernelStatistical => None,
        }
    }
}

impl std::str::FromStr for OverlapMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ngram" | "n" => Ok(OverlapMethod::LexicalNgram),
            "string" | "s" => Ok(OverlapMethod::LexicalString),
            "kernel" => Ok(OverlapMethod::ContentKernel),
            "kernel-stat" | "kernel_stat" => Ok(OverlapMethod::ContentKernelStatistical),
            other => Err(format!(
                "unknown method: {other} (expected ngram, string, kernel or kernel-stat)"
            )),
        }
    }
}

impl std::fmt::Display for OverlapMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OverlapMethod::LexicalNgram => "ngram",
            OverlapMethod::LexicalString => "string",
            OverlapMethod::ContentKernel => "kernel",
            OverlapMethod::ContentKernelStatistical => "kernel-stat",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub method: OverlapMethod,
    /// Number of iterations to run; 0 does nothing.
    pub iteration_limit: usize,
    /// Fixed acceptance threshold for lexical methods.
    pub threshold: f64,
    /// Share of an accepted candidate's related queries that is enqueued.
    pub selection_factor: f64,
    pub selection: SelectionStrategy,
    /// Seed for the shuffle; `None` draws from entropy.
    pub shuffle_seed: Option<u64>,
    pub frontier_cap: usize,
    /// Consecutive `Unavailable` answers tolerated in lexical methods.
    pub max_retries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: OverlapMethod::LexicalNgram,
            iteration_limit: 3,
            threshold: 0.25,
            selection_factor: 1.0,
            selection: SelectionStrategy::Shuffle,
            shuffle_seed: None,
            frontier_cap: DEFAULT_FRONTIER_CAP,
            max_retries: 3,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.selection_factor) {
            return Err(EngineError::InvalidConfig(format!(
                "selection factor must be within [0, 1], got {}",
                self.selection_factor
            )));
        }
        if self.frontier_cap == 0 {
            return Err(EngineError::InvalidConfig(
                "frontier cap must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    IterationLimit,
    /// Lexical methods only: nothing left to score.
    FrontierExhausted,
    FrontierCap,
    /// Throttled with no credential left to rotate to.
    ResourceExhausted,
    /// Too many consecutive `Unavailable` answers.
    RetriesExhausted,
}

impl StopReason {
    /// True when the run stopped early and can be resumed later.
    pub fn is_resumable(&self) -> bool {
        matches!(self, StopReason::ResourceExhausted | StopReason::RetriesExhausted)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::IterationLimit => "iteration limit reached",
            StopReason::FrontierExhausted => "frontier exhausted",
            StopReason::FrontierCap => "frontier cap exceeded",
            StopReason::ResourceExhausted => "credentials exhausted due to throttling",
            StopReason::RetriesExhausted => "retrieval retries exhausted",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub seed: String,
    pub method: OverlapMethod,
    pub stop_reason: StopReason,
    pub iteration: usize,
    pub approved: usize,
    pub rejected: usize,
    pub junk: usize,
    pub frontier: usize,
    pub threshold: Option<f64>,
    /// Candidates classified during this run (resumed work excluded).
    pub scored: usize,
}

enum Step {
    Continue,
    Stop(StopReason),
}

pub struct Engine {
    config: EngineConfig,
    state: ScrapeState,
    approved: QueryLog,
    rejected: QueryLog,
    index: NgramIndex,
    kernel: Box<dyn ContentKernel>,
    rng: StdRng,
    retries: usize,
    scored: usize,
}

impl Engine {
    /// Starts a fresh run for `seed`.
    pub fn new(seed: &str, config: EngineConfig) -> Result<Self, EngineError> {
        Self::resume(seed, config, Checkpoint::default())
    }

    /// Continues from a loaded checkpoint. An empty checkpoint starts fresh.
    pub fn resume(seed: &str, config: EngineConfig, checkpoint: Checkpoint) -> Result<Self, EngineError> {
        config.validate()?;
        let normalized = normalize_query(seed);
        if normalized.is_empty() {
            return Err(EngineError::EmptySeed(seed.to_string()));
        }

        let state = match checkpoint.state {
            Some(state) => {
                if state.method != config.method {
                    return Err(EngineError::MethodMismatch {
                        seed: normalized,
                        stored: state.method.to_string(),
                        requested: config.method.to_string(),
                    });
                }
                info!(
                    "Resuming {:?} at iteration {} with {} queued candidates",
                    state.seed,
                    state.iteration,
                    state.frontier.len()
                );
                state
            }
            None => ScrapeState::new(normalized, config.method),
        };

        let index = NgramIndex::from_queries(checkpoint.approved.queries());
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            state,
            approved: checkpoint.approved,
            rejected: checkpoint.rejected,
            index,
            kernel: Box::new(TfIdfKernel),
            rng,
            retries: 0,
            scored: 0,
        })
    }

    /// Replaces the content kernel used by the content methods.
    pub fn with_kernel(mut self, kernel: Box<dyn ContentKernel>) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &ScrapeState {
        &self.state
    }

    pub fn approved(&self) -> &QueryLog {
        &self.approved
    }

    pub fn rejected(&self) -> &QueryLog {
        &self.rejected
    }

    pub fn index(&self) -> &NgramIndex {
        &self.index
    }

    /// Runs until a stop condition and saves on every exit path, including
    /// errors.
    pub fn run(
        &mut self,
        source: &mut dyn CandidateSource,
        store: &dyn Checkpointer,
    ) -> Result<RunSummary, EngineError> {
        let outcome = self.drive(source, store);
        self.state.touch();
        let saved = store.save(&self.approved, &self.rejected, &self.state);

        match (outcome, saved) {
            (Ok(stop), Ok(())) => {
                info!("Run for {:?} stopped: {}", self.state.seed, stop);
                Ok(self.summary(stop))
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), saved) => {
                if let Err(save_error) = saved {
                    warn!("Final checkpoint failed after error: {}", save_error);
                }
                Err(e)
            }
        }
    }

    fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            seed: self.state.seed.clone(),
            method: self.config.method,
            stop_reason,
            iteration: self.state.iteration,
            approved: self.approved.len(),
            rejected: self.rejected.len(),
            junk: self.state.junk.len(),
            frontier: self.state.frontier.len(),
            threshold: self.state.threshold,
            scored: self.scored,
        }
    }

    fn checkpoint(&mut self, store: &dyn Checkpointer) -> Result<(), EngineError> {
        self.state.touch();
        store.save(&self.approved, &self.rejected, &self.state)?;
        Ok(())
    }

    fn drive(
        &mut self,
        source: &mut dyn CandidateSource,
        store: &dyn Checkpointer,
    ) -> Result<StopReason, EngineError> {
        if self.state.iteration >= self.config.iteration_limit {
            return Ok(StopReason::IterationLimit);
        }
        if !self.state.bootstrapped {
            if let Some(stop) = self.bootstrap(source)? {
                return Ok(stop);
            }
            self.checkpoint(store)?;
        }

        let lexical = self.config.method.is_lexical();
        loop {
            if self.state.iteration >= self.config.iteration_limit {
                return Ok(StopReason::IterationLimit);
            }
            if self.cap_reached() {
                return Ok(StopReason::FrontierCap);
            }
            if lexical && self.state.frontier.is_empty() {
                return Ok(StopReason::FrontierExhausted);
            }

            info!(
                "Iteration {} with {} candidates",
                self.state.iteration,
                self.state.frontier.current_len()
            );

            while let Some(candidate) = self.state.frontier.pop() {
                let step = self.process(candidate, source)?;
                self.checkpoint(store)?;
                info!(
                    "Frontier: {} | approved: {} | rejected: {}",
                    self.state.frontier.len(),
                    self.approved.len(),
                    self.rejected.len()
                );
                if let Step::Stop(reason) = step {
                    return Ok(reason);
                }
                if self.cap_reached() {
                    return Ok(StopReason::FrontierCap);
                }
            }

            if !lexical && self.state.threshold.is_none() {
                self.finalize_threshold();
            }
            self.state.frontier.advance();
            self.state.iteration += 1;
            self.checkpoint(store)?;
        }
    }

    /// True once the frontier outgrows the cap. A content run stopped this
    /// way during iteration 0 settles its buffered scores first.
    fn cap_reached(&mut self) -> bool {
        if self.state.frontier.len() <= self.config.frontier_cap {
            return false;
        }
        if !self.config.method.is_lexical() && self.state.threshold.is_none() {
            self.finalize_threshold();
        }
        true
    }

    /// Builds the initial frontier. Returns a stop reason when the seed fetch
    /// ran out of credentials.
    fn bootstrap(&mut self, source: &mut dyn CandidateSource) -> Result<Option<StopReason>, EngineError> {
        let seed = self.state.seed.clone();

        if self.config.method.is_lexical() {
            self.state.frontier = Frontier::with_current([Candidate::seed(seed)]);
            self.state.threshold = Some(self.config.threshold);
            self.state.bootstrapped = true;
            return Ok(None);
        }

        let response = loop {
            let response = source.fetch_related(&seed)?;
            match &response.status {
                FetchStatus::Ok => break response,
                FetchStatus::Throttled => {
                    warn!("Throttled while fetching seed {:?}", seed);
                    if !source.rotate_credentials() {
                        return Ok(Some(StopReason::ResourceExhausted));
                    }
                }
                FetchStatus::ParseError(reason) | FetchStatus::Unavailable(reason) => {
                    return Err(EngineError::SeedUnavailable {
                        query: seed,
                        reason: reason.clone(),
                    });
                }
            }
        };

        if response.snippets.is_empty() {
            return Err(EngineError::EmptyReference(seed));
        }
        info!(
            "Seed {:?}: {} reference snippets, {} related queries",
            seed,
            response.snippets.len(),
            response.related_queries.len()
        );

        let related = normalize_all(response.related_queries);
        self.state.reference_snippets = response.snippets;
        self.state.frontier = Frontier::with_current(
            related
                .into_iter()
                .map(|q| Candidate::new(q, Some(seed.clone()), 0)),
        );
        self.state.bootstrapped = true;
        Ok(None)
    }

    fn is_settled(&self, query: &str) -> bool {
        if self.approved.contains(query) || self.rejected.contains(query) {
            return true;
        }
        if self.config.method.is_lexical() {
            self.state.junk.contains(query)
        } else {
            self.state.is_pending(query)
        }
    }

    fn process(&mut self, candidate: Candidate, source: &mut dyn CandidateSource) -> Result<Step, EngineError> {
        if self.is_settled(&candidate.query) {
            debug!("Skipping already settled {:?}", candidate.query);
            return Ok(Step::Continue);
        }

        let response = match source.fetch_related(&candidate.query) {
            Ok(response) => response,
            Err(e) => {
                self.state.frontier.requeue_front(candidate);
                return Err(e.into());
            }
        };
        match &response.status {
            FetchStatus::Ok => {}
            FetchStatus::Throttled => {
                warn!("Throttled on {:?}", candidate.query);
                let rotated = source.rotate_credentials();
                self.state.frontier.requeue_front(candidate);
                return Ok(if rotated {
                    Step::Continue
                } else {
                    Step::Stop(StopReason::ResourceExhausted)
                });
            }
            FetchStatus::ParseError(reason) => {
                warn!("Dropping {:?}: {}", candidate.query, reason);
                self.retries = 0;
                return Ok(Step::Continue);
            }
            FetchStatus::Unavailable(reason) => {
                if !self.config.method.is_lexical() {
                    warn!("Skipping {:?}: {}", candidate.query, reason);
                    return Ok(Step::Continue);
                }
                self.retries += 1;
                warn!(
                    "Retrieval failed for {:?} (attempt {}): {}",
                    candidate.query, self.retries, reason
                );
                self.state.frontier.requeue_front(candidate);
                return Ok(if self.retries > self.config.max_retries {
                    Step::Stop(StopReason::RetriesExhausted)
                } else {
                    Step::Continue
                });
            }
        }

        self.retries = 0;
        self.scored += 1;
        let related = normalize_all(response.related_queries);
        match self.config.method.lexical_mode() {
            Some(mode) => self.classify_lexical(candidate, related, mode),
            None => self.classify_content(candidate, related, &response.snippets),
        }
        Ok(Step::Continue)
    }

    fn classify_lexical(&mut self, candidate: Candidate, related: Vec<String>, mode: LexicalMode) {
        let score = lexical_overlap(&related, &self.index, mode);
        let iteration = self.state.iteration;

        if score >= self.config.threshold {
            debug!("Accepted {:?} with overlap {:.3}", candidate.query, score);
            self.index.insert(&candidate.query);
            self.approved
                .record(candidate.query.clone(), candidate.parent, score);
            let picked = select_subset(
                related,
                self.config.selection_factor,
                self.config.selection,
                &mut self.rng,
            );
            for query in picked {
                self.state.frontier.push_next(Candidate::new(
                    query,
                    Some(candidate.query.clone()),
                    iteration,
                ));
            }
        } else {
            debug!("Rejected {:?} with overlap {:.3}", candidate.query, score);
            self.rejected.record(candidate.query, candidate.parent, score);
            if score == 0.0 {
                for query in related {
                    if !self.approved.contains(&query) && !self.rejected.contains(&query) {
                        self.state.junk.insert(query);
                    }
                }
            }
        }
    }

    fn classify_content(&mut self, candidate: Candidate, related: Vec<String>, snippets: &[String]) {
        let iteration = self.state.iteration;
        for query in related {
            self.state.frontier.push_next(Candidate::new(
                query,
                Some(candidate.query.clone()),
                iteration,
            ));
        }

        let score = if snippets.is_empty() {
            None
        } else {
            self.kernel
                .similarity(&self.state.reference_snippets, snippets)
        };
        let Some(score) = score else {
            debug!("Rejected {:?}: nothing to score", candidate.query);
            self.rejected.record(candidate.query, candidate.parent, 0.0);
            return;
        };

        match self.state.threshold {
            None => {
                debug!("Buffered {:?} with score {:.3}", candidate.query, score);
                self.state
                    .pending
                    .insert(candidate.query.clone(), PendingScore { candidate, score });
            }
            Some(threshold) if score >= threshold => {
                debug!("Accepted {:?} with score {:.3}", candidate.query, score);
                self.approved.record(candidate.query, candidate.parent, score);
            }
            Some(_) => {
                debug!("Rejected {:?} with score {:.3}", candidate.query, score);
                self.rejected.record(candidate.query, candidate.parent, score);
            }
        }
    }

    /// Fixes the content threshold from the buffered first-hop scores and
    /// settles every buffered candidate against it.
    fn finalize_threshold(&mut self) {
        let scores: Vec<f64> = self.state.pending.values().map(|p| p.score).collect();
        let threshold = match self.config.method {
            OverlapMethod::ContentKernelStatistical => threshold::outlier_fence(&scores),
            _ => threshold::minimum(&scores),
        }
        .unwrap_or(1.0);

        info!(
            "Threshold fixed at {:.4} from {} first-hop scores",
            threshold,
            scores.len()
        );
        self.state.threshold = Some(threshold);

        for pending in std::mem::take(&mut self.state.pending).into_values() {
            let PendingScore { candidate, score } = pending;
            if score >= threshold {
                self.approved.record(candidate.query, candidate.parent, score);
            } else {
                self.rejected.record(candidate.query, candidate.parent, score);
            }
        }
    }
}
