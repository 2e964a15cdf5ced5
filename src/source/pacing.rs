use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{CandidateSource, FetchResponse};
use crate::errors::SourceError;

type Sleeper = Box<dyn FnMut(Duration) + Send>;

/// Wraps a source so it never sees more than `requests_per_hour` fetches.
///
/// Requests are spaced by `3600 / requests_per_hour` seconds plus a random
/// jitter of up to `jitter` on top.
pub struct Paced<S> {
    inner: S,
    interval: Duration,
    jitter: Duration,
    last_request: Option<Instant>,
    sleeper: Sleeper,
}

impl<S: CandidateSource> Paced<S> {
    pub fn new(inner: S, requests_per_hour: u32, jitter: Duration) -> Self {
        Self::with_sleeper(inner, requests_per_hour, jitter, Box::new(std::thread::sleep))
    }

    /// Same as [`Paced::new`] with a custom sleep function.
    pub fn with_sleeper(inner: S, requests_per_hour: u32, jitter: Duration, sleeper: Sleeper) -> Self {
        Self {
            inner,
            interval: interval_for(requests_per_hour),
            jitter,
            last_request: None,
            sleeper,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn wait_turn(&mut self) {
        let Some(last) = self.last_request else {
            return;
        };
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            let millis = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            Duration::from_millis(millis)
        };
        let target = self.interval + jitter;
        let elapsed = last.elapsed();
        if elapsed < target {
            let pause = target - elapsed;
            debug!("Pacing requests: sleeping {:.2?}", pause);
            (self.sleeper)(pause);
        }
    }
}

/// Minimum spacing between requests for an hourly budget. Zero disables
/// pacing.
pub fn interval_for(requests_per_hour: u32) -> Duration {
    if requests_per_hour == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(3600.0 / requests_per_hour as f64)
    }
}

impl<S: CandidateSource> CandidateSource for Paced<S> {
    fn fetch_related(&mut self, query: &str) -> Result<FetchResponse, SourceError> {
        self.wait_turn();
        self.last_request = Some(Instant::now());
        self.inner.fetch_related(query)
    }

    fn rotate_credentials(&mut self) -> bool {
        self.inner.rotate_credentials()
    }
}
