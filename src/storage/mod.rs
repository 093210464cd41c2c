//! Observation storage - the read and write sides of the observation store
//!
//! Retrieval only ever reads through [`ObservationStore`]; ingestion writes
//! through [`ObservationSink`]. Two implementations ship with the crate:
//! - `SqliteObservationStore`: SQLite for observations and summaries (source of
//!   truth), USearch for vector similarity search (ANN via HNSW)
//! - `InMemoryObservationStore`: exact cosine scan, for tests and demos
//!
//! # Example
//!
//! ```no_run
//! use vidrecall::config::StoreSection;
//! use vidrecall::storage::{Observation, ObservationSink, SqliteObservationStore};
//!
//! let store = SqliteObservationStore::open(&StoreSection::default())?;
//! store.insert(&Observation::visual("v1", 0.0, "a man in a black shirt", vec![0.1; 384]))?;
//! store.save_index()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod memory;
mod pool;
mod sqlite;
pub mod types;

pub use memory::InMemoryObservationStore;
pub use sqlite::SqliteObservationStore;
pub use types::{Modality, Observation, ScoredCandidate};

use anyhow::Result;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::cancel::CancelToken;

/// Failure of a single store call
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("observation store unavailable: {0}")]
    Unavailable(String),
    #[error("store call exceeded timeout of {0:?}")]
    Timeout(Duration),
    #[error("store call cancelled")]
    Cancelled,
    #[error("query embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Read side of the observation store, shared by concurrent queries
pub trait ObservationStore: Send + Sync {
    /// Nearest neighbours of `query_embedding` among one video's observations
    /// of one modality.
    ///
    /// Returns at most `top_k` candidates with `score >= min_score`. Order is
    /// not guaranteed; the searcher imposes the final ranking.
    #[allow(clippy::too_many_arguments)]
    fn search(
        &self,
        video_id: &str,
        modality: Modality,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<ScoredCandidate>, StoreError>;

    /// Pre-generated summary for a video, if one was stored
    fn get_summary(
        &self,
        video_id: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<String>, StoreError>;

    /// Embedding dimension shared by every stored observation
    fn dimension(&self) -> usize;
}

/// Write side of the observation store, used by ingestion
pub trait ObservationSink {
    /// Insert an observation. Observations are immutable; duplicate ids fail.
    fn insert(&self, observation: &Observation) -> Result<()> {
        self.insert_all(std::slice::from_ref(observation))
    }

    /// Insert a batch of observations, all or none. Every observation is
    /// validated before the first one is written.
    fn insert_all(&self, observations: &[Observation]) -> Result<()>;

    /// Store (or replace) the summary of a video
    fn put_summary(&self, video_id: &str, summary: &str) -> Result<()>;

    /// Number of observations stored for a video and modality
    fn count(&self, video_id: &str, modality: Modality) -> Result<usize>;
}

/// Deadline and cancellation checks for one store call
#[derive(Debug)]
pub(crate) struct CallBudget<'a> {
    started: Instant,
    timeout: Duration,
    cancel: &'a CancelToken,
}

impl<'a> CallBudget<'a> {
    pub(crate) fn new(timeout: Duration, cancel: &'a CancelToken) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            cancel,
        }
    }

    /// Fail if the call was cancelled or ran past its deadline
    pub(crate) fn checkpoint(&self) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.started.elapsed() > self.timeout {
            return Err(StoreError::Timeout(self.timeout));
        }
        Ok(())
    }

    /// Time left before the deadline (zero once expired)
    pub(crate) fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }
}
