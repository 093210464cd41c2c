//! In-memory observation store with exact cosine scan
//!
//! Holds everything behind a `RwLock`; searches score every observation of
//! the requested video and modality. Used by tests and small demos where an
//! ANN index would be overkill.

use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use super::{
    CallBudget, Modality, Observation, ObservationSink, ObservationStore, ScoredCandidate,
    StoreError,
};
use crate::cancel::CancelToken;
use crate::embeddings::cosine_similarity;

#[derive(Debug, Default)]
struct Contents {
    observations: Vec<Observation>,
    summaries: HashMap<String, String>,
}

#[derive(Debug)]
pub struct InMemoryObservationStore {
    dimension: usize,
    contents: RwLock<Contents>,
}

impl InMemoryObservationStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            contents: RwLock::new(Contents::default()),
        }
    }

    /// Build a store from observations, failing on the first invalid one
    pub fn with_observations(
        dimension: usize,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Result<Self> {
        let store = Self::new(dimension);
        let observations: Vec<Observation> = observations.into_iter().collect();
        store.insert_all(&observations)?;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.contents.read().observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObservationStore for InMemoryObservationStore {
    fn search(
        &self,
        video_id: &str,
        modality: Modality,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let budget = CallBudget::new(timeout, cancel);
        budget.checkpoint()?;

        if query_embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }

        let contents = self.contents.read();
        let mut hits: Vec<ScoredCandidate> = contents
            .observations
            .iter()
            .filter(|o| o.video_id == video_id && o.modality == modality)
            .map(|o| {
                let score = cosine_similarity(query_embedding, &o.embedding);
                ScoredCandidate::from_observation(o, score)
            })
            .filter(|c| c.score >= min_score)
            .collect();

        budget.checkpoint()?;

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn get_summary(
        &self,
        video_id: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<String>, StoreError> {
        CallBudget::new(timeout, cancel).checkpoint()?;
        Ok(self.contents.read().summaries.get(video_id).cloned())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl ObservationSink for InMemoryObservationStore {
    fn insert_all(&self, observations: &[Observation]) -> Result<()> {
        for observation in observations {
            if let Err(reason) = observation.validate(self.dimension) {
                bail!("Rejected observation {}: {}", observation.id, reason);
            }
        }

        let mut contents = self.contents.write();
        let mut seen: HashSet<Uuid> = contents.observations.iter().map(|o| o.id).collect();
        for observation in observations {
            if !seen.insert(observation.id) {
                bail!("Observation {} already exists", observation.id);
            }
        }
        contents.observations.extend(observations.iter().cloned());
        Ok(())
    }

    fn put_summary(&self, video_id: &str, summary: &str) -> Result<()> {
        self.contents
            .write()
            .summaries
            .insert(video_id.to_string(), summary.to_string());
        Ok(())
    }

    fn count(&self, video_id: &str, modality: Modality) -> Result<usize> {
        Ok(self
            .contents
            .read()
            .observations
            .iter()
            .filter(|o| o.video_id == video_id && o.modality == modality)
            .count())
    }
}
