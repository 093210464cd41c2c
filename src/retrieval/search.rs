//! Similarity search over one video's observations
//!
//! Wraps [`ObservationStore::search`] with the ranking rules retrieval relies
//! on: drop non-finite scores, enforce the score floor, order by score (ties
//! by timestamp, then observation id) and cap at `top_k`. Two-modality
//! queries fan out with `rayon::join` and get both outcomes back.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use super::error::{ErrorKind, RetrievalError, Stage};
use crate::cancel::CancelToken;
use crate::config::RetrievalSection;
use crate::storage::{Modality, ObservationStore, ScoredCandidate};

/// Per-search knobs, taken from `[retrieval]`
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub top_k: usize,
    pub min_score: f32,
    pub score_gap: Option<f32>,
    pub timeout: Duration,
}

impl SearchParams {
    pub fn from_config(config: &RetrievalSection) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
            score_gap: config.score_gap,
            timeout: config.store_timeout(),
        }
    }
}

/// Search one modality of one video
///
/// Errors: `Internal` on an embedding/store dimension mismatch, `Unavailable`
/// when the store fails or answers after the deadline, `Cancelled`, and
/// `NotFound` when nothing clears `min_score`.
pub fn search(
    store: &dyn ObservationStore,
    video_id: &str,
    modality: Modality,
    query_embedding: &[f32],
    params: &SearchParams,
    cancel: &CancelToken,
) -> Result<Vec<ScoredCandidate>, RetrievalError> {
    if query_embedding.len() != store.dimension() {
        return Err(RetrievalError::new(
            ErrorKind::Internal,
            Stage::Searched,
            video_id,
            format!(
                "query embedding has {} dimensions, store expects {}",
                query_embedding.len(),
                store.dimension()
            ),
        ));
    }

    let started = Instant::now();
    let raw = store
        .search(
            video_id,
            modality,
            query_embedding,
            params.top_k,
            params.min_score,
            params.timeout,
            cancel,
        )
        .map_err(|e| RetrievalError::from_store(e, Stage::Searched, video_id))?;

    let elapsed = started.elapsed();
    if elapsed > params.timeout {
        return Err(RetrievalError::new(
            ErrorKind::Unavailable,
            Stage::Searched,
            video_id,
            format!(
                "{} search answered after {:?}, timeout is {:?}",
                modality, elapsed, params.timeout
            ),
        ));
    }

    let fetched = raw.len();
    let ranked = rank(raw, params.top_k, params.min_score, params.score_gap);
    tracing::debug!(
        video_id,
        %modality,
        fetched,
        kept = ranked.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "similarity search"
    );

    if ranked.is_empty() {
        return Err(RetrievalError::new(
            ErrorKind::NotFound,
            Stage::Searched,
            video_id,
            format!("no {} observation scored >= {}", modality, params.min_score),
        ));
    }
    Ok(ranked)
}

/// Search visual and audio concurrently; outcomes are independent
pub fn search_both(
    store: &dyn ObservationStore,
    video_id: &str,
    query_embedding: &[f32],
    params: &SearchParams,
    cancel: &CancelToken,
) -> (
    Result<Vec<ScoredCandidate>, RetrievalError>,
    Result<Vec<ScoredCandidate>, RetrievalError>,
) {
    rayon::join(
        || search(store, video_id, Modality::Visual, query_embedding, params, cancel),
        || search(store, video_id, Modality::Audio, query_embedding, params, cancel),
    )
}

/// Total order used for every ranked candidate list
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.timestamp.total_cmp(&b.timestamp))
        .then_with(|| a.observation_id.cmp(&b.observation_id))
}

/// Filter, order and cap raw store hits
pub fn rank(
    candidates: Vec<ScoredCandidate>,
    top_k: usize,
    min_score: f32,
    score_gap: Option<f32>,
) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| c.score.is_finite() && c.score >= min_score)
        .collect();
    ranked.sort_by(compare_candidates);
    ranked.truncate(top_k);

    if let Some(gap) = score_gap {
        if let Some(cut) = ranked
            .windows(2)
            .position(|pair| pair[0].score - pair[1].score > gap)
        {
            ranked.truncate(cut + 1);
        }
    }
    ranked
}
