//! RetrievalEngine - classify, search, group, align, assemble
//!
//! One `retrieve` call walks a fixed sequence of stages. The engine holds only
//! shared read-only collaborators (store, embedder behind a mutex, config), so
//! any number of queries can run concurrently from different threads.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::align::align;
use super::assemble::{self, RetrievalResult, SearchStatus};
use super::error::{ErrorKind, RetrievalError, Stage};
use super::grouping::{group, TimeWindow};
use super::intent::{classify, Classification, QueryType};
use super::search::{search, search_both, SearchParams};
use crate::cancel::CancelToken;
use crate::config::RetrievalSection;
use crate::embeddings::EmbeddingEngine;
use crate::storage::{Modality, ObservationStore, ScoredCandidate};

/// A question about one video
#[derive(Debug, Clone)]
pub struct Query {
    pub video_id: String,
    pub text: String,
    /// Skip classification and force a query type
    pub query_type: Option<QueryType>,
}

impl Query {
    pub fn new(video_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            text: text.into(),
            query_type: None,
        }
    }

    pub fn with_type(mut self, query_type: QueryType) -> Self {
        self.query_type = Some(query_type);
        self
    }
}

/// Stage bookkeeping for one query
struct Progress<'a> {
    stage: Stage,
    video_id: &'a str,
    cancel: &'a CancelToken,
}

impl<'a> Progress<'a> {
    fn new(video_id: &'a str, cancel: &'a CancelToken) -> Self {
        Self {
            stage: Stage::Received,
            video_id,
            cancel,
        }
    }

    fn enter(&mut self, next: Stage) -> Result<(), RetrievalError> {
        debug_assert!(next > self.stage, "stage moved from {} back to {}", self.stage, next);
        self.check_cancel()?;
        self.stage = next;
        debug!(stage = %next, "stage");
        Ok(())
    }

    fn check_cancel(&self) -> Result<(), RetrievalError> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(ErrorKind::Cancelled, "query cancelled"));
        }
        Ok(())
    }

    fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> RetrievalError {
        RetrievalError::new(kind, self.stage, self.video_id, message)
    }
}

/// Query engine over one observation store
pub struct RetrievalEngine {
    store: Arc<dyn ObservationStore>,
    embedder: Mutex<Box<dyn EmbeddingEngine>>,
    config: RetrievalSection,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn ObservationStore>,
        embedder: Box<dyn EmbeddingEngine>,
        config: RetrievalSection,
    ) -> Self {
        Self {
            store,
            embedder: Mutex::new(embedder),
            config,
        }
    }

    pub fn config(&self) -> &RetrievalSection {
        &self.config
    }

    /// Answer a question about a video
    pub fn retrieve(&self, video_id: &str, text: &str) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve_with_cancel(&Query::new(video_id, text), &CancelToken::new())
    }

    /// Answer a question, stopping early once `cancel` is triggered
    pub fn retrieve_with_cancel(
        &self,
        query: &Query,
        cancel: &CancelToken,
    ) -> Result<RetrievalResult, RetrievalError> {
        let span = tracing::info_span!("retrieve", query_id = %query_id(), video_id = %query.video_id);
        let _guard = span.enter();

        let result = self.run(query, cancel);
        match &result {
            Ok(found) => info!(results = found.len(), "query completed"),
            Err(err) if err.kind == ErrorKind::NotFound => info!(error = %err, "query found nothing"),
            Err(err) => warn!(kind = %err.kind, stage = %err.stage, error = %err, "query failed"),
        }
        result
    }

    fn run(&self, query: &Query, cancel: &CancelToken) -> Result<RetrievalResult, RetrievalError> {
        let video_id = query.video_id.as_str();
        let mut progress = Progress::new(video_id, cancel);

        if video_id.trim().is_empty() {
            return Err(progress.fail(ErrorKind::InvalidInput, "video id is empty"));
        }
        let classification = classify(&query.text, self.config.max_query_chars).map_err(|mut err| {
            err.video_id = video_id.to_string();
            err
        })?;
        let query_type = query.query_type.unwrap_or(classification.query_type);

        progress.enter(Stage::Classified)?;
        log_classification(&classification, query_type);

        match query_type {
            QueryType::Summary => self.run_summary(&mut progress),
            QueryType::Visual => self.run_single(&mut progress, &query.text, Modality::Visual),
            QueryType::Audio => self.run_single(&mut progress, &query.text, Modality::Audio),
            QueryType::Both => self.run_both(&mut progress, &query.text),
        }
    }

    fn run_summary(&self, progress: &mut Progress<'_>) -> Result<RetrievalResult, RetrievalError> {
        progress.enter(Stage::Searched)?;
        let stored = self.with_retry(progress, || {
            self.store
                .get_summary(progress.video_id, self.config.store_timeout(), progress.cancel)
                .map_err(|e| RetrievalError::from_store(e, Stage::Searched, progress.video_id))
        })?;

        progress.enter(Stage::Assembled)?;
        let result = assemble::summary(progress.video_id, stored)?;
        progress.enter(Stage::Completed)?;
        Ok(result)
    }

    fn run_single(
        &self,
        progress: &mut Progress<'_>,
        text: &str,
        modality: Modality,
    ) -> Result<RetrievalResult, RetrievalError> {
        progress.enter(Stage::Searched)?;
        let embedding = self.embed_query(progress, text)?;
        let params = SearchParams::from_config(&self.config);

        let searched = self.with_retry(progress, || {
            search(
                self.store.as_ref(),
                progress.video_id,
                modality,
                &embedding,
                &params,
                progress.cancel,
            )
        });
        let (candidates, status) = match searched {
            Ok(candidates) => (candidates, SearchStatus::Found),
            Err(err) if err.kind == ErrorKind::NotFound => (Vec::new(), SearchStatus::NotFound),
            Err(err) => return Err(err),
        };

        progress.enter(Stage::Grouped)?;
        let windows = group(candidates, self.config.gap_threshold_secs);

        progress.enter(Stage::Assembled)?;
        let set = assemble::window_set(windows, status, self.config.max_results);
        let result = match modality {
            Modality::Visual => RetrievalResult::Visual(set),
            Modality::Audio => RetrievalResult::Audio(set),
        };
        progress.enter(Stage::Completed)?;
        Ok(result)
    }

    fn run_both(&self, progress: &mut Progress<'_>, text: &str) -> Result<RetrievalResult, RetrievalError> {
        progress.enter(Stage::Searched)?;
        let embedding = self.embed_query(progress, text)?;
        let params = SearchParams::from_config(&self.config);

        let (visual, audio) = search_both(
            self.store.as_ref(),
            progress.video_id,
            &embedding,
            &params,
            progress.cancel,
        );
        progress.check_cancel()?;

        if let (Err(v), Err(a)) = (&visual, &audio) {
            if v.kind == ErrorKind::Unavailable && a.kind == ErrorKind::Unavailable {
                return Err(progress
                    .fail(ErrorKind::Unavailable, format!("both searches failed: {}; {}", v, a)));
            }
        }

        let mut notes = Vec::new();
        let (visual, visual_status) = side_outcome(Modality::Visual, visual, &mut notes)?;
        let (audio, audio_status) = side_outcome(Modality::Audio, audio, &mut notes)?;

        progress.enter(Stage::Grouped)?;
        let gap = self.config.gap_threshold_secs;
        let (visual_windows, audio_windows): (Vec<TimeWindow>, Vec<TimeWindow>) =
            (group(visual, gap), group(audio, gap));

        progress.enter(Stage::Aligned)?;
        let pairs = align(visual_windows, audio_windows, self.config.adjacency_margin());
        debug!(pairs = pairs.iter().filter(|p| p.is_paired()).count(), total = pairs.len(), "aligned");

        progress.enter(Stage::Assembled)?;
        let set = assemble::pair_set(pairs, visual_status, audio_status, notes, self.config.max_results);
        progress.enter(Stage::Completed)?;
        Ok(RetrievalResult::Both(set))
    }

    fn embed_query(&self, progress: &Progress<'_>, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let embedding = self
            .embedder
            .lock()
            .embed_query(text)
            .map_err(|e| progress.fail(ErrorKind::Internal, "embedding provider failed").with_source(e))?;
        progress.check_cancel()?;
        Ok(embedding)
    }

    /// Run a store-backed step, retrying once after the backoff when the
    /// store was unavailable
    fn with_retry<T>(
        &self,
        progress: &Progress<'_>,
        mut step: impl FnMut() -> Result<T, RetrievalError>,
    ) -> Result<T, RetrievalError> {
        match step() {
            Err(err) if err.is_retryable() => {
                warn!(error = %err, backoff_ms = self.config.retry_backoff_ms, "store unavailable, retrying once");
                thread::sleep(self.config.retry_backoff());
                progress.check_cancel()?;
                step()
            }
            outcome => outcome,
        }
    }
}

/// Split one side of a two-modality search into candidates and status.
/// Cancellation and internal errors abort the whole query.
fn side_outcome(
    modality: Modality,
    outcome: Result<Vec<ScoredCandidate>, RetrievalError>,
    notes: &mut Vec<String>,
) -> Result<(Vec<ScoredCandidate>, SearchStatus), RetrievalError> {
    match outcome {
        Ok(candidates) => Ok((candidates, SearchStatus::Found)),
        Err(err) => match err.kind {
            ErrorKind::NotFound => Ok((Vec::new(), SearchStatus::NotFound)),
            ErrorKind::Unavailable => {
                warn!(%modality, error = %err, "search degraded");
                notes.push(format!("{}: {}", modality, err.message));
                Ok((Vec::new(), SearchStatus::Degraded))
            }
            ErrorKind::InvalidInput | ErrorKind::Cancelled | ErrorKind::Internal => Err(err),
        },
    }
}

fn log_classification(classification: &Classification, query_type: QueryType) {
    if query_type != classification.query_type {
        debug!(
            classified = %classification.query_type,
            forced = %query_type,
            "query type overridden"
        );
    }
    info!(
        query_type = %query_type,
        confidence = classification.confidence,
        "classified"
    );
}

/// Short id tying together the log lines of one query
fn query_id() -> String {
    format!("{}-{:04x}", Utc::now().format("%H%M%S%3f"), fastrand::u16(..))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryObservationStore, Observation, ObservationSink};
    use anyhow::{anyhow, Result};

    /// Every text maps to the same direction
    struct ConstantEmbedder(Vec<f32>);

    impl EmbeddingEngine for ConstantEmbedder {
        fn embed(&mut self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
        fn dimension(&self) -> usize {
            self.0.len()
        }
        fn model_name(&self) -> &str {
            "constant"
        }
    }

    struct BrokenEmbedder;

    impl EmbeddingEngine for BrokenEmbedder {
        fn embed(&mut self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow!("model not loaded"))
        }
        fn dimension(&self) -> usize {
            2
        }
        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn engine_with(store: InMemoryObservationStore, embedder: Box<dyn EmbeddingEngine>) -> RetrievalEngine {
        RetrievalEngine::new(Arc::new(store), embedder, RetrievalSection::default())
    }

    fn populated() -> InMemoryObservationStore {
        InMemoryObservationStore::with_observations(
            2,
            vec![
                Observation::visual("v1", 0.0, "a man in a black shirt", vec![1.0, 0.0]),
                Observation::audio("v1", 0.5, 3.0, "discussing a problem", vec![1.0, 0.2]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_video_id_rejected() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        let err = engine.retrieve("  ", "What is he wearing?").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.stage, Stage::Received);
    }

    #[test]
    fn test_invalid_query_carries_video_id() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        let err = engine.retrieve("v1", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.video_id, "v1");
    }

    #[test]
    fn test_visual_query() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        match engine.retrieve("v1", "What is he wearing?").unwrap() {
            RetrievalResult::Visual(set) => {
                assert_eq!(set.status, SearchStatus::Found);
                assert_eq!(set.windows.len(), 1);
                assert_eq!(set.windows[0].text, "a man in a black shirt");
            }
            other => panic!("expected visual result, got {:?}", other),
        }
    }

    #[test]
    fn test_forced_type() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        let query = Query::new("v1", "What is he wearing?").with_type(QueryType::Audio);
        let result = engine.retrieve_with_cancel(&query, &CancelToken::new()).unwrap();
        assert!(matches!(result, RetrievalResult::Audio(_)));
    }

    #[test]
    fn test_summary_not_found() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        let err = engine.retrieve("v1", "Summarize this video").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.stage, Stage::Assembled);
    }

    #[test]
    fn test_summary_found() {
        let store = populated();
        store.put_summary("v1", "Two people debug a problem.").unwrap();
        let engine = engine_with(store, Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        let result = engine.retrieve("v1", "Give me an overview").unwrap();
        assert_eq!(
            result,
            RetrievalResult::Summary {
                text: "Two people debug a problem.".to_string()
            }
        );
    }

    #[test]
    fn test_embedding_failure_is_internal() {
        let engine = engine_with(populated(), Box::new(BrokenEmbedder));
        let err = engine.retrieve("v1", "What did they say?").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.stage, Stage::Searched);
    }

    #[test]
    fn test_dimension_mismatch_is_internal() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0, 0.0])));
        let err = engine.retrieve("v1", "tell me more").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_cancelled_before_search() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = engine
            .retrieve_with_cancel(&Query::new("v1", "What did they say?"), &cancel)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unknown_video_is_empty_both() {
        let engine = engine_with(populated(), Box::new(ConstantEmbedder(vec![1.0, 0.0])));
        match engine.retrieve("missing", "tell me more").unwrap() {
            RetrievalResult::Both(set) => {
                assert!(set.pairs.is_empty());
                assert_eq!(set.visual_status, SearchStatus::NotFound);
                assert_eq!(set.audio_status, SearchStatus::NotFound);
            }
            other => panic!("expected both result, got {:?}", other),
        }
    }

    #[test]
    fn test_query_id_shape() {
        let id = query_id();
        assert_eq!(id.len(), "HHMMSSmmm-xxxx".len());
    }
}
