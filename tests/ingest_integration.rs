//! Integration tests: manifest ingestion into the SQLite + USearch store,
//! then retrieval against it

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use vidrecall::config::{IngestSection, RetrievalSection, StoreSection};
use vidrecall::embeddings::EmbeddingEngine;
use vidrecall::ingest::{Ingestor, VideoManifest};
use vidrecall::retrieval::{RetrievalEngine, RetrievalResult, SearchStatus};
use vidrecall::storage::{Modality, ObservationSink, SqliteObservationStore};

/// Maps known phrases onto fixed directions in 4-d space
struct KeywordEmbedder;

impl EmbeddingEngine for KeywordEmbedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        let v = if text.contains("wearing") || text.contains("shirt") {
            [1.0, 0.0, 0.0, 0.0]
        } else if text.contains("glasses") {
            [0.8, 0.0, 0.6, 0.0]
        } else if text.contains("happened") {
            [0.6, 0.8, 0.0, 0.0]
        } else if text.contains("say") || text.contains("problem") {
            [0.0, 1.0, 0.0, 0.0]
        } else {
            [0.0, 0.0, 0.0, 1.0]
        };
        Ok(v.to_vec())
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

const MANIFEST: &str = r#"{
    "video_id": "lecture-01",
    "frames": [
        {"timestamp": 0.0, "caption": "a man in a black shirt"},
        {"timestamp": 1.0, "caption": "a man with glasses"}
    ],
    "words": [
        {"text": "discussing", "start": 0.5, "end": 1.1},
        {"text": "a", "start": 1.2, "end": 1.3},
        {"text": "problem", "start": 1.4, "end": 3.0}
    ],
    "summary": "A man in a black shirt discusses a problem."
}"#;

fn section(temp: &TempDir) -> StoreSection {
    StoreSection {
        path: temp.path().to_string_lossy().into_owned(),
        dimensions: 4,
        pool_size: 2,
    }
}

fn ingest_lecture(store: &SqliteObservationStore) -> Result<()> {
    let manifest: VideoManifest = serde_json::from_str(MANIFEST)?;
    let mut embedder = KeywordEmbedder;
    let report = Ingestor::new(store, &mut embedder, &IngestSection::default()).ingest(&manifest)?;

    assert_eq!(report.visual, 2);
    assert_eq!(report.audio, 1);
    assert!(report.summary);
    Ok(())
}

fn engine(store: SqliteObservationStore) -> RetrievalEngine {
    RetrievalEngine::new(Arc::new(store), Box::new(KeywordEmbedder), RetrievalSection::default())
}

#[test]
fn test_ingest_then_ask() -> Result<()> {
    let temp = TempDir::new()?;
    let store = SqliteObservationStore::open(&section(&temp))?;
    ingest_lecture(&store)?;
    assert_eq!(store.count("lecture-01", Modality::Visual)?, 2);

    let engine = engine(store);

    let RetrievalResult::Visual(set) = engine.retrieve("lecture-01", "What is he wearing?")? else {
        panic!("expected a visual result");
    };
    assert_eq!(set.windows.len(), 1);
    assert_eq!(set.windows[0].text, "a man in a black shirt");
    assert_eq!((set.windows[0].start, set.windows[0].end), (0.0, 1.0));

    let RetrievalResult::Audio(set) = engine.retrieve("lecture-01", "What did they say?")? else {
        panic!("expected an audio result");
    };
    assert_eq!(set.windows[0].text, "discussing a problem");
    assert_eq!((set.windows[0].start, set.windows[0].end), (0.5, 3.0));

    let RetrievalResult::Both(set) =
        engine.retrieve("lecture-01", "What happened while they were talking?")?
    else {
        panic!("expected a both result");
    };
    assert_eq!(set.pairs.len(), 1);
    assert_eq!(set.pairs[0].modalities, vec![Modality::Visual, Modality::Audio]);

    let summary = engine.retrieve("lecture-01", "Summarize this video")?;
    assert_eq!(
        summary,
        RetrievalResult::Summary {
            text: "A man in a black shirt discusses a problem.".to_string()
        }
    );
    Ok(())
}

#[test]
fn test_index_survives_reopen() -> Result<()> {
    let temp = TempDir::new()?;
    {
        let store = SqliteObservationStore::open(&section(&temp))?;
        ingest_lecture(&store)?;
        store.save_index()?;
    }

    let store = SqliteObservationStore::open(&section(&temp))?;
    assert_eq!(store.count_all()?, 3);

    let RetrievalResult::Visual(set) = engine(store).retrieve("lecture-01", "What is he wearing?")? else {
        panic!("expected a visual result");
    };
    assert_eq!(set.status, SearchStatus::Found);
    assert_eq!(set.windows[0].text, "a man in a black shirt");
    Ok(())
}

#[test]
fn test_unsaved_index_is_rebuilt() -> Result<()> {
    let temp = TempDir::new()?;
    {
        let store = SqliteObservationStore::open(&section(&temp))?;
        ingest_lecture(&store)?;
        // dropped without save_index
    }

    let store = SqliteObservationStore::open(&section(&temp))?;
    let RetrievalResult::Audio(set) = engine(store).retrieve("lecture-01", "What did they say?")? else {
        panic!("expected an audio result");
    };
    assert_eq!(set.windows.len(), 1);
    Ok(())
}

#[test]
fn test_other_video_finds_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let store = SqliteObservationStore::open(&section(&temp))?;
    ingest_lecture(&store)?;

    let RetrievalResult::Visual(set) = engine(store).retrieve("lecture-02", "What is he wearing?")? else {
        panic!("expected a visual result");
    };
    assert!(set.windows.is_empty());
    assert_eq!(set.status, SearchStatus::NotFound);
    Ok(())
}
