//! Ingest module - turn extracted video data into stored observations
//!
//! Input is a JSON manifest produced by the extraction pipeline (frame
//! captions and a word-level transcript, optionally a summary). Captions
//! become visual observations, the transcript is segmented into speech
//! segments that become audio observations, and every text is embedded as a
//! passage before insertion.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use vidrecall::config::EngineConfig;
//! use vidrecall::embeddings::create_embedder;
//! use vidrecall::ingest::{Ingestor, VideoManifest};
//! use vidrecall::storage::SqliteObservationStore;
//!
//! let config = EngineConfig::default();
//! let store = SqliteObservationStore::open(&config.store)?;
//! let mut embedder = create_embedder(&config.embeddings, config.store.dimensions)?;
//!
//! let manifest = VideoManifest::load(Path::new("lecture-01.json"))?;
//! let report = Ingestor::new(&store, embedder.as_mut(), &config.ingest).ingest(&manifest)?;
//! store.save_index()?;
//! println!("{} visual, {} audio", report.visual, report.audio);
//! # Ok::<(), anyhow::Error>(())
//! ```

mod segments;

pub use segments::{segment_transcript, SegmentRules, SpeechSegment, Word};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::IngestSection;
use crate::embeddings::EmbeddingEngine;
use crate::storage::{Modality, Observation, ObservationSink};

/// Extraction output for one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoManifest {
    pub video_id: String,
    /// One caption per sampled frame
    #[serde(default)]
    pub frames: Vec<FrameCaption>,
    /// Word-level transcript, in spoken order
    #[serde(default)]
    pub words: Vec<Word>,
    /// Already segmented speech; used instead of `words` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SpeechSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameCaption {
    pub timestamp: f64,
    pub caption: String,
}

impl VideoManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: VideoManifest = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        if manifest.video_id.trim().is_empty() {
            bail!("Manifest {} has an empty video_id", path.display());
        }
        Ok(manifest)
    }

    /// Speech segments to store: explicit segments, or the segmented transcript
    pub fn speech_segments(&self, rules: SegmentRules) -> Vec<SpeechSegment> {
        match &self.segments {
            Some(segments) => segments
                .iter()
                .filter(|s| !s.text.trim().is_empty())
                .cloned()
                .collect(),
            None => segment_transcript(&self.words, rules),
        }
    }
}

/// What one ingestion stored
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub video_id: String,
    pub visual: usize,
    pub audio: usize,
    /// Frames without a usable caption
    pub skipped_frames: usize,
    pub summary: bool,
}

/// Embeds manifest texts and writes them to a sink
pub struct Ingestor<'a> {
    sink: &'a dyn ObservationSink,
    embedder: &'a mut dyn EmbeddingEngine,
    rules: SegmentRules,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        sink: &'a dyn ObservationSink,
        embedder: &'a mut dyn EmbeddingEngine,
        section: &IngestSection,
    ) -> Self {
        Self {
            sink,
            embedder,
            rules: SegmentRules::from(section),
        }
    }

    /// Store every observation of a manifest
    ///
    /// Refuses a video that already has observations; observations are
    /// immutable, so re-ingesting would duplicate them. Every text is embedded
    /// before anything is written and the observations go in as one batch, so
    /// a failed ingestion leaves nothing behind and can be retried.
    pub fn ingest(&mut self, manifest: &VideoManifest) -> Result<IngestReport> {
        let video_id = manifest.video_id.as_str();
        let existing = self.sink.count(video_id, Modality::Visual)?
            + self.sink.count(video_id, Modality::Audio)?;
        if existing > 0 {
            bail!(
                "Video {} already has {} observations; remove the store to re-ingest",
                video_id,
                existing
            );
        }

        let mut report = IngestReport {
            video_id: video_id.to_string(),
            ..Default::default()
        };
        let mut observations = Vec::new();

        for frame in &manifest.frames {
            let caption = frame.caption.trim();
            if caption.is_empty() || !frame.timestamp.is_finite() || frame.timestamp < 0.0 {
                report.skipped_frames += 1;
                continue;
            }
            let embedding = self
                .embedder
                .embed_passage(caption)
                .with_context(|| format!("Failed to embed caption at {}s", frame.timestamp))?;
            observations.push(Observation::visual(video_id, frame.timestamp, caption, embedding));
            report.visual += 1;
        }

        for segment in manifest.speech_segments(self.rules) {
            let embedding = self
                .embedder
                .embed_passage(&segment.text)
                .with_context(|| format!("Failed to embed speech at {}s", segment.start))?;
            observations.push(Observation::audio(
                video_id,
                segment.start,
                segment.end,
                segment.text,
                embedding,
            ));
            report.audio += 1;
        }

        self.sink
            .insert_all(&observations)
            .with_context(|| format!("Failed to store observations for video {}", video_id))?;

        if let Some(summary) = manifest.summary.as_deref().map(str::trim) {
            if !summary.is_empty() {
                self.sink.put_summary(video_id, summary)?;
                report.summary = true;
            }
        }

        tracing::info!(
            video_id,
            visual = report.visual,
            audio = report.audio,
            skipped = report.skipped_frames,
            summary = report.summary,
            "ingested video"
        );
        Ok(report)
    }
}
