//! Response assembly - ranked, capped, serializable results

use serde::Serialize;

use super::align::AlignedPair;
use super::error::{ErrorKind, RetrievalError, Stage};
use super::grouping::{compare_windows, TimeWindow};
use crate::storage::Modality;

/// Answer material for one question
///
/// Serializes internally tagged on `type`:
/// `{"type":"summary","text":..}`, `{"type":"visual","windows":..,"status":..}`,
/// `{"type":"both","pairs":..,"visual_status":..,"audio_status":..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RetrievalResult {
    Summary { text: String },
    Visual(WindowSet),
    Audio(WindowSet),
    Both(PairSet),
}

impl RetrievalResult {
    /// Number of windows or pairs (1 for a summary)
    pub fn len(&self) -> usize {
        match self {
            RetrievalResult::Summary { .. } => 1,
            RetrievalResult::Visual(set) | RetrievalResult::Audio(set) => set.windows.len(),
            RetrievalResult::Both(set) => set.pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one modality search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Found,
    /// Valid empty result; nothing cleared the score floor
    NotFound,
    /// The search failed; the result is missing this modality
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSet {
    pub windows: Vec<WindowEntry>,
    pub status: SearchStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSet {
    pub pairs: Vec<PairEntry>,
    pub visual_status: SearchStatus,
    pub audio_status: SearchStatus,
    /// Why a side is degraded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowEntry {
    pub start: f64,
    pub end: f64,
    pub modality: Modality,
    pub text: String,
    pub score: f32,
}

impl From<&TimeWindow> for WindowEntry {
    fn from(window: &TimeWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
            modality: window.modality,
            text: window.representative_text.clone(),
            score: window.best_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairEntry {
    pub start: f64,
    pub end: f64,
    /// Present sides, visual first
    pub modalities: Vec<Modality>,
    /// Representative text of each present side, parallel to `modalities`
    pub texts: Vec<String>,
    /// `texts` concatenated, one per line
    pub text: String,
    pub score: f32,
}

impl From<&AlignedPair> for PairEntry {
    fn from(pair: &AlignedPair) -> Self {
        let texts: Vec<String> = pair.windows().map(|w| w.representative_text.clone()).collect();
        Self {
            start: pair.start(),
            end: pair.end(),
            modalities: pair.windows().map(|w| w.modality).collect(),
            text: texts.join("\n"),
            texts,
            score: pair.overlap_score,
        }
    }
}

/// Stored summary, unchanged, or `NotFound`
pub fn summary(video_id: &str, stored: Option<String>) -> Result<RetrievalResult, RetrievalError> {
    match stored {
        Some(text) => Ok(RetrievalResult::Summary { text }),
        None => Err(RetrievalError::new(
            ErrorKind::NotFound,
            Stage::Assembled,
            video_id,
            "no summary stored for this video",
        )),
    }
}

/// Top `max_results` windows of a single-modality search
pub fn window_set(mut windows: Vec<TimeWindow>, status: SearchStatus, max_results: usize) -> WindowSet {
    windows.sort_by(compare_windows);
    WindowSet {
        windows: windows.iter().take(max_results).map(WindowEntry::from).collect(),
        status,
    }
}

/// Top `max_results` pairs of a two-modality search
pub fn pair_set(
    mut pairs: Vec<AlignedPair>,
    visual_status: SearchStatus,
    audio_status: SearchStatus,
    notes: Vec<String>,
    max_results: usize,
) -> PairSet {
    pairs.sort_by(|a, b| {
        b.overlap_score
            .total_cmp(&a.overlap_score)
            .then_with(|| a.start().total_cmp(&b.start()))
    });
    PairSet {
        pairs: pairs.iter().take(max_results).map(PairEntry::from).collect(),
        visual_status,
        audio_status,
        notes,
    }
}
