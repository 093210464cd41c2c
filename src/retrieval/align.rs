//! Cross-modal alignment for questions about a moment
//!
//! Pairs visual windows with audio windows that overlap or sit within the
//! adjacency margin of each other. Each window is used at most once; the
//! strongest combined matches are paired first. Windows left over are
//! reported on their own.

use serde::Serialize;

use super::grouping::TimeWindow;

/// One visual window, one audio window, or both
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPair {
    pub visual: Option<TimeWindow>,
    pub audio: Option<TimeWindow>,
    /// Sum of best scores for pairs, the window's own best score otherwise
    pub overlap_score: f32,
}

impl AlignedPair {
    fn paired(visual: TimeWindow, audio: TimeWindow) -> Self {
        Self {
            overlap_score: visual.best_score + audio.best_score,
            visual: Some(visual),
            audio: Some(audio),
        }
    }

    fn visual_only(visual: TimeWindow) -> Self {
        Self {
            overlap_score: visual.best_score,
            visual: Some(visual),
            audio: None,
        }
    }

    fn audio_only(audio: TimeWindow) -> Self {
        Self {
            overlap_score: audio.best_score,
            visual: None,
            audio: Some(audio),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.visual.is_some() && self.audio.is_some()
    }

    pub fn start(&self) -> f64 {
        self.windows().map(|w| w.start).fold(f64::INFINITY, f64::min)
    }

    pub fn end(&self) -> f64 {
        self.windows().map(|w| w.end).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Present windows, visual first
    pub fn windows(&self) -> impl Iterator<Item = &TimeWindow> {
        self.visual.iter().chain(self.audio.iter())
    }
}

/// Seconds between two intervals; zero when they overlap
pub fn interval_distance(a: &TimeWindow, b: &TimeWindow) -> f64 {
    (a.start.max(b.start) - a.end.min(b.end)).max(0.0)
}

/// Pair windows one-to-one, strongest combined score first
pub fn align(visual: Vec<TimeWindow>, audio: Vec<TimeWindow>, margin: f64) -> Vec<AlignedPair> {
    let mut edges: Vec<(usize, usize, f32)> = Vec::new();
    for (vi, v) in visual.iter().enumerate() {
        for (ai, a) in audio.iter().enumerate() {
            if interval_distance(v, a) <= margin {
                edges.push((vi, ai, v.best_score + a.best_score));
            }
        }
    }
    edges.sort_by(|x, y| {
        y.2.total_cmp(&x.2)
            .then_with(|| visual[x.0].start.total_cmp(&visual[y.0].start))
            .then_with(|| audio[x.1].start.total_cmp(&audio[y.1].start))
            .then_with(|| x.0.cmp(&y.0))
            .then_with(|| x.1.cmp(&y.1))
    });

    let mut visual: Vec<Option<TimeWindow>> = visual.into_iter().map(Some).collect();
    let mut audio: Vec<Option<TimeWindow>> = audio.into_iter().map(Some).collect();
    let mut pairs = Vec::new();

    for (vi, ai, _) in edges {
        if visual[vi].is_none() || audio[ai].is_none() {
            continue;
        }
        if let (Some(v), Some(a)) = (visual[vi].take(), audio[ai].take()) {
            pairs.push(AlignedPair::paired(v, a));
        }
    }

    pairs.extend(visual.into_iter().flatten().map(AlignedPair::visual_only));
    pairs.extend(audio.into_iter().flatten().map(AlignedPair::audio_only));

    // Stable: pairs before singletons, visual before audio on full ties
    pairs.sort_by(|a, b| {
        b.overlap_score
            .total_cmp(&a.overlap_score)
            .then_with(|| a.start().total_cmp(&b.start()))
    });
    pairs
}
