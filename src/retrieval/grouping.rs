//! Temporal grouping - merge per-sample hits into time windows
//!
//! Search returns isolated frames and speech segments; a question is usually
//! about a stretch of video. Candidates closer than the gap threshold `G` to
//! the running end of a window join it, so a window is the transitive closure
//! of hits chained by gaps `<= G`.

use serde::Serialize;
use std::cmp::Ordering;

use crate::storage::{Modality, ScoredCandidate};

/// A contiguous stretch of matching observations of one modality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
    pub modality: Modality,
    /// Chronological
    pub members: Vec<ScoredCandidate>,
    /// Text of the best-scoring member (earliest on ties)
    pub representative_text: String,
    pub best_score: f32,
}

impl TimeWindow {
    fn open(first: ScoredCandidate) -> Self {
        Self {
            start: first.timestamp,
            end: first.end(),
            modality: first.modality,
            representative_text: first.text.clone(),
            best_score: first.score,
            members: vec![first],
        }
    }

    fn extend(&mut self, next: ScoredCandidate) {
        self.end = self.end.max(next.end());
        if next.score > self.best_score {
            self.best_score = next.score;
            self.representative_text = next.text.clone();
        }
        self.members.push(next);
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ranking order of windows: best score first, earlier start on ties
pub fn compare_windows(a: &TimeWindow, b: &TimeWindow) -> Ordering {
    b.best_score
        .total_cmp(&a.best_score)
        .then_with(|| a.start.total_cmp(&b.start))
}

/// Group candidates of one modality into windows
///
/// Windows come back ranked by [`compare_windows`]; members inside a window
/// stay chronological. Empty input yields no windows.
pub fn group(mut candidates: Vec<ScoredCandidate>, gap: f64) -> Vec<TimeWindow> {
    candidates.sort_by(|a, b| {
        a.timestamp
            .total_cmp(&b.timestamp)
            .then_with(|| a.observation_id.cmp(&b.observation_id))
    });

    let mut windows: Vec<TimeWindow> = Vec::new();
    let mut current: Option<TimeWindow> = None;

    for candidate in candidates {
        current = Some(match current.take() {
            Some(mut window) if candidate.timestamp - window.end <= gap => {
                window.extend(candidate);
                window
            }
            Some(window) => {
                windows.push(window);
                TimeWindow::open(candidate)
            }
            None => TimeWindow::open(candidate),
        });
    }
    windows.extend(current);

    windows.sort_by(compare_windows);
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn hit(timestamp: f64, score: f32, text: &str) -> ScoredCandidate {
        ScoredCandidate {
            observation_id: Uuid::new_v4(),
            modality: Modality::Visual,
            timestamp,
            end_timestamp: None,
            text: text.to_string(),
            score,
        }
    }

    fn spans(windows: &[TimeWindow]) -> Vec<(f64, f64)> {
        let mut spans: Vec<(f64, f64)> = windows.iter().map(|w| (w.start, w.end)).collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        spans
    }

    #[test]
    fn test_gap_merge() {
        let windows = group(
            vec![
                hit(0.0, 0.5, "a"),
                hit(1.0, 0.5, "b"),
                hit(5.0, 0.5, "c"),
                hit(5.5, 0.5, "d"),
            ],
            2.0,
        );
        assert_eq!(spans(&windows), vec![(0.0, 1.0), (5.0, 5.5)]);
    }

    #[test]
    fn test_gap_boundary_is_inclusive() {
        let windows = group(vec![hit(0.0, 0.5, "a"), hit(2.0, 0.5, "b")], 2.0);
        assert_eq!(windows.len(), 1);

        let windows = group(vec![hit(0.0, 0.5, "a"), hit(2.01, 0.5, "b")], 2.0);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_chaining_is_transitive() {
        let windows = group(
            vec![hit(0.0, 0.5, "a"), hit(1.5, 0.5, "b"), hit(3.0, 0.5, "c"), hit(4.5, 0.5, "d")],
            2.0,
        );
        assert_eq!(spans(&windows), vec![(0.0, 4.5)]);
    }

    #[test]
    fn test_gap_measured_from_segment_end() {
        let mut speech = hit(0.0, 0.6, "long sentence");
        speech.end_timestamp = Some(6.0);
        let windows = group(vec![speech, hit(7.5, 0.4, "next")], 2.0);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, 7.5);
    }

    #[test]
    fn test_representative_is_best_member() {
        let windows = group(
            vec![hit(0.0, 0.4, "first"), hit(0.5, 0.9, "best"), hit(1.0, 0.9, "late tie")],
            2.0,
        );
        assert_eq!(windows[0].representative_text, "best");
        assert_eq!(windows[0].best_score, 0.9);
    }

    #[test]
    fn test_windows_ranked_members_chronological() {
        let windows = group(
            vec![hit(10.0, 0.9, "late"), hit(1.0, 0.3, "b"), hit(0.0, 0.2, "a")],
            2.0,
        );
        assert_eq!(windows[0].start, 10.0);
        let times: Vec<f64> = windows[1].members.iter().map(|m| m.timestamp).collect();
        assert_eq!(times, vec![0.0, 1.0]);
    }

    #[test]
    fn test_single_and_empty() {
        let windows = group(vec![hit(3.0, 0.5, "only")], 2.0);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].duration(), 0.0);

        assert!(group(Vec::new(), 2.0).is_empty());
    }

    #[test]
    fn test_zero_gap_merges_only_coincident() {
        let windows = group(vec![hit(1.0, 0.5, "a"), hit(1.0, 0.4, "b"), hit(1.5, 0.4, "c")], 0.0);
        assert_eq!(spans(&windows), vec![(1.0, 1.0), (1.5, 1.5)]);
    }
}
