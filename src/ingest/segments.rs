//! Transcript segmentation - word timings to speech segments
//!
//! Word-level ASR output is too fine-grained to embed one word at a time.
//! Consecutive words are packed into a segment until the speaker pauses
//! longer than the segment gap or the segment reaches its word limit.

use serde::{Deserialize, Serialize};

use crate::config::IngestSection;

/// One recognized word with its timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A run of words embedded as one audio observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Segmentation limits
#[derive(Debug, Clone, Copy)]
pub struct SegmentRules {
    /// Pause (seconds) between words that closes a segment when exceeded
    pub max_pause_secs: f64,
    pub max_words: usize,
}

impl From<&IngestSection> for SegmentRules {
    fn from(section: &IngestSection) -> Self {
        Self {
            max_pause_secs: section.segment_gap_secs,
            max_words: section.max_segment_words,
        }
    }
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self::from(&IngestSection::default())
    }
}

/// Pack words (in spoken order) into segments
///
/// Words with blank text are dropped. A segment spans from its first word's
/// start to its last word's end.
pub fn segment_transcript(words: &[Word], rules: SegmentRules) -> Vec<SpeechSegment> {
    let max_words = rules.max_words.max(1);
    let mut segments = Vec::new();
    let mut current: Vec<&Word> = Vec::new();

    for word in words.iter().filter(|w| !w.text.trim().is_empty()) {
        if let Some(last) = current.last() {
            if word.start - last.end > rules.max_pause_secs {
                segments.extend(close(&current));
                current.clear();
            }
        }
        current.push(word);
        if current.len() >= max_words {
            segments.extend(close(&current));
            current.clear();
        }
    }
    segments.extend(close(&current));
    segments
}

fn close(words: &[&Word]) -> Option<SpeechSegment> {
    let first = words.first()?;
    let last = words.last()?;
    let text = words
        .iter()
        .map(|w| w.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    Some(SpeechSegment {
        text,
        start: first.start,
        end: last.end.max(first.start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(spec: &[(&str, f64, f64)]) -> Vec<Word> {
        spec.iter()
            .map(|(text, start, end)| Word {
                text: text.to_string(),
                start: *start,
                end: *end,
            })
            .collect()
    }

    #[test]
    fn test_pause_splits_segments() {
        let transcript = words(&[
            ("so", 0.0, 0.2),
            ("the", 0.3, 0.4),
            ("problem", 0.5, 1.0),
            ("right", 3.5, 3.8),
        ]);
        let segments = segment_transcript(&transcript, SegmentRules::default());

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "so the problem");
        assert_eq!((segments[0].start, segments[0].end), (0.0, 1.0));
        assert_eq!(segments[1].text, "right");
    }

    #[test]
    fn test_pause_of_exactly_limit_does_not_split() {
        let transcript = words(&[("a", 0.0, 1.0), ("b", 3.0, 3.5)]);
        let segments = segment_transcript(&transcript, SegmentRules::default());
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_word_limit_splits_segments() {
        let transcript: Vec<Word> = (0..10)
            .map(|i| Word {
                text: format!("w{}", i),
                start: i as f64 * 0.3,
                end: i as f64 * 0.3 + 0.2,
            })
            .collect();
        let segments = segment_transcript(&transcript, SegmentRules::default());

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text.split(' ').count(), 8);
        assert_eq!(segments[1].text, "w8 w9");
    }

    #[test]
    fn test_blank_words_and_empty_input() {
        assert!(segment_transcript(&[], SegmentRules::default()).is_empty());

        let transcript = words(&[("  ", 0.0, 0.1), ("hello", 0.2, 0.5)]);
        let segments = segment_transcript(&transcript, SegmentRules::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0.2);
    }
}
