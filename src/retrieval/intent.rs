//! Query intent detection
//!
//! Decides which observations a question needs: what was seen (visual), what
//! was said (audio), a specific moment combining both, or the video as a
//! whole (summary). Keyword matching on lowercase word tokens; no model call,
//! so identical questions always classify identically.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use super::error::{ErrorKind, RetrievalError, Stage};
use crate::storage::Modality;

/// Which data a question should be answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Visual,
    Audio,
    /// Moments where both modalities matter; also the fallback
    Both,
    /// Whole-video questions answered from the stored summary
    Summary,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Visual => "visual",
            QueryType::Audio => "audio",
            QueryType::Both => "both",
            QueryType::Summary => "summary",
        }
    }

    /// Parse an explicit type override (CLI flag)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "visual" => Some(Self::Visual),
            "audio" => Some(Self::Audio),
            "both" => Some(Self::Both),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }

    /// Modalities searched for this type
    pub fn modalities(&self) -> &'static [Modality] {
        match self {
            QueryType::Visual => &[Modality::Visual],
            QueryType::Audio => &[Modality::Audio],
            QueryType::Both => &[Modality::Visual, Modality::Audio],
            QueryType::Summary => &[],
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub query_type: QueryType,
    /// 0.0 when no cue matched (pure fallback), up to 0.95
    pub confidence: f32,
}

/// Whole-video phrasing, matched against the space-joined token string
const SUMMARY_PHRASES: &[&str] = &[
    "summary",
    "summarize",
    "summarise",
    "overview",
    "main topic",
    "main point",
    "main points",
    "main idea",
    "general theme",
    "gist",
    "tldr",
    "video about",
    "what is this video",
    "what's this video",
    "tell me about this video",
    "what happens in this video",
    "content of this video",
];

/// What can be seen in a frame
const VISUAL_CUES: &[&str] = &[
    "see", "sees", "seen", "saw", "look", "looks", "looked", "looking", "wear", "wears", "wore",
    "wearing", "worn", "color", "colour", "colors", "colours", "shirt", "clothes", "clothing",
    "dressed", "visible", "appear", "appears", "appearance", "scene", "background", "holding",
    "object", "objects", "frame", "picture", "image", "glasses", "face", "expression",
    "standing", "sitting", "room", "screen", "shown",
];

/// What was said or heard
const AUDIO_CUES: &[&str] = &[
    "say", "says", "said", "saying", "mention", "mentions", "mentioned", "mentioning",
    "discuss", "discusses", "discussed", "discussing", "discussion", "talk", "talks", "talked",
    "talking", "speak", "speaks", "spoke", "speaking", "speech", "word", "words", "dialogue",
    "hear", "heard", "sound", "sounds", "audio", "voice", "told", "asked", "quote", "narrator",
    "narration", "conversation",
];

/// Temporal connectors that point at a specific moment
const MOMENT_CONNECTORS: &[&str] = &["while", "during", "when", "whilst"];

/// Event words that, with a connector, ask what happened at that moment
const EVENT_WORDS: &[&str] = &["happen", "happens", "happened", "happening", "occur", "occurred", "going"];

/// Classify a question
///
/// Fails only with `InvalidInput` (empty after trimming, or more than
/// `max_chars` characters). Unrecognized content falls back to `Both`.
pub fn classify(query: &str, max_chars: usize) -> Result<Classification, RetrievalError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(RetrievalError::new(
            ErrorKind::InvalidInput,
            Stage::Received,
            "",
            "query is empty",
        ));
    }
    let chars = trimmed.chars().count();
    if chars > max_chars {
        return Err(RetrievalError::new(
            ErrorKind::InvalidInput,
            Stage::Received,
            "",
            format!("query has {} characters, limit is {}", chars, max_chars),
        ));
    }

    Ok(detect(trimmed))
}

/// Keyword classification of an already-validated question
pub fn detect(query: &str) -> Classification {
    let tokens = tokenize(query);
    let joined = format!(" {} ", tokens.join(" "));
    let words: HashSet<&str> = tokens.iter().map(String::as_str).collect();

    if SUMMARY_PHRASES
        .iter()
        .any(|phrase| joined.contains(&format!(" {} ", phrase)))
    {
        return Classification {
            query_type: QueryType::Summary,
            confidence: 0.9,
        };
    }

    let has_connector = MOMENT_CONNECTORS.iter().any(|w| words.contains(w));
    let has_event = EVENT_WORDS.iter().any(|w| words.contains(w));
    if has_connector && has_event {
        return Classification {
            query_type: QueryType::Both,
            confidence: 0.8,
        };
    }

    let visual = VISUAL_CUES.iter().filter(|w| words.contains(*w)).count();
    let audio = AUDIO_CUES.iter().filter(|w| words.contains(*w)).count();

    match (visual, audio) {
        (0, 0) => Classification {
            query_type: QueryType::Both,
            confidence: 0.0,
        },
        (v, 0) => Classification {
            query_type: QueryType::Visual,
            confidence: cue_confidence(v),
        },
        (0, a) => Classification {
            query_type: QueryType::Audio,
            confidence: cue_confidence(a),
        },
        _ => Classification {
            query_type: QueryType::Both,
            confidence: 0.7,
        },
    }
}

fn cue_confidence(hits: usize) -> f32 {
    (0.5 + 0.15 * hits as f32).min(0.95)
}

/// Lowercase word tokens; apostrophes stay inside words ("what's")
fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(q: &str) -> QueryType {
        classify(q, 1000).unwrap().query_type
    }

    #[test]
    fn test_detect_visual() {
        assert_eq!(kind("What is he wearing?"), QueryType::Visual);
        assert_eq!(kind("What color is his shirt?"), QueryType::Visual);
        assert_eq!(kind("What does he look like?"), QueryType::Visual);
    }

    #[test]
    fn test_detect_audio() {
        assert_eq!(kind("What did they say?"), QueryType::Audio);
        assert_eq!(kind("What was mentioned about Athens?"), QueryType::Audio);
        assert_eq!(kind("What are they talking about?"), QueryType::Audio);
    }

    #[test]
    fn test_detect_summary() {
        assert_eq!(kind("Summarize this video"), QueryType::Summary);
        assert_eq!(kind("What is the main topic?"), QueryType::Summary);
        assert_eq!(kind("What is this video about?"), QueryType::Summary);
        assert_eq!(kind("Give me an overview"), QueryType::Summary);
    }

    #[test]
    fn test_detect_moment() {
        assert_eq!(kind("What happened while they were talking?"), QueryType::Both);
        assert_eq!(kind("What happened when he mentioned Athens?"), QueryType::Both);
    }

    #[test]
    fn test_both_cue_sets_is_both() {
        assert_eq!(kind("Describe the scene when he said hello"), QueryType::Both);
    }

    #[test]
    fn test_fallback_is_both_with_zero_confidence() {
        let c = classify("tell me more", 1000).unwrap();
        assert_eq!(c.query_type, QueryType::Both);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_word_boundaries() {
        // "seesaw" and "sayings" are not cues
        assert_eq!(kind("is there a seesaw"), QueryType::Both);
        assert_eq!(kind("any old sayings"), QueryType::Both);
    }

    #[test]
    fn test_deterministic() {
        let q = "What is he wearing while speaking?";
        assert_eq!(classify(q, 1000).unwrap(), classify(q, 1000).unwrap());
    }

    #[test]
    fn test_invalid_input() {
        let empty = classify("   ", 1000).unwrap_err();
        assert_eq!(empty.kind, ErrorKind::InvalidInput);

        let long = classify(&"a".repeat(11), 10).unwrap_err();
        assert_eq!(long.kind, ErrorKind::InvalidInput);
        assert!(classify(&"a".repeat(10), 10).is_ok());
    }

    #[test]
    fn test_confidence_grows_with_cues() {
        let one = classify("what do you see", 1000).unwrap();
        let two = classify("what do you see him wearing", 1000).unwrap();
        assert!(two.confidence > one.confidence);
        assert!(two.confidence <= 0.95);
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(QueryType::parse("AUDIO"), Some(QueryType::Audio));
        assert_eq!(QueryType::parse("nope"), None);
        // Only the four type names; classifier cue words are not aliases
        for word in ["see", "speech", "said"] {
            assert_eq!(QueryType::parse(word), None);
        }
    }
}
