//! Domain types for storage layer
//!
//! These types are storage-agnostic - they don't know about SQLite or USearch.
//! Store implementations handle serialization/deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which extraction pipeline produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Frame description
    Visual,
    /// Speech transcript segment
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Visual => "visual",
            Modality::Audio => "audio",
        }
    }

    /// Parse the stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "visual" => Some(Modality::Visual),
            "audio" => Some(Modality::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped text + embedding record for one modality of one video
///
/// Created once by ingestion and never mutated by retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub video_id: String,
    pub modality: Modality,
    /// Seconds from the start of the video (>= 0)
    pub timestamp: f64,
    /// End of the span for speech segments; frames are instants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<f64>,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Observation {
    /// Visual observation at a single instant
    pub fn visual(
        video_id: impl Into<String>,
        timestamp: f64,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id: video_id.into(),
            modality: Modality::Visual,
            timestamp,
            end_timestamp: None,
            text: text.into(),
            embedding,
        }
    }

    /// Audio observation spanning `start..=end`
    pub fn audio(
        video_id: impl Into<String>,
        start: f64,
        end: f64,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id: video_id.into(),
            modality: Modality::Audio,
            timestamp: start,
            end_timestamp: Some(end),
            text: text.into(),
            embedding,
        }
    }

    /// Check the invariants a store relies on
    pub fn validate(&self, dimension: usize) -> Result<(), String> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(format!("invalid timestamp {}", self.timestamp));
        }
        if let Some(end) = self.end_timestamp {
            if !end.is_finite() || end < self.timestamp {
                return Err(format!(
                    "end timestamp {} precedes start {}",
                    end, self.timestamp
                ));
            }
        }
        if self.embedding.len() != dimension {
            return Err(format!(
                "embedding dimension {} does not match store dimension {}",
                self.embedding.len(),
                dimension
            ));
        }
        Ok(())
    }
}

/// Search hit produced for one query and discarded with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub observation_id: Uuid,
    pub modality: Modality,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<f64>,
    pub text: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

impl ScoredCandidate {
    pub fn from_observation(observation: &Observation, score: f32) -> Self {
        Self {
            observation_id: observation.id,
            modality: observation.modality,
            timestamp: observation.timestamp,
            end_timestamp: observation.end_timestamp,
            text: observation.text.clone(),
            score,
        }
    }

    /// Last instant covered by this candidate
    pub fn end(&self) -> f64 {
        self.end_timestamp
            .map(|end| end.max(self.timestamp))
            .unwrap_or(self.timestamp)
    }
}
