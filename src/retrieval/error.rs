//! Retrieval errors, attributed to the pipeline stage that raised them

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::storage::StoreError;

/// What went wrong, independent of where
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty or oversized question; never reaches a collaborator
    InvalidInput,
    /// Observation store unreachable or timed out
    Unavailable,
    /// No candidate cleared the score floor, or no summary stored
    NotFound,
    /// The caller cancelled the query
    Cancelled,
    /// Embedding provider failure or inconsistent embedding dimensions
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-query pipeline stages, in order
///
/// `Received → Classified → Searched → Grouped → (Aligned) → Assembled →
/// Completed`. A query never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Classified,
    Searched,
    Grouped,
    Aligned,
    Assembled,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Classified => "classified",
            Stage::Searched => "searched",
            Stage::Grouped => "grouped",
            Stage::Aligned => "aligned",
            Stage::Assembled => "assembled",
            Stage::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one query
///
/// `stage` is the stage that was being executed, so `Stage::Searched` covers
/// embedding and store search failures.
#[derive(Debug, Error)]
#[error("{kind} while {stage} (video {video_id}): {message}")]
pub struct RetrievalError {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub video_id: String,
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl RetrievalError {
    pub fn new(
        kind: ErrorKind,
        stage: Stage,
        video_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            stage,
            video_id: video_id.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Map a store failure onto the retrieval error kinds
    pub fn from_store(err: StoreError, stage: Stage, video_id: &str) -> Self {
        let kind = match &err {
            StoreError::Cancelled => ErrorKind::Cancelled,
            StoreError::DimensionMismatch { .. } | StoreError::Backend(_) => ErrorKind::Internal,
            StoreError::Unavailable(_) | StoreError::Timeout(_) => ErrorKind::Unavailable,
        };
        let message = err.to_string();
        Self::new(kind, stage, video_id, message).with_source(err)
    }

    /// Whether re-issuing the same query later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::time::Duration;

    #[test]
    fn test_stage_order_is_linear() {
        assert!(Stage::Received < Stage::Classified);
        assert!(Stage::Grouped < Stage::Aligned);
        assert!(Stage::Assembled < Stage::Completed);
    }

    #[test]
    fn test_store_error_mapping() {
        let timeout = RetrievalError::from_store(
            StoreError::Timeout(Duration::from_millis(5)),
            Stage::Searched,
            "v1",
        );
        assert_eq!(timeout.kind, ErrorKind::Unavailable);
        assert!(timeout.is_retryable());
        assert!(timeout.source().is_some());

        let cancelled = RetrievalError::from_store(StoreError::Cancelled, Stage::Searched, "v1");
        assert_eq!(cancelled.kind, ErrorKind::Cancelled);
        assert!(!cancelled.is_retryable());

        let mismatch = RetrievalError::from_store(
            StoreError::DimensionMismatch { expected: 384, actual: 3 },
            Stage::Searched,
            "v1",
        );
        assert_eq!(mismatch.kind, ErrorKind::Internal);

        let unreachable = RetrievalError::from_store(
            StoreError::Unavailable("connection refused".to_string()),
            Stage::Searched,
            "v1",
        );
        assert_eq!(unreachable.kind, ErrorKind::Unavailable);
        assert!(unreachable.is_retryable());

        // Corrupt rows and index failures are not fixed by waiting
        let corrupt = RetrievalError::from_store(
            StoreError::Backend(anyhow::anyhow!("Corrupt modality 'smell' for x")),
            Stage::Searched,
            "v1",
        );
        assert_eq!(corrupt.kind, ErrorKind::Internal);
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn test_display_carries_context() {
        let err = RetrievalError::new(ErrorKind::NotFound, Stage::Assembled, "v9", "no summary stored");
        assert_eq!(
            err.to_string(),
            "not_found while assembled (video v9): no summary stored"
        );
    }
}
