//! vidrecall - multi-modal temporal retrieval over extracted video observations
//!
//! A question about a video is classified (visual, audio, both, summary),
//! searched against the matching modality stores, merged into time windows,
//! aligned across modalities, and assembled into a ranked result.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vidrecall::config;
//! use vidrecall::embeddings;
//! use vidrecall::retrieval::RetrievalEngine;
//! use vidrecall::storage::SqliteObservationStore;
//!
//! let config = config::load(Path::new("."))?;
//! let store = SqliteObservationStore::open(&config.store)?;
//! let embedder = embeddings::create_embedder(&config.embeddings, config.store.dimensions)?;
//! let engine = RetrievalEngine::new(Arc::new(store), embedder, config.retrieval);
//!
//! let result = engine.retrieve("lecture-01", "What is he wearing?")?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cancel;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod logging;
pub mod retrieval;
pub mod storage;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use retrieval::{QueryType, RetrievalEngine, RetrievalError, RetrievalResult};
pub use storage::{Modality, Observation, ObservationStore, ScoredCandidate};
