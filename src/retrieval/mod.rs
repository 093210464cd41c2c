//! Retrieval module - question to ranked, time-grouped observations
//!
//! Public interface:
//! - `RetrievalEngine` runs the full pipeline for one question
//! - `RetrievalResult` and its window/pair sets for query results
//! - `RetrievalError` with the failing `Stage` and an `ErrorKind`
//!
//! The stages are usable on their own: `intent::classify`,
//! `search::search`/`search_both`, `grouping::group`, `align::align`,
//! and the `assemble` helpers.

pub mod align;
pub mod assemble;
mod engine;
mod error;
pub mod grouping;
pub mod intent;
pub mod search;
pub mod snippet;

pub use align::AlignedPair;
pub use assemble::{PairEntry, PairSet, RetrievalResult, SearchStatus, WindowEntry, WindowSet};
pub use engine::{Query, RetrievalEngine};
pub use error::{ErrorKind, RetrievalError, Stage};
pub use grouping::TimeWindow;
pub use intent::{Classification, QueryType};
