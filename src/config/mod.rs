//! Config module - engine configuration
//!
//! Manages `.vidrecall/config.toml` for retrieval tuning (gap threshold,
//! adjacency margin, ranking caps, timeouts), the observation store location,
//! the embedding model and transcript segmentation.
//!
//! # Example
//!
//! ```no_run
//! use vidrecall::config;
//! use std::path::Path;
//!
//! let path = Path::new(".");
//! let mut config = config::load(path)?;
//! config.retrieval.gap_threshold_secs = 3.0;
//! config::save(path, &config)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod internal;

use anyhow::Result;
use std::path::{Path, PathBuf};

// Re-export config types
pub use internal::{
    EmbeddingsSection, EngineConfig, IngestSection, RetrievalSection, StoreSection,
};

/// Load config from `.vidrecall/config.toml`
///
/// Returns default config if file doesn't exist.
pub fn load(project_path: &Path) -> Result<EngineConfig> {
    internal::load(project_path)
}

/// Load config from an explicit path (e.g. `--config`)
pub fn load_file(path: &Path) -> Result<EngineConfig> {
    internal::load_file(path)
}

/// Save config to `.vidrecall/config.toml`
///
/// Creates `.vidrecall/` directory if it doesn't exist.
pub fn save(project_path: &Path, config: &EngineConfig) -> Result<()> {
    internal::save(project_path, config)
}

/// Get the config file path for a project
pub fn config_path(project_path: &Path) -> PathBuf {
    internal::config_path(project_path)
}
